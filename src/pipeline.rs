//! The filtering pipeline: discovery, graph construction, filtering,
//! substitution, and output generation.
//!
//! Single-threaded and deterministic. The dependency graph is built from
//! every file before any filtering decision, and the strict-substitution
//! check runs before any file is written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::ast::ProtoFile;
use crate::config::FilterConfig;
use crate::error::{AnnotationOccurrence, PipelineError};
use crate::graph::Graph;
use crate::{filter, parser, subst, writer};

/// Inputs for one filtering run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory containing source `.proto` files.
    pub input: PathBuf,
    /// Directory where filtered files are written. Must differ from input.
    pub output: PathBuf,
    /// Optional YAML filter configuration.
    pub config: Option<PathBuf>,
}

/// Counters reported after a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_scanned: usize,
    pub files_written: usize,
    pub total_definitions: usize,
    pub included_definitions: usize,
    pub excluded_definitions: usize,
    pub services_removed: usize,
    pub methods_removed: usize,
    pub fields_removed: usize,
    pub orphans_removed: usize,
    pub substitutions: usize,
}

struct Parsed {
    rel: PathBuf,
    tree: ProtoFile,
}

struct Processed {
    rel: PathBuf,
    tree: ProtoFile,
    /// True when annotation filtering left no definitions; the file is not
    /// emitted at all.
    skip: bool,
}

/// Runs the whole pipeline.
pub fn run(opts: &PipelineOptions) -> Result<Summary, PipelineError> {
    let input = absolutize(&opts.input);
    let output = absolutize(&opts.output);

    if input == output {
        return Err(PipelineError::SameInputOutput);
    }
    if !input.exists() {
        return Err(PipelineError::InputNotFound { path: input });
    }
    if !input.is_dir() {
        return Err(PipelineError::InputNotADirectory { path: input });
    }

    let cfg = match &opts.config {
        Some(path) => {
            let cfg = FilterConfig::load(path)?;
            cfg.validate()?;
            Some(cfg)
        }
        None => None,
    };

    let files =
        parser::discover_proto_files(&input).map_err(|source| PipelineError::Discover {
            path: input.clone(),
            source,
        })?;
    if files.is_empty() {
        warn!("no .proto files found in input directory");
        return Ok(Summary::default());
    }

    // Parse every file and build the graph before touching any tree:
    // transitive closures need the complete cross-file picture.
    let mut parsed = Vec::with_capacity(files.len());
    let mut graph = Graph::new();
    let mut total_definitions = 0;
    for rel in &files {
        let tree = parser::parse_file(&input.join(rel)).map_err(|source| PipelineError::Parse {
            file: rel.clone(),
            source,
        })?;
        let defs = parser::extract_definitions(&tree, rel);
        total_definitions += defs.len();
        for def in defs {
            graph.add_definition(def);
        }
        parsed.push(Parsed {
            rel: rel.clone(),
            tree,
        });
    }

    let mut summary = Summary {
        files_scanned: files.len(),
        total_definitions,
        included_definitions: total_definitions,
        ..Default::default()
    };

    // Name-based filtering, widened by the dependency closure. The filter
    // expresses intent; the closure enforces completeness.
    let mut keep: Option<HashSet<String>> = None;
    let mut required: Option<HashSet<PathBuf>> = None;
    if let Some(cfg) = cfg.as_ref().filter(|c| !c.is_pass_through()) {
        let mut all_fqns: Vec<String> = graph.fqns().map(str::to_string).collect();
        all_fqns.sort();
        let included = filter::apply_filter(cfg, &all_fqns)?;
        let needed = graph.transitive_deps(included);
        summary.included_definitions = needed.len();
        summary.excluded_definitions = total_definitions.saturating_sub(needed.len());
        required = Some(graph.required_files(&needed));
        keep = Some(needed);
    }

    // Pass 1: prune, annotation-filter, normalize comments, and collect
    // annotation occurrences for the strict check.
    let strict = cfg.as_ref().map(|c| c.strict_substitutions).unwrap_or(false);
    let mut processed = Vec::new();
    let mut occurrences: Vec<AnnotationOccurrence> = Vec::new();

    for Parsed { rel, mut tree } in parsed {
        if let Some(required) = &required {
            if !required.contains(&rel) {
                debug!(file = %rel.display(), "dropped: owns no required definitions");
                continue;
            }
        }
        if let Some(keep) = &keep {
            filter::prune_file(&mut tree, keep);
        }

        let mut skip = false;
        if let Some(cfg) = cfg.as_ref().filter(|c| c.has_annotations()) {
            let (services, methods, fields) = if cfg.has_annotation_exclude() {
                let services =
                    filter::exclude_services_by_annotation(&mut tree, &cfg.annotations.exclude);
                let methods =
                    filter::exclude_methods_by_annotation(&mut tree, &cfg.annotations.exclude);
                let fields =
                    filter::exclude_fields_by_annotation(&mut tree, &cfg.annotations.exclude);
                (services, methods, fields)
            } else {
                let methods =
                    filter::include_methods_by_annotation(&mut tree, &cfg.annotations.include);
                let services =
                    filter::include_services_by_annotation(&mut tree, &cfg.annotations.include);
                (services, methods, 0)
            };
            summary.services_removed += services;
            summary.methods_removed += methods;
            summary.fields_removed += fields;
            filter::remove_empty_services(&mut tree);
            // Untouched files skip the orphan walk entirely.
            if services + methods + fields > 0 {
                summary.orphans_removed += filter::remove_orphaned_definitions(&mut tree);
            }
            if !tree.has_definitions() {
                skip = true;
                debug!(file = %rel.display(), "skipped: no definitions remain");
            }
        }

        subst::convert_block_comments(&mut tree);

        if strict && !skip {
            occurrences.extend(subst::collect_annotations(&tree, &rel));
        }

        processed.push(Processed { rel, tree, skip });
    }

    // The strict check runs before any write, so a failure leaves the
    // output directory untouched.
    if strict {
        let empty = Default::default();
        let subs = cfg.as_ref().map(|c| &c.substitutions).unwrap_or(&empty);
        subst::check_strict_substitutions(occurrences, subs)?;
    }

    // Pass 2: substitute and write.
    for Processed { rel, mut tree, skip } in processed {
        if skip {
            continue;
        }
        if let Some(cfg) = cfg.as_ref().filter(|c| c.has_substitutions()) {
            summary.substitutions += subst::substitute_annotations(&mut tree, &cfg.substitutions);
        }
        writer::write_file(&tree, &output.join(&rel)).map_err(|source| PipelineError::Write {
            file: rel.clone(),
            source,
        })?;
        summary.files_written += 1;
    }

    info!(
        "processed {} files, {} definitions",
        summary.files_scanned, summary.total_definitions
    );
    info!(
        "included {} definitions, excluded {}",
        summary.included_definitions, summary.excluded_definitions
    );
    if cfg.as_ref().map(|c| c.has_annotations()).unwrap_or(false) {
        info!(
            "removed by annotation: {} services, {} methods, {} fields, {} orphaned definitions",
            summary.services_removed,
            summary.methods_removed,
            summary.fields_removed,
            summary.orphans_removed
        );
    }
    if cfg.as_ref().map(|c| c.has_substitutions()).unwrap_or(false) {
        info!("substituted {} annotations", summary.substitutions);
    }
    info!(
        "wrote {} files to {}",
        summary.files_written,
        opts.output.display()
    );

    Ok(summary)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
