//! Error types for proto filtering and output generation.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or validating the YAML filter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("annotations.include and annotations.exclude are mutually exclusive")]
    ExclusiveAnnotationRules,
}

/// Errors from name-based include/exclude filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid glob pattern \"{pattern}\": {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("conflicting rules: \"{fqn}\" matches both include and exclude patterns")]
    Conflict { fqn: String },
}

/// Errors while parsing a `.proto` file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Syntax {
        file: PathBuf,
        line: usize,
        message: String,
    },
}

/// Errors while writing an output file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One annotation occurrence inside a comment, recorded for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationOccurrence {
    /// Relative path of the file the comment belongs to.
    pub file: PathBuf,
    /// 1-based source line, or 0 when the line was synthesized.
    pub line: usize,
    /// The annotation's logical name.
    pub name: String,
    /// The literal token text as it appears in the comment.
    pub token: String,
}

/// Raised by strict substitution mode when discovered annotations have no
/// configured replacement.
///
/// The rendering leads with the distinct missing names (sorted), then lists
/// every occurrence as `file:line: token`, sorted by file path and line
/// number, so the report stays actionable across many files.
#[derive(Debug)]
pub struct StrictSubstitutionError {
    /// Distinct missing annotation names, sorted.
    pub missing: Vec<String>,
    /// Occurrences of the missing names, sorted by file then line.
    pub occurrences: Vec<AnnotationOccurrence>,
}

impl fmt::Display for StrictSubstitutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsubstituted annotations found: {}",
            self.missing.join(", ")
        )?;
        for occ in &self.occurrences {
            write!(f, "\n  {}:{}: {}", occ.file.display(), occ.line, occ.token)?;
        }
        Ok(())
    }
}

impl std::error::Error for StrictSubstitutionError {}

/// Umbrella error for a whole filtering run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input directory not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("input path is not a directory: {path}")]
    InputNotADirectory { path: PathBuf },

    #[error("input and output directories must be different")]
    SameInputOutput,

    #[error("discovering proto files in {path}: {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    StrictSubstitution(#[from] StrictSubstitutionError),

    #[error("parsing {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("writing {file}: {source}")]
    Write {
        file: PathBuf,
        #[source]
        source: WriteError,
    },
}

impl PipelineError {
    /// Returns the process exit code for this error.
    ///
    /// Configuration-semantic failures exit 2; I/O, argument, parse, and
    /// write failures exit 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_)
            | PipelineError::Filter(_)
            | PipelineError::StrictSubstitution(_) => 2,
            _ => 1,
        }
    }
}
