//! Cross-file dependency graph over top-level declarations.
//!
//! The graph is built once from every parsed file before any filtering
//! decision is made, so transitive closures always see the complete
//! cross-file picture. Filtering never mutates the graph; it operates on a
//! separate kept-FQN set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Service,
    Message,
    Enum,
}

/// A named top-level declaration with its outbound type references.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Fully qualified name, e.g. `my.package.OrderService`.
    pub fqn: String,
    pub kind: DefinitionKind,
    /// Relative path of the containing file.
    pub file: PathBuf,
    /// FQNs of the types this definition depends on. Scalar built-ins are
    /// filtered out before insertion.
    pub references: Vec<String>,
}

/// Tracks definitions and their dependency relationships.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, Definition>,
    edges: HashMap<String, Vec<String>>,
    files: HashMap<String, PathBuf>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Registers a definition. Re-adding an FQN overwrites the previous
    /// entry; duplicate FQNs across files are a caller-level concern.
    pub fn add_definition(&mut self, def: Definition) {
        self.edges.insert(def.fqn.clone(), def.references.clone());
        self.files.insert(def.fqn.clone(), def.file.clone());
        self.nodes.insert(def.fqn.clone(), def);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All registered FQNs, in hash order. Sort before showing to users.
    pub fn fqns(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn definition(&self, fqn: &str) -> Option<&Definition> {
        self.nodes.get(fqn)
    }

    /// Returns all FQNs transitively required by the seed set, seeds
    /// included, via breadth-first traversal. A seed with no node simply
    /// has no outgoing edges and is returned as itself.
    pub fn transitive_deps<I, S>(&self, seeds: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for seed in seeds {
            let seed = seed.into();
            if visited.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(deps) = self.edges.get(&current) {
                for dep in deps {
                    if visited.insert(dep.clone()) {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }

        visited
    }

    /// The set of files owning at least one FQN in the given set.
    pub fn required_files(&self, fqns: &HashSet<String>) -> HashSet<PathBuf> {
        fqns.iter()
            .filter_map(|fqn| self.files.get(fqn).cloned())
            .collect()
    }

    pub fn file_of(&self, fqn: &str) -> Option<&Path> {
        self.files.get(fqn).map(PathBuf::as_path)
    }
}
