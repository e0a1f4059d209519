//! Proto Schema Pruner
//!
//! Produces a reduced, self-consistent subset of a `.proto` file tree,
//! keeping only the declarations a consumer actually needs.
//!
//! Filtering is driven by a YAML configuration: glob rules over fully
//! qualified names select declarations, annotation rules remove services,
//! methods and fields marked in comments, and a substitution map rewrites
//! or strips the annotation tokens themselves. The dependency graph widens
//! every selection to its transitive closure so the output always
//! round-trips through a proto parser.
//!
//! # Example
//!
//! ```
//! use protoprune::{matches_any, FilterConfig};
//!
//! let cfg = FilterConfig::from_yaml_str("include:\n  - \"orders.*\"\n").unwrap();
//! assert!(matches_any("orders.OrderService", &cfg.include).unwrap());
//! assert!(!matches_any("billing.InvoiceService", &cfg.include).unwrap());
//! ```
//!
//! # Annotation syntax
//!
//! Both marker styles are recognized anywhere in a comment and treated
//! identically:
//!
//! ```text
//! // @HasAnyRole(admin, support)
//! // [Internal]
//! ```

pub mod annotations;
pub mod ast;
mod config;
mod error;
pub mod filter;
mod graph;
mod matcher;
pub mod parser;
mod pipeline;
pub mod subst;
pub mod writer;

pub use config::{AnnotationRules, FilterConfig};
pub use error::{
    AnnotationOccurrence, ConfigError, FilterError, ParseError, PipelineError,
    StrictSubstitutionError, WriteError,
};
pub use graph::{Definition, DefinitionKind, Graph};
pub use matcher::matches_any;
pub use pipeline::{run, PipelineOptions, Summary};
