//! YAML filter configuration.
//!
//! ```yaml
//! include:
//!   - "orders.*"
//! exclude:
//!   - "*.AdminService"
//! annotations:
//!   exclude: [Internal]
//! substitutions:
//!   HasAnyRole: "Requires role: %s"
//! strict_substitutions: true
//! ```
//!
//! The `annotations` key also accepts the legacy flat form — a plain list,
//! treated as an exclude list.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, SeqAccess};
use serde::Deserialize;

use crate::error::ConfigError;

/// Annotation include/exclude rule lists. At most one side may be
/// populated; `FilterConfig::validate` enforces the exclusivity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRules {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl<'de> Deserialize<'de> for AnnotationRules {
    /// Accepts either the legacy flat form (a sequence, implicitly an
    /// exclude list) or the structured mapping form with `include` /
    /// `exclude` sub-lists.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RulesVisitor;

        #[derive(Deserialize)]
        struct Structured {
            #[serde(default)]
            include: Vec<String>,
            #[serde(default)]
            exclude: Vec<String>,
        }

        impl<'de> de::Visitor<'de> for RulesVisitor {
            type Value = AnnotationRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of annotation names or a mapping with include/exclude")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut exclude = Vec::new();
                while let Some(name) = seq.next_element::<String>()? {
                    exclude.push(name);
                }
                Ok(AnnotationRules {
                    include: Vec::new(),
                    exclude,
                })
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let structured =
                    Structured::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(AnnotationRules {
                    include: structured.include,
                    exclude: structured.exclude,
                })
            }
        }

        deserializer.deserialize_any(RulesVisitor)
    }
}

/// Filter configuration loaded from a YAML file. Read-only after loading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns selecting FQNs to keep.
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns selecting FQNs to drop.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub annotations: AnnotationRules,
    /// Annotation name → replacement text. An empty string deletes the
    /// token. `%s` in the replacement receives the token's arguments.
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
    /// Fail the run if any discovered annotation lacks a substitution.
    #[serde(default)]
    pub strict_substitutions: bool,
}

impl FilterConfig {
    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<FilterConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses a YAML configuration document.
    pub fn from_yaml_str(text: &str) -> Result<FilterConfig, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::InvalidYaml { source })
    }

    /// Checks the configuration for invalid combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.annotations.include.is_empty() && !self.annotations.exclude.is_empty() {
            return Err(ConfigError::ExclusiveAnnotationRules);
        }
        Ok(())
    }

    /// True if no filter rules are defined at all.
    pub fn is_pass_through(&self) -> bool {
        self.include.is_empty()
            && self.exclude.is_empty()
            && self.annotations.include.is_empty()
            && self.annotations.exclude.is_empty()
    }

    pub fn has_annotations(&self) -> bool {
        !self.annotations.include.is_empty() || !self.annotations.exclude.is_empty()
    }

    pub fn has_annotation_include(&self) -> bool {
        !self.annotations.include.is_empty()
    }

    pub fn has_annotation_exclude(&self) -> bool {
        !self.annotations.exclude.is_empty()
    }

    pub fn has_substitutions(&self) -> bool {
        !self.substitutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg = FilterConfig::from_yaml_str(
            r#"
include:
  - "orders.*"
exclude:
  - "*.AdminService"
annotations:
  exclude: [Internal, HasAnyRole]
substitutions:
  HasAnyRole: "Requires role: %s"
  Internal: ""
strict_substitutions: true
"#,
        )
        .unwrap();
        assert_eq!(cfg.include, vec!["orders.*"]);
        assert_eq!(cfg.exclude, vec!["*.AdminService"]);
        assert_eq!(cfg.annotations.exclude, vec!["Internal", "HasAnyRole"]);
        assert!(cfg.annotations.include.is_empty());
        assert_eq!(
            cfg.substitutions.get("HasAnyRole").map(String::as_str),
            Some("Requires role: %s")
        );
        assert_eq!(cfg.substitutions.get("Internal").map(String::as_str), Some(""));
        assert!(cfg.strict_substitutions);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn legacy_flat_annotations_become_exclude_list() {
        let cfg = FilterConfig::from_yaml_str("annotations:\n  - \"HasAnyRole\"\n  - Internal\n")
            .unwrap();
        assert_eq!(cfg.annotations.exclude, vec!["HasAnyRole", "Internal"]);
        assert!(cfg.annotations.include.is_empty());
        assert!(cfg.has_annotation_exclude());
    }

    #[test]
    fn structured_include_form() {
        let cfg = FilterConfig::from_yaml_str("annotations:\n  include: [Public]\n").unwrap();
        assert_eq!(cfg.annotations.include, vec!["Public"]);
        assert!(cfg.has_annotation_include());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn both_rule_halves_fail_validation() {
        let cfg = FilterConfig::from_yaml_str(
            "annotations:\n  include: [Public]\n  exclude: [Internal]\n",
        )
        .unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ExclusiveAnnotationRules)
        ));
    }

    #[test]
    fn empty_document_is_pass_through() {
        let cfg = FilterConfig::from_yaml_str("{}").unwrap();
        assert!(cfg.is_pass_through());
        assert!(!cfg.has_annotations());
        assert!(!cfg.has_substitutions());
    }

    #[test]
    fn substitutions_alone_stay_pass_through() {
        let cfg = FilterConfig::from_yaml_str("substitutions:\n  HasAnyRole: \"\"\n").unwrap();
        assert!(cfg.is_pass_through());
        assert!(cfg.has_substitutions());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = FilterConfig::from_yaml_str("include: [not closed").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidYaml { .. }));
    }

    #[test]
    fn annotations_scalar_is_rejected() {
        let err = FilterConfig::from_yaml_str("annotations: 12\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidYaml { .. }));
    }
}
