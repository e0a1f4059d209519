//! Glob matching of dotted fully-qualified names.

use globset::GlobBuilder;

use crate::error::FilterError;

/// Returns true if `fqn` matches any of the glob patterns.
///
/// Dots in FQNs and patterns are treated as path separators, so a `*`
/// segment matches exactly one dotted component: `my.package.*` matches
/// `my.package.Foo` but not `my.package.sub.Bar`. A pattern with a leading
/// `*.` segment is additionally tried as a suffix match, so
/// `*.OrderService` matches `my.package.OrderService`. There is no
/// equivalent shortcut for trailing `*.` segments.
///
/// # Errors
///
/// Returns `FilterError::Pattern` for invalid glob syntax, naming the
/// offending pattern.
pub fn matches_any(fqn: &str, patterns: &[String]) -> Result<bool, FilterError> {
    for pattern in patterns {
        if match_glob(fqn, pattern)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn match_glob(fqn: &str, pattern: &str) -> Result<bool, FilterError> {
    let fqn_path = fqn.replace('.', "/");
    let pattern_path = pattern.replace('.', "/");

    let glob = GlobBuilder::new(&pattern_path)
        .literal_separator(true)
        .build()
        .map_err(|source| FilterError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
    if glob.compile_matcher().is_match(&fqn_path) {
        return Ok(true);
    }

    // Leading-wildcard patterns also match as a plain suffix: "any package,
    // specific final name" is the dominant use case.
    if let Some(suffix) = pattern_path.strip_prefix("*/") {
        if fqn_path == suffix || fqn_path.ends_with(&format!("/{suffix}")) {
            return Ok(true);
        }
    }

    Ok(false)
}
