//! Annotation extraction from declaration comments.
//!
//! Annotations are marker tokens embedded in comment text. Two syntaxes are
//! recognized and treated identically:
//!
//! ```text
//! @Name        @Name(args)
//! [Name]       [Name(args)]
//! ```
//!
//! Names match `\w[\w.]*`, case-sensitively, with no normalization. The
//! arguments are kept only for argument-aware substitution.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::ast::Comment;
use crate::error::AnnotationOccurrence;

/// One annotation token found in a comment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationToken {
    pub name: String,
    /// Text between the parentheses, if the token had any.
    pub args: Option<String>,
    /// Byte range of the whole token within the line.
    pub start: usize,
    pub end: usize,
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"@(?P<an>\w[\w.]*)(?:\((?P<aa>[^)]*)\))?|\[(?P<bn>\w[\w.]*)(?:\((?P<ba>[^)]*)\))?\]",
        )
        .expect("annotation token regex")
    })
}

/// Scan one line of comment text for annotation tokens, in positional order.
pub fn scan_line(text: &str) -> Vec<AnnotationToken> {
    token_regex()
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).expect("match has a whole-token group");
            let (name, args) = if let Some(name) = caps.name("an") {
                (name, caps.name("aa"))
            } else {
                (caps.name("bn").expect("bracket name group"), caps.name("ba"))
            };
            AnnotationToken {
                name: name.as_str().to_string(),
                args: args.map(|m| m.as_str().to_string()),
                start: whole.start(),
                end: whole.end(),
            }
        })
        .collect()
}

/// Returns the annotation names found in a comment, in source order,
/// duplicates preserved. A missing comment yields an empty list.
pub fn extract_annotations(comment: Option<&Comment>) -> Vec<String> {
    let Some(comment) = comment else {
        return Vec::new();
    };
    comment
        .lines
        .iter()
        .flat_map(|line| scan_line(&line.text))
        .map(|token| token.name)
        .collect()
}

/// True if the comment carries at least one of the given names.
pub fn comment_has_any(comment: Option<&Comment>, names: &[String]) -> bool {
    extract_annotations(comment)
        .iter()
        .any(|found| names.iter().any(|n| n == found))
}

/// Append an occurrence record for every annotation token in the comment.
pub fn collect_occurrences(
    comment: Option<&Comment>,
    file: &Path,
    out: &mut Vec<AnnotationOccurrence>,
) {
    let Some(comment) = comment else {
        return;
    };
    for line in &comment.lines {
        for token in scan_line(&line.text) {
            out.push(AnnotationOccurrence {
                file: file.to_path_buf(),
                line: line.line,
                name: token.name,
                token: line.text[token.start..token.end].to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(lines: &[&str]) -> Comment {
        Comment::from_text_lines(lines.iter().copied(), 1, false)
    }

    #[test]
    fn scans_at_syntax() {
        let tokens = scan_line(" Lists orders. @HasAnyRole(admin, support) @Internal");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "HasAnyRole");
        assert_eq!(tokens[0].args.as_deref(), Some("admin, support"));
        assert_eq!(tokens[1].name, "Internal");
        assert_eq!(tokens[1].args, None);
    }

    #[test]
    fn scans_bracket_syntax() {
        let tokens = scan_line(" [Deprecated] and [RateLimit(100)]");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "Deprecated");
        assert_eq!(tokens[1].name, "RateLimit");
        assert_eq!(tokens[1].args.as_deref(), Some("100"));
    }

    #[test]
    fn token_range_covers_whole_token() {
        let text = "see @Audit(all) here";
        let tokens = scan_line(text);
        assert_eq!(&text[tokens[0].start..tokens[0].end], "@Audit(all)");
    }

    #[test]
    fn dotted_names_are_one_token() {
        let tokens = scan_line("@acl.HasAnyRole(x)");
        assert_eq!(tokens[0].name, "acl.HasAnyRole");
    }

    #[test]
    fn bracket_without_closing_is_not_a_token() {
        assert!(scan_line("[deprecated = true").is_empty());
        // Bracketed text with spaces after the name is not an annotation.
        assert!(scan_line("[deprecated = true]").is_empty());
    }

    #[test]
    fn extract_preserves_order_and_duplicates() {
        let c = comment(&[" @A first", " [B] then @A again"]);
        assert_eq!(extract_annotations(Some(&c)), vec!["A", "B", "A"]);
    }

    #[test]
    fn extract_from_missing_comment_is_empty() {
        assert!(extract_annotations(None).is_empty());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let c = comment(&[" @internal"]);
        assert!(!comment_has_any(Some(&c), &["Internal".to_string()]));
        assert!(comment_has_any(Some(&c), &["internal".to_string()]));
    }

    #[test]
    fn occurrences_carry_file_line_and_raw_token() {
        let c = Comment::from_text_lines([" @HasAnyRole(admin)", " plain", " [Internal]"], 10, false);
        let mut out = Vec::new();
        collect_occurrences(Some(&c), Path::new("orders.proto"), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].line, 10);
        assert_eq!(out[0].token, "@HasAnyRole(admin)");
        assert_eq!(out[1].line, 12);
        assert_eq!(out[1].token, "[Internal]");
        assert!(out.iter().all(|o| o.file == Path::new("orders.proto")));
    }
}
