//! Annotation substitution and comment rewriting.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::annotations::scan_line;
use crate::ast::{Comment, CommentLine, EnumDef, Item, Member, Message, ProtoFile, ServiceItem};
use crate::error::{AnnotationOccurrence, StrictSubstitutionError};

/// Replaces every annotation token whose name is a key in `subs` with the
/// mapped text. A `%s` placeholder in the replacement receives the token's
/// original arguments; an empty-string mapping deletes the token.
///
/// Lines blanked by substitution are dropped, and a comment whose lines are
/// all dropped is cleared to absent on its node. Returns the number of
/// tokens substituted.
pub fn substitute_annotations(tree: &mut ProtoFile, subs: &BTreeMap<String, String>) -> usize {
    if subs.is_empty() {
        return 0;
    }
    let mut count = 0;

    for slot in comment_slots(tree) {
        let Some(comment) = slot.as_mut() else {
            continue;
        };
        let mut kept = Vec::with_capacity(comment.lines.len());
        for line in comment.lines.drain(..) {
            match substitute_line(&line.text, subs) {
                Some((text, n)) => {
                    count += n;
                    if text.trim().is_empty() {
                        continue;
                    }
                    kept.push(CommentLine {
                        text,
                        line: line.line,
                    });
                }
                None => kept.push(line),
            }
        }
        comment.lines = kept;
        if comment.lines.is_empty() {
            *slot = None;
        }
    }

    count
}

/// Deletes every listed annotation. Equivalent to substituting each name
/// with the empty string.
pub fn strip_annotations(tree: &mut ProtoFile, names: &[String]) -> usize {
    let subs: BTreeMap<String, String> = names
        .iter()
        .map(|name| (name.clone(), String::new()))
        .collect();
    substitute_annotations(tree, &subs)
}

fn substitute_line(text: &str, subs: &BTreeMap<String, String>) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut last = 0;
    let mut count = 0;

    for token in scan_line(text) {
        let Some(replacement) = subs.get(&token.name) else {
            continue;
        };
        out.push_str(&text[last..token.start]);
        out.push_str(&replacement.replace("%s", token.args.as_deref().unwrap_or("")));
        last = token.end;
        count += 1;
    }

    if count == 0 {
        return None;
    }
    out.push_str(&text[last..]);
    Some((out, count))
}

/// Converts surviving block comments to line style: the block flag is
/// cleared, `*` decoration prefixes are stripped, and blank edge lines are
/// dropped. Comments are never removed here, only restyled.
pub fn convert_block_comments(tree: &mut ProtoFile) {
    for slot in comment_slots(tree) {
        let Some(comment) = slot.as_mut() else {
            continue;
        };
        if !comment.block {
            continue;
        }
        comment.block = false;

        let mut cleaned: Vec<CommentLine> = comment
            .lines
            .iter()
            .map(|line| {
                let mut text = line.text.trim_start();
                if let Some(rest) = text.strip_prefix('*') {
                    text = rest;
                }
                let text = text.trim();
                CommentLine {
                    text: if text.is_empty() {
                        String::new()
                    } else {
                        format!(" {text}")
                    },
                    line: line.line,
                }
            })
            .collect();

        while cleaned.first().map(|l| l.text.is_empty()).unwrap_or(false) {
            cleaned.remove(0);
        }
        while cleaned.last().map(|l| l.text.is_empty()).unwrap_or(false) {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push(CommentLine {
                text: String::new(),
                line: 0,
            });
        }
        comment.lines = cleaned;
    }
}

/// Collects every annotation occurrence in the file's comments, with the
/// given relative path recorded on each record.
pub fn collect_annotations(tree: &ProtoFile, file: &Path) -> Vec<AnnotationOccurrence> {
    let mut out = Vec::new();
    for comment in comments(tree) {
        crate::annotations::collect_occurrences(Some(comment), file, &mut out);
    }
    out
}

/// Verifies that every collected annotation has a substitution mapping.
///
/// On failure the error carries the distinct missing names (sorted) and the
/// occurrences of those names, sorted by file path then line number.
pub fn check_strict_substitutions(
    occurrences: Vec<AnnotationOccurrence>,
    subs: &BTreeMap<String, String>,
) -> Result<(), StrictSubstitutionError> {
    let mut unmapped: Vec<AnnotationOccurrence> = occurrences
        .into_iter()
        .filter(|occ| !subs.contains_key(&occ.name))
        .collect();
    if unmapped.is_empty() {
        return Ok(());
    }

    let missing: BTreeSet<String> = unmapped.iter().map(|occ| occ.name.clone()).collect();
    unmapped.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

    Err(StrictSubstitutionError {
        missing: missing.into_iter().collect(),
        occurrences: unmapped,
    })
}

// --- Comment traversal ---

fn comment_slots(tree: &mut ProtoFile) -> Vec<&mut Option<Comment>> {
    let mut slots = Vec::new();
    for item in &mut tree.items {
        match item {
            Item::Syntax(s) => slots.push(&mut s.comment),
            Item::Package(p) => slots.push(&mut p.comment),
            Item::Import(i) => slots.push(&mut i.comment),
            Item::Option(o) => slots.push(&mut o.comment),
            Item::Service(service) => {
                slots.push(&mut service.comment);
                for si in &mut service.items {
                    match si {
                        ServiceItem::Rpc(rpc) => {
                            slots.push(&mut rpc.comment);
                            for option in &mut rpc.options {
                                slots.push(&mut option.comment);
                            }
                        }
                        ServiceItem::Option(option) => slots.push(&mut option.comment),
                    }
                }
            }
            Item::Message(message) => message_slots(message, &mut slots),
            Item::Enum(e) => enum_slots(e, &mut slots),
        }
    }
    slots
}

fn message_slots<'a>(message: &'a mut Message, slots: &mut Vec<&'a mut Option<Comment>>) {
    slots.push(&mut message.comment);
    for member in &mut message.members {
        match member {
            Member::Field(field) => {
                slots.push(&mut field.comment);
                slots.push(&mut field.inline);
            }
            Member::OneOf(oneof) => {
                slots.push(&mut oneof.comment);
                for field in &mut oneof.fields {
                    slots.push(&mut field.comment);
                    slots.push(&mut field.inline);
                }
            }
            Member::Message(nested) => message_slots(nested, slots),
            Member::Enum(nested) => enum_slots(nested, slots),
            Member::Option(option) => slots.push(&mut option.comment),
            Member::Reserved(reserved) => slots.push(&mut reserved.comment),
        }
    }
}

fn enum_slots<'a>(e: &'a mut EnumDef, slots: &mut Vec<&'a mut Option<Comment>>) {
    slots.push(&mut e.comment);
    for option in &mut e.options {
        slots.push(&mut option.comment);
    }
    for value in &mut e.values {
        slots.push(&mut value.comment);
        slots.push(&mut value.inline);
    }
}

fn comments(tree: &ProtoFile) -> Vec<&Comment> {
    let mut out = Vec::new();
    for item in &tree.items {
        match item {
            Item::Syntax(s) => out.extend(s.comment.as_ref()),
            Item::Package(p) => out.extend(p.comment.as_ref()),
            Item::Import(i) => out.extend(i.comment.as_ref()),
            Item::Option(o) => out.extend(o.comment.as_ref()),
            Item::Service(service) => {
                out.extend(service.comment.as_ref());
                for si in &service.items {
                    match si {
                        ServiceItem::Rpc(rpc) => {
                            out.extend(rpc.comment.as_ref());
                            for option in &rpc.options {
                                out.extend(option.comment.as_ref());
                            }
                        }
                        ServiceItem::Option(option) => out.extend(option.comment.as_ref()),
                    }
                }
            }
            Item::Message(message) => message_comments(message, &mut out),
            Item::Enum(e) => enum_comments(e, &mut out),
        }
    }
    out
}

fn message_comments<'a>(message: &'a Message, out: &mut Vec<&'a Comment>) {
    out.extend(message.comment.as_ref());
    for member in &message.members {
        match member {
            Member::Field(field) => {
                out.extend(field.comment.as_ref());
                out.extend(field.inline.as_ref());
            }
            Member::OneOf(oneof) => {
                out.extend(oneof.comment.as_ref());
                for field in &oneof.fields {
                    out.extend(field.comment.as_ref());
                    out.extend(field.inline.as_ref());
                }
            }
            Member::Message(nested) => message_comments(nested, out),
            Member::Enum(nested) => enum_comments(nested, out),
            Member::Option(option) => out.extend(option.comment.as_ref()),
            Member::Reserved(reserved) => out.extend(reserved.comment.as_ref()),
        }
    }
}

fn enum_comments<'a>(e: &'a EnumDef, out: &mut Vec<&'a Comment>) {
    out.extend(e.comment.as_ref());
    for option in &e.options {
        out.extend(option.comment.as_ref());
    }
    for value in &e.values {
        out.extend(value.comment.as_ref());
        out.extend(value.inline.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::PathBuf;

    fn parse(source: &str) -> ProtoFile {
        parse_source(source, Path::new("test.proto")).unwrap()
    }

    fn subs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_token_with_replacement() {
        let mut tree = parse("// Access: @HasAnyRole(admin)\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        let count = substitute_annotations(&mut tree, &subs(&[("HasAnyRole", "Requires role: %s")]));
        assert_eq!(count, 1);
        let service = tree.services().next().unwrap();
        assert_eq!(
            service.comment.as_ref().unwrap().lines[0].text,
            " Access: Requires role: admin"
        );
    }

    #[test]
    fn placeholder_without_args_becomes_empty() {
        let mut tree = parse("// @Audited\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        substitute_annotations(&mut tree, &subs(&[("Audited", "audited:%s.")]));
        let service = tree.services().next().unwrap();
        assert_eq!(service.comment.as_ref().unwrap().lines[0].text, " audited:.");
    }

    #[test]
    fn bracket_tokens_are_substituted_too() {
        let mut tree = parse("// [RateLimit(100)]\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        let count = substitute_annotations(&mut tree, &subs(&[("RateLimit", "limit=%s")]));
        assert_eq!(count, 1);
        let service = tree.services().next().unwrap();
        assert_eq!(service.comment.as_ref().unwrap().lines[0].text, " limit=100");
    }

    #[test]
    fn blanked_comment_becomes_absent() {
        let mut tree = parse("// @HasAnyRole\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        let count = substitute_annotations(&mut tree, &subs(&[("HasAnyRole", "")]));
        assert_eq!(count, 1);
        let service = tree.services().next().unwrap();
        assert!(service.comment.is_none());
    }

    #[test]
    fn only_blanked_lines_are_dropped() {
        let mut tree = parse("// Keeps this line.\n// @Internal\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        substitute_annotations(&mut tree, &subs(&[("Internal", "")]));
        let service = tree.services().next().unwrap();
        let comment = service.comment.as_ref().unwrap();
        assert_eq!(comment.lines.len(), 1);
        assert_eq!(comment.lines[0].text, " Keeps this line.");
    }

    #[test]
    fn untouched_blank_lines_survive() {
        let mut tree = parse("// before\n//\n// after @Internal\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        substitute_annotations(&mut tree, &subs(&[("Internal", "")]));
        let service = tree.services().next().unwrap();
        let texts: Vec<_> = service
            .comment
            .as_ref()
            .unwrap()
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec![" before", "", " after "]);
    }

    #[test]
    fn strip_is_substitution_with_empty_strings() {
        let mut tree = parse("// @A @B keep\nservice S {\n  rpc M(Q) returns (R);\n}\n");
        let count = strip_annotations(&mut tree, &["A".to_string(), "B".to_string()]);
        assert_eq!(count, 2);
        let service = tree.services().next().unwrap();
        assert_eq!(service.comment.as_ref().unwrap().lines[0].text, "  keep");
    }

    #[test]
    fn inline_field_comments_are_substituted() {
        let mut tree = parse("message M {\n  string id = 1; // @Internal\n}\n");
        let count = substitute_annotations(&mut tree, &subs(&[("Internal", "")]));
        assert_eq!(count, 1);
        let message = tree.messages().next().unwrap();
        let Member::Field(field) = &message.members[0] else {
            panic!("expected field");
        };
        assert!(field.inline.is_none());
    }

    #[test]
    fn converts_block_comments_to_line_style() {
        let mut tree = parse("/*\n * PaymentStatus tracks payment state.\n * @Internal\n */\nmessage PaymentStatus {\n}\n");
        convert_block_comments(&mut tree);
        let message = tree.messages().next().unwrap();
        let comment = message.comment.as_ref().unwrap();
        assert!(!comment.block);
        let texts: Vec<_> = comment.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![" PaymentStatus tracks payment state.", " @Internal"]
        );
    }

    #[test]
    fn conversion_preserves_annotations_and_count() {
        let mut tree = parse("/* @StartsWithSnapshot @SupportWindow(30d) */\nservice S {\n  rpc A(Q) returns (R);\n}\n");
        convert_block_comments(&mut tree);
        let service = tree.services().next().unwrap();
        let names = crate::annotations::extract_annotations(service.comment.as_ref());
        assert_eq!(names, vec!["StartsWithSnapshot", "SupportWindow"]);
    }

    #[test]
    fn collects_occurrences_across_the_tree() {
        let tree = parse(
            "// @A\nservice S {\n  // @B(x)\n  rpc M(Q) returns (R);\n}\nmessage Q {\n  string id = 1; // [C]\n}\n",
        );
        let occ = collect_annotations(&tree, Path::new("f.proto"));
        let names: Vec<_> = occ.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(occ.iter().all(|o| o.file == PathBuf::from("f.proto")));
    }

    #[test]
    fn strict_check_passes_when_all_mapped() {
        let tree = parse("// @A\nservice S {\n  rpc M(Q) returns (R);\n}\n");
        let occ = collect_annotations(&tree, Path::new("f.proto"));
        assert!(check_strict_substitutions(occ, &subs(&[("A", "")])).is_ok());
    }

    #[test]
    fn strict_check_reports_sorted_names_and_locations() {
        let mut occurrences = Vec::new();
        let zeta = parse("// @Zeta\nservice S {\n  rpc M(Q) returns (R);\n}\n");
        occurrences.extend(collect_annotations(&zeta, Path::new("zeta.proto")));
        let alpha = parse("service T {\n  // @Alpha(1)\n  rpc N(Q) returns (R);\n}\n// @Alpha(2)\nmessage Q {\n}\n");
        occurrences.extend(collect_annotations(&alpha, Path::new("alpha.proto")));

        let err = check_strict_substitutions(occurrences, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.missing, vec!["Alpha", "Zeta"]);
        let locations: Vec<_> = err
            .occurrences
            .iter()
            .map(|o| (o.file.display().to_string(), o.line))
            .collect();
        assert_eq!(
            locations,
            vec![
                ("alpha.proto".to_string(), 2),
                ("alpha.proto".to_string(), 5),
                ("zeta.proto".to_string(), 1),
            ]
        );
    }
}
