//! Formatting a tree back to `.proto` source and writing it out.
//!
//! Output must re-parse to an equivalent tree: same top-level names, same
//! package, same comments.

use std::fmt::Write as _;
use std::path::Path;

use crate::ast::{
    Comment, EnumDef, Field, FieldLabel, Item, Member, Message, OneOf, ProtoFile, ProtoOption,
    Rpc, Service, ServiceItem,
};
use crate::error::WriteError;

const INDENT: &str = "  ";

/// Formats a parsed file as proto source text.
pub fn format_file(tree: &ProtoFile) -> String {
    let mut out = String::new();
    let mut prev_kind: Option<u8> = None;

    for item in &tree.items {
        // Blank line between top-level items, except between consecutive
        // imports and consecutive options.
        let kind = match item {
            Item::Syntax(_) => 0,
            Item::Package(_) => 1,
            Item::Import(_) => 2,
            Item::Option(_) => 3,
            _ => 4,
        };
        if prev_kind.is_some() && !(prev_kind == Some(kind) && (kind == 2 || kind == 3)) {
            out.push('\n');
        }
        prev_kind = Some(kind);

        match item {
            Item::Syntax(s) => {
                write_comment(&mut out, "", s.comment.as_ref());
                let _ = writeln!(out, "syntax = \"{}\";", s.value);
            }
            Item::Package(p) => {
                write_comment(&mut out, "", p.comment.as_ref());
                let _ = writeln!(out, "package {};", p.name);
            }
            Item::Import(i) => {
                write_comment(&mut out, "", i.comment.as_ref());
                let modifier = if i.public { "public " } else { "" };
                let _ = writeln!(out, "import {}\"{}\";", modifier, i.path);
            }
            Item::Option(o) => write_option(&mut out, "", o),
            Item::Service(s) => write_service(&mut out, s),
            Item::Message(m) => write_message(&mut out, "", m),
            Item::Enum(e) => write_enum(&mut out, "", e),
        }
    }

    out
}

/// Formats the tree and writes it to `path`, creating parent directories.
pub fn write_file(tree: &ProtoFile, path: &Path) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, format_file(tree)).map_err(|source| WriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_comment(out: &mut String, indent: &str, comment: Option<&Comment>) {
    let Some(comment) = comment else {
        return;
    };
    if comment.block {
        let _ = writeln!(out, "{indent}/*");
        for line in &comment.lines {
            let _ = writeln!(out, "{indent}{}", line.text);
        }
        let _ = writeln!(out, "{indent}*/");
    } else {
        for line in &comment.lines {
            let _ = writeln!(out, "{indent}//{}", line.text);
        }
    }
}

fn inline_suffix(comment: Option<&Comment>) -> String {
    match comment.and_then(|c| c.lines.first()) {
        Some(line) => format!(" //{}", line.text),
        None => String::new(),
    }
}

fn write_option(out: &mut String, indent: &str, option: &ProtoOption) {
    write_comment(out, indent, option.comment.as_ref());
    let _ = writeln!(out, "{indent}option {} = {};", option.name, option.value);
}

fn write_service(out: &mut String, service: &Service) {
    write_comment(out, "", service.comment.as_ref());
    let _ = writeln!(out, "service {} {{", service.name);
    for item in &service.items {
        match item {
            ServiceItem::Rpc(rpc) => write_rpc(out, rpc),
            ServiceItem::Option(option) => write_option(out, INDENT, option),
        }
    }
    out.push_str("}\n");
}

fn write_rpc(out: &mut String, rpc: &Rpc) {
    write_comment(out, INDENT, rpc.comment.as_ref());
    let request_stream = if rpc.client_streaming { "stream " } else { "" };
    let response_stream = if rpc.server_streaming { "stream " } else { "" };
    let head = format!(
        "{INDENT}rpc {}({}{}) returns ({}{})",
        rpc.name, request_stream, rpc.request, response_stream, rpc.response
    );
    if rpc.options.is_empty() {
        let _ = writeln!(out, "{head};");
    } else {
        let _ = writeln!(out, "{head} {{");
        for option in &rpc.options {
            write_option(out, &format!("{INDENT}{INDENT}"), option);
        }
        let _ = writeln!(out, "{INDENT}}}");
    }
}

fn write_message(out: &mut String, indent: &str, message: &Message) {
    write_comment(out, indent, message.comment.as_ref());
    let _ = writeln!(out, "{indent}message {} {{", message.name);
    let inner = format!("{indent}{INDENT}");
    for member in &message.members {
        match member {
            Member::Field(field) => write_field(out, &inner, field),
            Member::OneOf(oneof) => write_oneof(out, &inner, oneof),
            Member::Message(nested) => write_message(out, &inner, nested),
            Member::Enum(nested) => write_enum(out, &inner, nested),
            Member::Option(option) => write_option(out, &inner, option),
            Member::Reserved(reserved) => {
                write_comment(out, &inner, reserved.comment.as_ref());
                let _ = writeln!(out, "{inner}reserved {};", reserved.ranges);
            }
        }
    }
    let _ = writeln!(out, "{indent}}}");
}

fn write_field(out: &mut String, indent: &str, field: &Field) {
    write_comment(out, indent, field.comment.as_ref());
    let type_part = match &field.map_key {
        Some(key) => format!("map<{}, {}>", key, field.type_name),
        None => match field.label {
            FieldLabel::Repeated => format!("repeated {}", field.type_name),
            FieldLabel::Optional => format!("optional {}", field.type_name),
            FieldLabel::None => field.type_name.clone(),
        },
    };
    let options = match &field.options {
        Some(raw) => format!(" [{raw}]"),
        None => String::new(),
    };
    let _ = writeln!(
        out,
        "{indent}{type_part} {} = {}{options};{}",
        field.name,
        field.number,
        inline_suffix(field.inline.as_ref())
    );
}

fn write_oneof(out: &mut String, indent: &str, oneof: &OneOf) {
    write_comment(out, indent, oneof.comment.as_ref());
    let _ = writeln!(out, "{indent}oneof {} {{", oneof.name);
    let inner = format!("{indent}{INDENT}");
    for field in &oneof.fields {
        write_field(out, &inner, field);
    }
    let _ = writeln!(out, "{indent}}}");
}

fn write_enum(out: &mut String, indent: &str, e: &EnumDef) {
    write_comment(out, indent, e.comment.as_ref());
    let _ = writeln!(out, "{indent}enum {} {{", e.name);
    let inner = format!("{indent}{INDENT}");
    for option in &e.options {
        write_option(out, &inner, option);
    }
    for value in &e.values {
        write_comment(out, &inner, value.comment.as_ref());
        let options = match &value.options {
            Some(raw) => format!(" [{raw}]"),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "{inner}{} = {}{options};{}",
            value.name,
            value.number,
            inline_suffix(value.inline.as_ref())
        );
    }
    let _ = writeln!(out, "{indent}}}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    const SOURCE: &str = r#"syntax = "proto3";

package orders;

import "common.proto";

option java_package = "com.example.orders";

// Order management.
service OrderService {
  // Lists orders.
  rpc ListOrders(ListOrdersRequest) returns (ListOrdersResponse);
  rpc Watch(WatchRequest) returns (stream WatchResponse);
}

message ListOrdersRequest {
  common.Pagination page = 1; // trailing
  repeated string statuses = 2;
  map<string, common.Money> totals = 3 [deprecated = true];
  oneof selector {
    string account_id = 4;
    uint64 order_id = 5;
  }
}

enum Status {
  ACTIVE = 0;
  CLOSED = 1;
}
"#;

    #[test]
    fn format_is_stable_for_canonical_input() {
        let tree = parse_source(SOURCE, Path::new("orders.proto")).unwrap();
        assert_eq!(format_file(&tree), SOURCE);
    }

    #[test]
    fn round_trip_preserves_names_package_and_comments() {
        let tree = parse_source(SOURCE, Path::new("orders.proto")).unwrap();
        let formatted = format_file(&tree);
        let reparsed = parse_source(&formatted, Path::new("orders.proto")).unwrap();

        assert_eq!(reparsed.package(), tree.package());
        let names = |t: &ProtoFile| -> Vec<String> {
            t.items
                .iter()
                .filter_map(|i| match i {
                    Item::Service(s) => Some(s.name.clone()),
                    Item::Message(m) => Some(m.name.clone()),
                    Item::Enum(e) => Some(e.name.clone()),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(names(&reparsed), names(&tree));

        let service = reparsed.services().next().unwrap();
        assert_eq!(
            service.comment.as_ref().unwrap().lines[0].text,
            " Order management."
        );
    }

    #[test]
    fn block_comments_are_emitted_as_blocks() {
        let tree = parse_source("/* Shared. */\nmessage Money {\n}\n", Path::new("m.proto")).unwrap();
        let formatted = format_file(&tree);
        assert!(formatted.starts_with("/*\n Shared. \n*/\nmessage Money {"));
    }

    #[test]
    fn write_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tree = parse_source("message M {\n}\n", Path::new("m.proto")).unwrap();
        let target = dir.path().join("nested/dir/m.proto");
        write_file(&tree, &target).unwrap();
        assert!(target.exists());
        assert!(std::fs::read_to_string(&target).unwrap().contains("message M {"));
    }
}
