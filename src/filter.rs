//! Name-based and annotation-based filtering over parsed trees.
//!
//! Name filtering expresses intent; the dependency graph's transitive
//! closure enforces completeness. Annotation filtering then removes
//! services, methods, and fields within each surviving file, and orphan
//! elimination cleans up definitions nothing references anymore.

use std::collections::HashSet;

use crate::annotations::{comment_has_any, extract_annotations};
use crate::ast::{qualified_name, Field, Item, Member, Message, ProtoFile, ServiceItem};
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::matcher::matches_any;

/// Applies include/exclude glob rules to the full FQN set and returns the
/// FQNs to keep.
///
/// # Errors
///
/// Invalid glob syntax is a `FilterError::Pattern`. An FQN matching both an
/// explicit include and an exclude pattern is a `FilterError::Conflict`:
/// such overlap almost always indicates a configuration mistake, so the
/// filter refuses to guess intent.
pub fn apply_filter(
    cfg: &FilterConfig,
    all_fqns: &[String],
) -> Result<HashSet<String>, FilterError> {
    if cfg.is_pass_through() {
        return Ok(all_fqns.iter().cloned().collect());
    }

    let mut kept: Vec<String> = if cfg.include.is_empty() {
        all_fqns.to_vec()
    } else {
        let mut kept = Vec::new();
        for fqn in all_fqns {
            if matches_any(fqn, &cfg.include)? {
                kept.push(fqn.clone());
            }
        }
        kept
    };

    if !cfg.exclude.is_empty() {
        // Sorted so a conflict always reports the same FQN.
        kept.sort();
        let mut result = HashSet::new();
        for fqn in kept {
            if matches_any(&fqn, &cfg.exclude)? {
                if !cfg.include.is_empty() && matches_any(&fqn, &cfg.include)? {
                    return Err(FilterError::Conflict { fqn });
                }
            } else {
                result.insert(fqn);
            }
        }
        return Ok(result);
    }

    Ok(kept.into_iter().collect())
}

/// Removes top-level declarations not in the kept-FQN set. Syntax, package,
/// imports, and options are always preserved.
pub fn prune_file(tree: &mut ProtoFile, keep: &HashSet<String>) {
    let pkg = tree.package().to_string();
    tree.items.retain(|item| match item {
        Item::Service(s) => keep.contains(&qualified_name(&pkg, &s.name)),
        Item::Message(m) => keep.contains(&qualified_name(&pkg, &m.name)),
        Item::Enum(e) => keep.contains(&qualified_name(&pkg, &e.name)),
        _ => true,
    });
}

/// Removes services whose own comment carries one of the excluded names.
/// Returns the number of services removed; an empty name list is a no-op.
pub fn exclude_services_by_annotation(tree: &mut ProtoFile, names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let before = tree.items.len();
    tree.items.retain(|item| match item {
        Item::Service(s) => !comment_has_any(s.comment.as_ref(), names),
        _ => true,
    });
    before - tree.items.len()
}

/// Removes RPC methods whose comment carries one of the excluded names.
pub fn exclude_methods_by_annotation(tree: &mut ProtoFile, names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let mut removed = 0;
    for service in tree.services_mut() {
        let before = service.items.len();
        service.items.retain(|item| match item {
            ServiceItem::Rpc(rpc) => !comment_has_any(rpc.comment.as_ref(), names),
            ServiceItem::Option(_) => true,
        });
        removed += before - service.items.len();
    }
    removed
}

fn field_carries_any(field: &Field, names: &[String]) -> bool {
    comment_has_any(field.comment.as_ref(), names) || comment_has_any(field.inline.as_ref(), names)
}

/// Removes fields (normal, map, and oneof members, recursing into nested
/// messages) whose leading or trailing comment carries an excluded name.
pub fn exclude_fields_by_annotation(tree: &mut ProtoFile, names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let mut removed = 0;
    for message in tree.messages_mut() {
        removed += exclude_fields_in_message(message, names);
    }
    removed
}

fn exclude_fields_in_message(message: &mut Message, names: &[String]) -> usize {
    let mut removed = 0;
    for member in &mut message.members {
        match member {
            Member::OneOf(oneof) => {
                let before = oneof.fields.len();
                oneof.fields.retain(|field| !field_carries_any(field, names));
                removed += before - oneof.fields.len();
            }
            Member::Message(nested) => {
                removed += exclude_fields_in_message(nested, names);
            }
            _ => {}
        }
    }
    let before = message.members.len();
    message.members.retain(|member| match member {
        Member::Field(field) => !field_carries_any(field, names),
        _ => true,
    });
    removed + (before - message.members.len())
}

/// Include mode for methods: a method survives only if its comment carries
/// one of the included names.
pub fn include_methods_by_annotation(tree: &mut ProtoFile, names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let mut removed = 0;
    for service in tree.services_mut() {
        let before = service.items.len();
        service.items.retain(|item| match item {
            ServiceItem::Rpc(rpc) => comment_has_any(rpc.comment.as_ref(), names),
            ServiceItem::Option(_) => true,
        });
        removed += before - service.items.len();
    }
    removed
}

/// Include mode for services: a service survives if its comment carries one
/// of the included names, or carries no recognized annotation at all, so
/// that method-level filtering still decides the fate of bare services.
pub fn include_services_by_annotation(tree: &mut ProtoFile, names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let before = tree.items.len();
    tree.items.retain(|item| match item {
        Item::Service(s) => {
            let found = extract_annotations(s.comment.as_ref());
            found.is_empty() || found.iter().any(|a| names.contains(a))
        }
        _ => true,
    });
    before - tree.items.len()
}

/// Removes services left with zero RPC methods.
pub fn remove_empty_services(tree: &mut ProtoFile) -> usize {
    let before = tree.items.len();
    tree.items.retain(|item| match item {
        Item::Service(s) => s.has_rpcs(),
        _ => true,
    });
    before - tree.items.len()
}

/// Collects the FQNs referenced by surviving RPC methods and message
/// fields, qualifying bare names with the file package and skipping scalar
/// field types.
pub fn collect_referenced_types(tree: &ProtoFile) -> HashSet<String> {
    let pkg = tree.package();
    let mut refs = HashSet::new();

    for service in tree.services() {
        for rpc in service.rpcs() {
            refs.insert(qualified_name(pkg, &rpc.request));
            refs.insert(qualified_name(pkg, &rpc.response));
        }
    }
    for message in tree.messages() {
        collect_message_refs(message, pkg, &mut refs);
    }

    refs
}

fn collect_message_refs(message: &Message, pkg: &str, refs: &mut HashSet<String>) {
    for member in &message.members {
        match member {
            Member::Field(field) => {
                if crate::ast::is_user_type(&field.type_name) {
                    refs.insert(qualified_name(pkg, &field.type_name));
                }
            }
            Member::OneOf(oneof) => {
                for field in &oneof.fields {
                    if crate::ast::is_user_type(&field.type_name) {
                        refs.insert(qualified_name(pkg, &field.type_name));
                    }
                }
            }
            Member::Message(nested) => collect_message_refs(nested, pkg, refs),
            _ => {}
        }
    }
}

/// Iteratively removes top-level messages and enums no longer referenced by
/// any surviving method or field, until a fixed point. Removing an orphan
/// can orphan something it referenced, hence the loop. Returns the total
/// removed count.
pub fn remove_orphaned_definitions(tree: &mut ProtoFile) -> usize {
    let mut total = 0;
    // Each productive iteration removes at least one declaration, so the
    // declaration count bounds the loop even if a future bug breaks the
    // removed == 0 exit.
    let cap = tree
        .items
        .iter()
        .filter(|item| matches!(item, Item::Message(_) | Item::Enum(_)))
        .count()
        + 1;

    for _ in 0..cap {
        let refs = collect_referenced_types(tree);
        let pkg = tree.package().to_string();
        let before = tree.items.len();
        tree.items.retain(|item| match item {
            Item::Message(m) => refs.contains(&qualified_name(&pkg, &m.name)),
            Item::Enum(e) => refs.contains(&qualified_name(&pkg, &e.name)),
            _ => true,
        });
        let removed = before - tree.items.len();
        total += removed;
        if removed == 0 {
            break;
        }
    }

    total
}
