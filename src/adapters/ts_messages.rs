//! Reader for typed message definitions:
//!
//! ```ts
//! export default makeMessages('feat.home', {
//!   title: m('Home'),
//!   greeting: m<{ name: string }>('Hello {name}'),
//!   stats: {
//!     count: m<{ count: number | string }>('You have {count} items'),
//!   },
//! });
//! ```
//!
//! Files are parsed with tree-sitter; only `makeMessages` calls with a
//! literal prefix and an object literal are read.

use super::walk::find_files;
use super::MessageAdapter;
use crate::error::LyraError;
use crate::store::{Message, MessageParam};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use tree_sitter::{Node, Parser};

const MESSAGE_ID_PATTERNS: &[&str] = &["**/messageIds.ts"];

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

/// Named children without comments.
fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

fn unescape(sequence: &str) -> String {
    let mut chars = sequence.chars().skip(1);
    match chars.next() {
        Some('n') => "\n".to_string(),
        Some('t') => "\t".to_string(),
        Some('r') => "\r".to_string(),
        Some('\n') => String::new(),
        Some('x' | 'u') => {
            let hex: String = chars.filter(|c| c.is_ascii_hexdigit()).collect();
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Value of a string literal, a template without substitutions, or such
/// literals joined with `+`.
fn string_value(node: Node<'_>, source: &[u8]) -> Option<String> {
    match node.kind() {
        "string" | "template_string" => {
            let mut value = String::new();
            for part in named_children(node) {
                match part.kind() {
                    "string_fragment" => value.push_str(text(part, source)),
                    "escape_sequence" => value.push_str(&unescape(text(part, source))),
                    _ => return None,
                }
            }
            Some(value)
        }
        "binary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            if text(operator, source) != "+" {
                return None;
            }
            let mut value = string_value(node.child_by_field_name("left")?, source)?;
            value.push_str(&string_value(node.child_by_field_name("right")?, source)?);
            Some(value)
        }
        "parenthesized_expression" => {
            string_value(named_children(node).into_iter().next()?, source)
        }
        _ => None,
    }
}

fn key_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    match node.kind() {
        "property_identifier" | "number" => Some(text(node, source).to_string()),
        "string" => string_value(node, source),
        _ => None,
    }
}

fn is_call_to(call: Node<'_>, name: &str, source: &[u8]) -> bool {
    call.child_by_field_name("function")
        .is_some_and(|f| f.kind() == "identifier" && text(f, source) == name)
}

/// Flatten `a | b | c` into its member types, as written.
fn union_members(node: Node<'_>, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "union_type" {
        for member in named_children(node) {
            union_members(member, source, out);
        }
    } else {
        out.push(text(node, source).to_string());
    }
}

/// `<{ name: string; count?: number | string }>`
fn params(type_arguments: Node<'_>, source: &[u8]) -> Vec<MessageParam> {
    let mut params = Vec::new();
    for object_type in named_children(type_arguments) {
        if object_type.kind() != "object_type" {
            continue;
        }
        for signature in named_children(object_type) {
            if signature.kind() != "property_signature" {
                continue;
            }
            let Some(name) = signature
                .child_by_field_name("name")
                .and_then(|n| key_name(n, source))
            else {
                continue;
            };

            let mut types = Vec::new();
            if let Some(annotation) = signature.child_by_field_name("type") {
                for ty in named_children(annotation) {
                    union_members(ty, source, &mut types);
                }
            }
            params.push(MessageParam { name, types });
        }
    }
    params
}

/// `m('text')` or `m<{ ... }>('text')`
fn message(call: Node<'_>, id: String, source: &[u8]) -> Option<Message> {
    let arguments = call.child_by_field_name("arguments")?;
    let default_message = string_value(named_children(arguments).into_iter().next()?, source)?;
    let params = call
        .child_by_field_name("type_arguments")
        .map(|t| params(t, source))
        .unwrap_or_default();
    Some(Message {
        id,
        default_message,
        params,
    })
}

fn collect_object(object: Node<'_>, prefix: &str, source: &[u8], out: &mut Vec<Message>) {
    for pair in named_children(object) {
        if pair.kind() != "pair" {
            debug!("Skipping {} in messages of {}", pair.kind(), prefix);
            continue;
        }
        let (Some(key), Some(value)) = (
            pair.child_by_field_name("key"),
            pair.child_by_field_name("value"),
        ) else {
            continue;
        };
        let Some(key) = key_name(key, source) else {
            debug!("Skipping computed key in messages of {}", prefix);
            continue;
        };
        let id = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };

        match value.kind() {
            "object" => collect_object(value, &id, source, out),
            "call_expression" if is_call_to(value, "m", source) => {
                match message(value, id.clone(), source) {
                    Some(message) => out.push(message),
                    None => debug!("Skipping {}: default message is not a literal", id),
                }
            }
            _ => debug!("Skipping unsupported value for {}", id),
        }
    }
}

fn collect_calls(node: Node<'_>, source: &[u8], out: &mut Vec<Message>) {
    if node.kind() == "call_expression" && is_call_to(node, "makeMessages", source) {
        let arguments = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let prefix = arguments.first().and_then(|a| string_value(*a, source));
        match (prefix, arguments.get(1)) {
            (Some(prefix), Some(object)) if object.kind() == "object" => {
                collect_object(*object, &prefix, source, out)
            }
            _ => debug!("Skipping makeMessages call without literal prefix and object"),
        }
        return;
    }

    for child in named_children(node) {
        collect_calls(child, source, out);
    }
}

fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

/// Parse every `makeMessages('prefix', {...})` call in a source file.
pub fn parse_message_ids(source: &str) -> Result<Vec<Message>, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        .map_err(|e| e.to_string())?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser returned no tree".to_string())?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(0, |node| node.start_position().row + 1);
        return Err(format!("syntax error near line {}", line));
    }

    let mut messages = Vec::new();
    collect_calls(root, source.as_bytes(), &mut messages);
    Ok(messages)
}

/// Reads messages from `messageIds.ts` files below the messages directory.
pub struct TsMessageAdapter {
    dir: PathBuf,
}

impl TsMessageAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl MessageAdapter for TsMessageAdapter {
    async fn get_messages(&self) -> Result<Vec<Message>, LyraError> {
        let files = find_files(&self.dir, MESSAGE_ID_PATTERNS).await?;

        let mut messages = Vec::new();
        for file in files {
            let source = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| LyraError::adapter_read(&file, e))?;
            let parsed = parse_message_ids(&source)
                .map_err(|reason| LyraError::adapter_read(&file, reason))?;
            debug!("Read {} messages from {}", parsed.len(), file.display());
            messages.extend(parsed);
        }

        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(messages)
    }
}
