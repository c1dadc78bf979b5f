//! A renderer for the subset of EJS used by configuration templates.
//!
//! Supported tags:
//! - `<%= name %>` escaped output
//! - `<%- name %>` raw output
//! - `<%# ... %>` comment
//! - `<%%` and `%%>` literal delimiters
//!
//! A closing `-%>` swallows the newline directly after the tag. Scriptlets
//! (`<% ... %>`) and expressions other than a bare name are rejected.

use std::{fs, path::Path};

use serde_json::{Map, Value};
use thiserror::Error;

const OPEN: &str = "<%";
const CLOSE: &str = "%>";
const LITERAL_OPEN: &str = "<%%";
const LITERAL_CLOSE: &str = "%%>";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{name} is not defined (line {line})")]
    UndefinedVariable { name: String, line: usize },

    #[error("Unsupported tag '{tag}' (line {line})")]
    UnsupportedTag { tag: String, line: usize },

    #[error("Could not find matching close tag for '<%' (line {line})")]
    UnclosedTag { line: usize },
}

/// Renders a template file with a set of named values.
pub trait Render: Send + Sync {
    fn render_file(
        &self,
        template: &Path,
        context: &Map<String, Value>,
    ) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EjsRenderer;

impl Render for EjsRenderer {
    fn render_file(
        &self,
        template: &Path,
        context: &Map<String, Value>,
    ) -> Result<String, RenderError> {
        let source = fs::read_to_string(template)?;
        render(&source, context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Escaped,
    Raw,
    Comment,
}

pub fn render(source: &str, context: &Map<String, Value>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find(OPEN) {
        let (text, tag) = rest.split_at(start);
        push_text(&mut out, text);
        line += text.matches('\n').count();

        if tag.starts_with(LITERAL_OPEN) {
            out.push_str(OPEN);
            rest = &tag[LITERAL_OPEN.len()..];
            continue;
        }

        let body = &tag[OPEN.len()..];
        let kind = match body.chars().next() {
            Some('=') => TagKind::Escaped,
            Some('-') => TagKind::Raw,
            Some('#') => TagKind::Comment,
            _ => {
                return Err(RenderError::UnsupportedTag {
                    tag: opening_of(tag),
                    line,
                });
            }
        };
        let body = &body[1..];

        let end = body.find(CLOSE).ok_or(RenderError::UnclosedTag { line })?;
        let (inner, trim_newline) = match body[..end].strip_suffix('-') {
            Some(inner) => (inner, true),
            None => (&body[..end], false),
        };
        let mut next = &body[end + CLOSE.len()..];

        if trim_newline {
            next = next
                .strip_prefix("\r\n")
                .or_else(|| next.strip_prefix('\n'))
                .unwrap_or(next);
        }

        let tag_line = line;
        line += tag[..tag.len() - next.len()].matches('\n').count();
        rest = next;

        if kind == TagKind::Comment {
            continue;
        }

        let name = inner.trim();
        if !is_identifier(name) {
            return Err(RenderError::UnsupportedTag {
                tag: opening_of(tag),
                line: tag_line,
            });
        }

        let value = context
            .get(name)
            .ok_or_else(|| RenderError::UndefinedVariable {
                name: name.to_string(),
                line: tag_line,
            })?;

        let text = value_text(value);
        match kind {
            TagKind::Escaped => escape_into(&mut out, &text),
            _ => out.push_str(&text),
        }
    }

    push_text(&mut out, rest);
    Ok(out)
}

fn push_text(out: &mut String, text: &str) {
    out.push_str(&text.replace(LITERAL_CLOSE, CLOSE));
}

fn opening_of(tag: &str) -> String {
    let end = tag.find(CLOSE).map_or(tag.len(), |end| end + CLOSE.len());
    tag[..end].lines().next().unwrap_or(tag).to_string()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
