//! Built-in stylesheet engine.
//!
//! Covers the subset of `.less` that most dev setups lean on: `@import`
//! chains are inlined depth-first (each file at most once), `//` line
//! comments are dropped and top-level `@name: value;` declarations are
//! substituted into the rules that follow them. Imports of plain CSS
//! (`*.css`, `url(...)`, remote URLs) are left for the browser. No source
//! maps are produced.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::{EngineError, ImportLoader, RenderOutput, RenderRequest, StyleEngine};

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineImportEngine;

#[async_trait]
impl StyleEngine for InlineImportEngine {
    fn name(&self) -> &str {
        "inline-import"
    }

    async fn render(
        &self,
        request: RenderRequest<'_>,
        loader: &dyn ImportLoader,
    ) -> Result<RenderOutput, EngineError> {
        let expanded = expand_imports(request, loader).await?;
        let css = substitute_variables(&expanded)?;
        Ok(RenderOutput {
            css,
            map: None,
            imports: expanded.imports,
        })
    }
}

struct SourceFile {
    path: PathBuf,
    contents: String,
    lines: Vec<String>,
}

impl SourceFile {
    fn new(path: PathBuf, contents: String) -> Self {
        let lines = contents.lines().map(str::to_string).collect();
        Self {
            path,
            contents,
            lines,
        }
    }
}

/// One output line and where it came from.
struct Line {
    text: String,
    origin: usize,
    number: u32,
}

struct Expanded {
    files: Vec<SourceFile>,
    lines: Vec<Line>,
    imports: Vec<PathBuf>,
}

#[derive(Clone, Copy)]
struct Cursor {
    origin: usize,
    next: usize,
}

async fn expand_imports(
    request: RenderRequest<'_>,
    loader: &dyn ImportLoader,
) -> Result<Expanded, EngineError> {
    let entry = request.file.clean();
    let mut seen = FxHashSet::default();
    seen.insert(entry.clone());

    let mut files = vec![SourceFile::new(entry, request.code.to_string())];
    let mut lines = Vec::new();
    let mut imports = Vec::new();
    let mut stack = vec![Cursor { origin: 0, next: 0 }];

    while let Some(cursor) = stack.last().copied() {
        let Some(text) = files[cursor.origin].lines.get(cursor.next).cloned() else {
            stack.pop();
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.next += 1;
        }
        let number = cursor.next as u32 + 1;

        if text.trim_start().starts_with("//") {
            continue;
        }

        let Some(specifier) = parse_import(&text).filter(|spec| !is_plain_css(spec)) else {
            lines.push(Line {
                text,
                origin: cursor.origin,
                number,
            });
            continue;
        };

        let importer = &files[cursor.origin].path;
        let dir = importer.parent().unwrap_or(Path::new("")).to_path_buf();
        let loaded = loader
            .load(specifier, &dir)
            .await
            .map_err(|message| EngineError::Import {
                specifier: specifier.to_string(),
                file: importer.clone(),
                line: number,
                message,
            })?;

        let path = loaded.path.clean();
        if !seen.insert(path.clone()) {
            continue;
        }
        imports.push(path.clone());
        files.push(SourceFile::new(path, loaded.contents));
        stack.push(Cursor {
            origin: files.len() - 1,
            next: 0,
        });
    }

    Ok(Expanded {
        files,
        lines,
        imports,
    })
}

/// Specifier of an `@import` statement, if `line` is one.
fn parse_import(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("@import")?;
    if !rest.starts_with([' ', '\t', '"', '\'', '(']) {
        return None;
    }
    let mut rest = rest.trim_start();

    // Import options such as `(reference)` or `(css)`.
    if let Some(options) = rest.strip_prefix('(') {
        let (_, after) = options.split_once(')')?;
        rest = after.trim_start();
    }

    if rest.starts_with("url(") {
        return Some(rest.trim_end_matches(';').trim_end());
    }

    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(&inner[..end])
}

fn is_plain_css(specifier: &str) -> bool {
    specifier.ends_with(".css")
        || specifier.starts_with("url(")
        || specifier.starts_with("http://")
        || specifier.starts_with("https://")
        || specifier.starts_with("//")
}

/// `@name: value;` at the start of a line.
fn parse_variable(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim().strip_prefix('@')?;
    let name_len = rest
        .find(|c: char| !is_ident_char(c))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let (name, after) = rest.split_at(name_len);
    let value = after.trim_start().strip_prefix(':')?;
    let value = value.trim().strip_suffix(';')?;
    Some((name, value.trim()))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn substitute_variables(expanded: &Expanded) -> Result<String, EngineError> {
    let mut vars: FxHashMap<String, String> = FxHashMap::default();
    let mut depth = 0usize;
    let mut out = Vec::with_capacity(expanded.lines.len());

    for line in &expanded.lines {
        if depth == 0 {
            if let Some((name, value)) = parse_variable(&line.text) {
                let offset = value_offset(&line.text, value);
                let value = substitute(value, &vars, expanded, line, Some(offset))?;
                vars.insert(name.to_string(), value);
                continue;
            }
        }

        let text = if line.text.contains('@') {
            substitute(&line.text, &vars, expanded, line, None)?
        } else {
            line.text.clone()
        };

        for c in text.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        out.push(text);
    }

    let mut css = out.join("\n");
    if !css.is_empty() {
        css.push('\n');
    }
    Ok(css)
}

/// Char offset of `value` inside `line`, for error columns.
fn value_offset(line: &str, value: &str) -> usize {
    line.rfind(value)
        .map(|pos| line[..pos].chars().count())
        .unwrap_or(0)
}

/// Replace `@name` references in `text`.
///
/// Anything inside quotes is kept. For a whole line (`value_at` is `None`)
/// an `@` that opens it is an at-rule keyword and is kept too; for a
/// declaration value, `value_at` is its char position within the line.
fn substitute(
    text: &str,
    vars: &FxHashMap<String, String>,
    expanded: &Expanded,
    line: &Line,
    value_at: Option<usize>,
) -> Result<String, EngineError> {
    let keyword_at = match value_at {
        None => Some(text.len() - text.trim_start().len()),
        Some(_) => None,
    };
    let offset = value_at.unwrap_or(0);
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match quote {
            Some(open) => {
                if c == open {
                    quote = None;
                }
                out.push(c);
                continue;
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                out.push(c);
                continue;
            }
            None => {}
        }

        let starts_ident = chars
            .peek()
            .is_some_and(|(_, next)| next.is_ascii_alphabetic() || *next == '-' || *next == '_');
        if c != '@' || !starts_ident || keyword_at == Some(pos) {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some((_, next)) = chars.peek().copied() {
            if !is_ident_char(next) {
                break;
            }
            name.push(next);
            chars.next();
        }

        match vars.get(&name) {
            Some(value) => out.push_str(value),
            None => {
                let file = &expanded.files[line.origin];
                return Err(EngineError::Syntax {
                    message: format!("variable @{name} is undefined"),
                    file: file.path.clone(),
                    line: line.number,
                    column: (offset + text[..pos].chars().count() + 1) as u32,
                    contents: Some(file.contents.clone()),
                });
            }
        }
    }

    Ok(out)
}
