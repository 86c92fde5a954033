//! Range-based source fixes.
//!
//! Rules queue edits through a [`Fixer`]; nothing touches the disk until
//! [`write_changes`] is called with the final file contents.
//!
//! - Edits are byte ranges plus replacement text, queued per file
//! - Overlapping edits are rejected with `FixConflict`
//! - JSON files are never rewritten (`FixNotSupported`)
//! - Every changed native file must still parse after all edits are applied

use crate::error::{TofulintError, TofulintResult};
use crate::syntax::{is_json_filename, Attribute, Block, File, Range, SourceMap};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct TextEdit {
    span: ops::Range<usize>,
    text: String,
}

/// Marks a point in the edit queue that can be rolled back to.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint(usize);

/// Collects text edits for the files of one module.
#[derive(Debug, Default)]
pub struct Fixer {
    sources: BTreeMap<String, Arc<SourceMap>>,
    edits: BTreeMap<String, Vec<TextEdit>>,
    /// File of each queued edit, in queue order.
    journal: Vec<String>,
}

impl Fixer {
    pub fn new<'a>(files: impl IntoIterator<Item = &'a File>) -> Self {
        Self {
            sources: files
                .into_iter()
                .map(|f| (f.name().to_string(), f.source_map().clone()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Drop every edit queued after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            if let Some(filename) = self.journal.pop() {
                if let Some(edits) = self.edits.get_mut(&filename) {
                    edits.pop();
                    if edits.is_empty() {
                        self.edits.remove(&filename);
                    }
                }
            }
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.journal.is_empty()
    }

    pub fn replace_text(&mut self, range: &Range, text: impl Into<String>) -> TofulintResult<()> {
        self.queue(&range.filename, range.bytes(), text.into())
    }

    pub fn insert_text_before(&mut self, range: &Range, text: impl Into<String>) -> TofulintResult<()> {
        let at = range.start.byte;
        self.queue(&range.filename, at..at, text.into())
    }

    pub fn insert_text_after(&mut self, range: &Range, text: impl Into<String>) -> TofulintResult<()> {
        let at = range.end.byte;
        self.queue(&range.filename, at..at, text.into())
    }

    pub fn remove(&mut self, range: &Range) -> TofulintResult<()> {
        self.queue(&range.filename, range.bytes(), String::new())
    }

    /// Remove a block together with its indentation and line break.
    pub fn remove_block(&mut self, block: &Block) -> TofulintResult<()> {
        self.remove_line_span(&block.range)
    }

    /// Remove an attribute together with its indentation and line break.
    pub fn remove_attribute(&mut self, attr: &Attribute) -> TofulintResult<()> {
        self.remove_line_span(&attr.range)
    }

    /// Source text of a range.
    pub fn text_at(&self, range: &Range) -> TofulintResult<String> {
        let src = self.source(&range.filename)?;
        src.source()
            .get(range.bytes())
            .map(str::to_string)
            .ok_or_else(|| TofulintError::fix(format!("range {range} is out of bounds")))
    }

    fn remove_line_span(&mut self, range: &Range) -> TofulintResult<()> {
        if is_json_filename(&range.filename) {
            return Err(TofulintError::fix_not_supported(&range.filename));
        }
        let src = self.source(&range.filename)?;
        let span = expand_to_lines(src.source(), range.bytes());
        self.queue(&range.filename, span, String::new())
    }

    fn source(&self, filename: &str) -> TofulintResult<&Arc<SourceMap>> {
        self.sources
            .get(filename)
            .ok_or_else(|| TofulintError::fix(format!("{filename} is not part of this module")))
    }

    fn queue(&mut self, filename: &str, span: ops::Range<usize>, text: String) -> TofulintResult<()> {
        if is_json_filename(filename) {
            return Err(TofulintError::fix_not_supported(filename));
        }

        let src = self.source(filename)?;
        let len = src.source().len();
        if span.start > span.end
            || span.end > len
            || !src.source().is_char_boundary(span.start)
            || !src.source().is_char_boundary(span.end)
        {
            return Err(TofulintError::fix(format!(
                "edit {}..{} is out of bounds for {filename}",
                span.start, span.end
            )));
        }

        if let Some(existing) = self
            .edits
            .get(filename)
            .and_then(|edits| edits.iter().find(|e| conflicts(&e.span, &span)))
        {
            return Err(TofulintError::fix_conflict(
                filename,
                format!(
                    "edit {}..{} overlaps edit {}..{}",
                    span.start, span.end, existing.span.start, existing.span.end
                ),
            ));
        }

        self.edits
            .entry(filename.to_string())
            .or_default()
            .push(TextEdit { span, text });
        self.journal.push(filename.to_string());
        Ok(())
    }

    /// New contents of every changed file. Each result must still parse.
    pub fn changes(&self) -> TofulintResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (filename, edits) in &self.edits {
            let src = self.source(filename)?;
            let fixed = apply_edits(src.source(), edits);
            File::parse(filename, &fixed).map_err(|e| {
                TofulintError::fix(format!("fixed content of {filename} is invalid: {e}"))
            })?;
            out.insert(filename.clone(), fixed);
        }
        Ok(out)
    }
}

/// Zero-width insertions only conflict when they fall strictly inside another edit.
fn conflicts(a: &ops::Range<usize>, b: &ops::Range<usize>) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => false,
        (true, false) => b.start < a.start && a.start < b.end,
        (false, true) => a.start < b.start && b.start < a.end,
        (false, false) => a.start < b.end && b.start < a.end,
    }
}

fn apply_edits(source: &str, edits: &[TextEdit]) -> String {
    let mut ordered: Vec<(usize, &TextEdit)> = edits.iter().enumerate().collect();
    // insertions sort before removals starting at the same byte; ties keep queue order
    ordered.sort_by_key(|(seq, e)| (e.span.start, e.span.end, *seq));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (_, edit) in ordered {
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Widen a span to cover its indentation and line break when it sits on lines of its own.
fn expand_to_lines(source: &str, span: ops::Range<usize>) -> ops::Range<usize> {
    let bytes = source.as_bytes();

    let mut start = span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] != b'\n' {
        return span;
    }

    let mut end = span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    if bytes[end..].starts_with(b"\r\n") {
        end += 2;
    } else if bytes[end..].starts_with(b"\n") {
        end += 1;
    } else if end != bytes.len() {
        // something else follows on the same line
        return start..span.end;
    }

    start..end
}

// ---------------------------------------------------------------------------
// Writing to disk
// ---------------------------------------------------------------------------

/// Result of writing fixes to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixResult {
    pub files_changed: Vec<String>,
    pub errors: Vec<String>,
}

/// Write one fixed file.
///
/// Security: refuses to write through symlinks.
pub fn write_file(path: &Path, content: &str, dry_run: bool) -> Result<bool> {
    let metadata = path
        .symlink_metadata()
        .with_context(|| format!("Failed to stat: {}", path.display()))?;

    if metadata.file_type().is_symlink() {
        eprintln!(
            "[WARN] Refusing to write through symlink: {} (security measure)",
            path.display()
        );
        return Ok(false);
    }

    if !metadata.is_file() {
        eprintln!("[WARN] Not a regular file: {}", path.display());
        return Ok(false);
    }

    if dry_run {
        println!("[DRY-RUN] Would fix: {}", path.display());
        return Ok(true);
    }

    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))?;
    println!("[FIX] Fixed: {}", path.display());
    Ok(true)
}

/// Write the changed files of one module directory. Per-file errors are collected, not raised.
pub fn write_changes(dir: &Path, changes: &BTreeMap<String, String>, dry_run: bool) -> FixResult {
    let mut result = FixResult::default();

    for (name, content) in changes {
        let path = dir.join(name);
        match write_file(&path, content, dry_run) {
            Ok(true) => result.files_changed.push(path.display().to_string()),
            Ok(false) => {}
            Err(e) => result.errors.push(format!("{}: {:#}", path.display(), e)),
        }
    }

    result
}

/// Print a summary of a fix run.
pub fn print_fix_summary(result: &FixResult, dry_run: bool) {
    let mode = if dry_run { "DRY-RUN" } else { "FIX" };
    println!();
    println!("=== {} Summary ===", mode);
    println!("Files changed: {}", result.files_changed.len());

    if !result.errors.is_empty() {
        println!("Errors: {}", result.errors.len());
        for err in &result.errors {
            eprintln!("  - {}", err);
        }
    }
}
