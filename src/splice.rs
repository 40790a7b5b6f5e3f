//! Text splicing over an immutable source buffer.
//!
//! Rewrites are recorded as range edits against the original text and applied
//! in a single pass. Edits must not overlap; an insertion may sit on the
//! boundary of a replaced range but not inside it. The result keeps track of
//! which output text was copied from where, which drives trimming and source
//! map generation.

use crate::error::{CommonJsError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    content: String,
}

/// Ordered set of edits against `source`.
#[derive(Debug)]
pub struct SourceEdits<'s> {
    source: &'s str,
    edits: Vec<Edit>,
}

impl<'s> SourceEdits<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn overwrite(&mut self, start: u32, end: u32, content: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            content: content.into(),
        });
    }

    pub fn remove(&mut self, start: u32, end: u32) {
        if start < end {
            self.overwrite(start, end, String::new());
        }
    }

    pub fn insert(&mut self, at: u32, content: impl Into<String>) {
        self.overwrite(at, at, content);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies every edit, failing if two of them claim intersecting ranges.
    pub fn render(self) -> Result<Rendered<'s>> {
        let mut edits = self.edits;
        // Stable: insertions at the same offset keep their recording order and
        // come before a replacement starting there.
        edits.sort_by_key(|edit| (edit.start, edit.end));

        let mut chunks = Vec::with_capacity(edits.len() * 2 + 1);
        let mut cursor = 0u32;
        let mut last: Option<(u32, u32)> = None;

        for edit in edits {
            if edit.start < cursor {
                return Err(CommonJsError::OverlappingEdits {
                    first: last.unwrap_or((cursor, cursor)),
                    second: (edit.start, edit.end),
                });
            }
            if edit.start > cursor {
                chunks.push(Chunk::copied(self.source, cursor, edit.start));
            }
            if !edit.content.is_empty() {
                let origin = (edit.start < edit.end).then_some(edit.start);
                chunks.push(Chunk {
                    text: edit.content,
                    origin,
                    copied: false,
                });
            }
            cursor = edit.end;
            last = Some((edit.start, edit.end));
        }

        let len = self.source.len() as u32;
        if cursor < len {
            chunks.push(Chunk::copied(self.source, cursor, len));
        }

        Ok(Rendered {
            source: self.source,
            chunks,
        })
    }
}

#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    /// Offset in the original source this chunk starts at.
    origin: Option<u32>,
    /// Copied verbatim, so every position inside maps back as well.
    copied: bool,
}

impl Chunk {
    fn copied(source: &str, start: u32, end: u32) -> Self {
        Chunk {
            text: source[start as usize..end as usize].to_string(),
            origin: Some(start),
            copied: true,
        }
    }
}

/// Output of [`SourceEdits::render`].
#[derive(Debug, Clone)]
pub struct Rendered<'s> {
    source: &'s str,
    chunks: Vec<Chunk>,
}

impl<'s> Rendered<'s> {
    /// Strips leading and trailing whitespace of the whole output.
    pub fn trim(&mut self) -> &mut Self {
        for chunk in self.chunks.iter_mut() {
            let trimmed = chunk.text.trim_start();
            let removed = chunk.text.len() - trimmed.len();
            if removed > 0 {
                chunk.text = trimmed.to_string();
                if chunk.copied {
                    chunk.origin = chunk.origin.map(|o| o + removed as u32);
                }
            }
            if !chunk.text.is_empty() {
                break;
            }
        }
        for chunk in self.chunks.iter_mut().rev() {
            let keep = chunk.text.trim_end().len();
            chunk.text.truncate(keep);
            if !chunk.text.is_empty() {
                break;
            }
        }
        self.chunks.retain(|chunk| !chunk.text.is_empty());
        self
    }

    pub fn prepend(&mut self, text: impl Into<String>) -> &mut Self {
        self.chunks.insert(
            0,
            Chunk {
                text: text.into(),
                origin: None,
                copied: false,
            },
        );
        self
    }

    pub fn append(&mut self, text: impl Into<String>) -> &mut Self {
        self.chunks.push(Chunk {
            text: text.into(),
            origin: None,
            copied: false,
        });
        self
    }

    pub fn code(&self) -> String {
        self.chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    pub fn source_map(&self, source_name: &str) -> SourceMap {
        let locator = LineLocator::new(self.source);
        let mut lines: Vec<Vec<Mapping>> = vec![Vec::new()];
        let mut column = 0u32;

        for chunk in &self.chunks {
            if let (Some(origin), Some(segments)) = (chunk.origin, lines.last_mut()) {
                let (line, col) = locator.locate(origin as usize);
                segments.push(Mapping::new(column, line, col));
            }
            for (index, ch) in chunk.text.char_indices() {
                if ch != '\n' {
                    column += ch.len_utf16() as u32;
                    continue;
                }
                lines.push(Vec::new());
                column = 0;
                let next = index + 1;
                if !chunk.copied || next >= chunk.text.len() {
                    continue;
                }
                if let (Some(origin), Some(segments)) = (chunk.origin, lines.last_mut()) {
                    let (line, col) = locator.locate(origin as usize + next);
                    segments.push(Mapping::new(0, line, col));
                }
            }
        }

        SourceMap {
            version: 3,
            sources: vec![source_name.to_string()],
            sources_content: vec![self.source.to_string()],
            names: Vec::new(),
            mappings: encode_mappings(&lines),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE MAPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Version 3 source map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    generated_column: u32,
    original_line: u32,
    original_column: u32,
}

impl Mapping {
    fn new(generated_column: u32, original_line: u32, original_column: u32) -> Self {
        Self {
            generated_column,
            original_line,
            original_column,
        }
    }
}

struct LineLocator<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineLocator<'s> {
    fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            source,
            line_starts,
        }
    }

    /// Zero-based line and UTF-16 column of a byte offset.
    fn locate(&self, offset: usize) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let column = self.source[start..offset].encode_utf16().count();
        (line as u32, column as u32)
    }
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & 0b11111;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn encode_mappings(lines: &[Vec<Mapping>]) -> String {
    let mut out = String::new();
    let mut prev_line = 0i64;
    let mut prev_column = 0i64;

    for (index, segments) in lines.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let mut prev_generated = 0i64;
        for (n, mapping) in segments.iter().enumerate() {
            if n > 0 {
                out.push(',');
            }
            encode_vlq(&mut out, mapping.generated_column as i64 - prev_generated);
            encode_vlq(&mut out, 0);
            encode_vlq(&mut out, mapping.original_line as i64 - prev_line);
            encode_vlq(&mut out, mapping.original_column as i64 - prev_column);
            prev_generated = mapping.generated_column as i64;
            prev_line = mapping.original_line as i64;
            prev_column = mapping.original_column as i64;
        }
    }
    out
}
