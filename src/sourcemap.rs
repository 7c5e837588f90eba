//! Source-map construction: per-statement mapping table, base64 VLQ
//! encoding, and source-map V3 JSON assembly.
//!
//! Each code generator records one mapping per statement before emitting
//! its text. At file finalization the table is flushed into a `.map`
//! sidecar: one semicolon per output line, segments of
//! `(output_col, source_index, source_line, source_col)` deltas.

use serde_json::json;

/// One recorded tuple. All coordinates are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub output_line: u32,
    pub output_col: u32,
    pub source_index: u32,
    pub source_line: u32,
    pub source_col: u32,
}

/// Append-only mapping table, one per output file.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    mappings: Vec<Mapping>,
    sources: Vec<String>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file, deduplicating by path. Returns its index.
    pub fn add_source(&mut self, path: &str) -> u32 {
        if let Some(idx) = self.sources.iter().position(|s| s == path) {
            return idx as u32;
        }
        self.sources.push(path.to_string());
        (self.sources.len() - 1) as u32
    }

    /// Record a mapping. `source_line`/`source_col` are 1-based as carried
    /// on AST nodes; they are stored 0-based per the source-map format.
    pub fn record(
        &mut self,
        source_index: u32,
        source_line: u32,
        source_col: u32,
        output_line: u32,
        output_col: u32,
    ) {
        self.mappings.push(Mapping {
            output_line,
            output_col,
            source_index,
            source_line: source_line.saturating_sub(1),
            source_col: source_col.saturating_sub(1),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Encode the table as a V3 `mappings` string.
    pub fn encode_mappings(&self) -> String {
        let mut sorted = self.mappings.clone();
        sorted.sort_by_key(|m| (m.output_line, m.output_col));

        let mut out = String::new();
        let mut prev_line = 0u32;
        let mut prev_source: i64 = 0;
        let mut prev_src_line: i64 = 0;
        let mut prev_src_col: i64 = 0;

        let mut first_on_line = true;
        let mut prev_out_col: i64 = 0;

        for m in &sorted {
            while prev_line < m.output_line {
                out.push(';');
                prev_line += 1;
                first_on_line = true;
                prev_out_col = 0;
            }
            if !first_on_line {
                out.push(',');
            }
            encode_vlq(m.output_col as i64 - prev_out_col, &mut out);
            encode_vlq(m.source_index as i64 - prev_source, &mut out);
            encode_vlq(m.source_line as i64 - prev_src_line, &mut out);
            encode_vlq(m.source_col as i64 - prev_src_col, &mut out);

            prev_out_col = m.output_col as i64;
            prev_source = m.source_index as i64;
            prev_src_line = m.source_line as i64;
            prev_src_col = m.source_col as i64;
            first_on_line = false;
        }

        out
    }

    /// Assemble the V3 JSON sidecar. `sources_content` must parallel the
    /// registered sources.
    pub fn to_json(&self, file: &str, sources_content: &[String]) -> String {
        let map = json!({
            "version": 3,
            "file": file,
            "sources": self.sources,
            "sourcesContent": sources_content,
            "names": [],
            "mappings": self.encode_mappings(),
        });
        serde_json::to_string(&map).expect("source map is valid JSON")
    }
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64 VLQ: 5-bit groups, LSB-first, sign in the lowest bit of the
/// first group, continuation in bit 5.
fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0x1f) as u8;
        vlq >>= 5;
        if vlq != 0 {
            digit |= 0x20;
        }
        out.push(BASE64_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
