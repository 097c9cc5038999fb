//! Capture file parsing
//!
//! A capture holds one native notification per line:
//!
//! ```text
//! # comment
//! rewarded	{"callback":"available","placement_id":"P1"}
//! ```
//!
//! The format and the payload are separated by a single tab. The payload is
//! kept verbatim so that undecodable lines reach the core unchanged.

use adbridge_core::codec;
use adbridge_core::traits::AdFormat;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// One captured notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    /// 1-based line number in the capture file
    pub line: usize,
    pub format: AdFormat,
    pub payload: String,
}

impl CapturedLine {
    /// Placement id of the payload, if it decodes
    pub fn placement_id(&self) -> Option<String> {
        codec::decode_from(self.format, &self.payload)
            .ok()
            .map(|event| event.placement_id)
    }
}

/// Read and parse a capture file
pub fn load(path: &Path) -> Result<Vec<CapturedLine>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read capture file {}", path.display()))?;
    parse(&text)
}

/// Parse capture text
pub fn parse(text: &str) -> Result<Vec<CapturedLine>> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (format, payload) = trimmed
            .split_once('\t')
            .with_context(|| format!("line {line}: expected <format><TAB><payload>"))?;
        let format: AdFormat = format
            .trim()
            .parse()
            .with_context(|| format!("line {line}: bad ad format"))?;

        lines.push(CapturedLine {
            line,
            format,
            payload: payload.trim().to_string(),
        });
    }
    Ok(lines)
}

/// Distinct `(format, placement_id)` pairs among the decodable lines
pub fn placements(lines: &[CapturedLine]) -> BTreeSet<(AdFormat, String)> {
    lines
        .iter()
        .filter_map(|line| line.placement_id().map(|id| (line.format, id)))
        .collect()
}
