use std::sync::LazyLock;

use regex::Regex;

static CHUNK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Processing chunk (\d+)/(\d+)").expect("chunk pattern is a valid regex")
});

/// Processed/total chunk counters for one job.
///
/// A total of `1` is the "not yet known" sentinel reported before the backend
/// has announced how many chunks the document was split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub processed: u32,
    pub total: u32,
}

impl Default for ChunkProgress {
    fn default() -> Self {
        Self {
            processed: 0,
            total: Self::UNKNOWN_TOTAL,
        }
    }
}

impl ChunkProgress {
    pub const UNKNOWN_TOTAL: u32 = 1;

    /// Builds a pair, rejecting a zero total and `processed > total`.
    pub fn new(processed: u32, total: u32) -> Option<Self> {
        if total == 0 || processed > total {
            return None;
        }
        Some(Self { processed, total })
    }

    /// Extracts `P/T` from backend text of the form `Processing chunk P/T`.
    pub fn parse_message(text: &str) -> Option<Self> {
        let captures = CHUNK_PATTERN.captures(text)?;
        let processed = captures.get(1)?.as_str().parse().ok()?;
        let total = captures.get(2)?.as_str().parse().ok()?;
        Self::new(processed, total)
    }

    pub fn is_total_known(&self) -> bool {
        self.total > Self::UNKNOWN_TOTAL
    }

    /// True when every chunk of a job with a known total has been processed.
    pub fn is_complete(&self) -> bool {
        self.is_total_known() && self.processed == self.total
    }

    /// `round(processed / total * 100)`, or `None` while the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if !self.is_total_known() {
            return None;
        }
        let ratio = f64::from(self.processed) / f64::from(self.total);
        Some((ratio * 100.0).round() as u8)
    }
}

