//! Result types: the artifact, per-page reports, diagnostics, and stats.
//!
//! Everything except the artifact bytes is serialisable so the CLI can emit
//! a JSON report. Reports never contain recognised text.

use crate::error::{PageError, RedactError};
use crate::model::{OutputFormat, SourceFormat};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Outcome of one page's trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// At least one region was replaced.
    Redacted,
    /// Recognition worked but nothing was selected. Often a pattern that is
    /// too narrow, so it is reported separately.
    NoMatches,
    /// Recognition failed; the page was emitted unmodified.
    RecognitionFailed,
}

/// Per-page report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    pub status: PageStatus,
    pub token_count: usize,
    pub low_confidence_tokens: usize,
    pub region_count: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

/// Non-fatal events recorded while processing. Counted in the stats and
/// logged, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The synthetic generator could not serve a region; the fixed literal
    /// was used instead.
    GenerationFallback {
        page: usize,
        region: usize,
        reason: String,
    },
    /// The replacement did not fit at the minimum font size and was
    /// truncated with an ellipsis.
    ReplacementOverflow {
        page: usize,
        region: usize,
        replacement_chars: usize,
        rendered_chars: usize,
    },
    /// Two regions on one page overlap; the later fill won.
    RegionOverlapDetected {
        page: usize,
        first: usize,
        second: usize,
    },
    /// Border samples were too varied for a trustworthy fill colour.
    LowConfidenceFill {
        page: usize,
        region: usize,
        spread: f32,
    },
}

impl Diagnostic {
    pub fn page(&self) -> usize {
        match self {
            Diagnostic::GenerationFallback { page, .. }
            | Diagnostic::ReplacementOverflow { page, .. }
            | Diagnostic::RegionOverlapDetected { page, .. }
            | Diagnostic::LowConfidenceFill { page, .. } => *page,
        }
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionStats {
    pub total_pages: usize,
    pub redacted_pages: usize,
    pub no_match_pages: usize,
    pub failed_pages: usize,
    pub total_tokens: usize,
    pub total_regions: usize,
    pub generation_fallbacks: usize,
    pub replacement_overflows: usize,
    pub region_overlaps: usize,
    pub low_confidence_fills: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub process_duration_ms: u64,
    pub assembly_duration_ms: u64,
}

impl RedactionStats {
    /// Fill the page and diagnostic counters from the reports.
    pub fn tally(&mut self, pages: &[PageReport], diagnostics: &[Diagnostic]) {
        self.total_pages = pages.len();
        self.redacted_pages = count_status(pages, PageStatus::Redacted);
        self.no_match_pages = count_status(pages, PageStatus::NoMatches);
        self.failed_pages = count_status(pages, PageStatus::RecognitionFailed);
        self.total_tokens = pages.iter().map(|p| p.token_count).sum();
        self.total_regions = pages.iter().map(|p| p.region_count).sum();
        self.generation_fallbacks = 0;
        self.replacement_overflows = 0;
        self.region_overlaps = 0;
        self.low_confidence_fills = 0;
        for d in diagnostics {
            match d {
                Diagnostic::GenerationFallback { .. } => self.generation_fallbacks += 1,
                Diagnostic::ReplacementOverflow { .. } => self.replacement_overflows += 1,
                Diagnostic::RegionOverlapDetected { .. } => self.region_overlaps += 1,
                Diagnostic::LowConfidenceFill { .. } => self.low_confidence_fills += 1,
            }
        }
    }
}

fn count_status(pages: &[PageReport], status: PageStatus) -> usize {
    pages.iter().filter(|p| p.status == status).count()
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionOutput {
    /// Encoded image or PDF bytes.
    #[serde(skip)]
    pub artifact: Vec<u8>,
    pub source_format: SourceFormat,
    pub output_format: OutputFormat,
    pub dpi: u32,
    /// Ordered by page number.
    pub pages: Vec<PageReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RedactionStats,
}

impl RedactionOutput {
    /// Page numbers where recognition worked but nothing matched.
    pub fn no_match_pages(&self) -> Vec<usize> {
        self.pages_with(PageStatus::NoMatches)
    }

    /// Page numbers emitted unredacted because recognition failed.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.pages_with(PageStatus::RecognitionFailed)
    }

    fn pages_with(&self, status: PageStatus) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.page_num)
            .collect()
    }

    /// Treat any failed page as an error.
    pub fn into_result(self) -> Result<Self, RedactError> {
        let failed = self.stats.failed_pages;
        if failed > 0 {
            return Err(RedactError::PartialFailure {
                failed,
                total: self.stats.total_pages,
            });
        }
        Ok(self)
    }

    /// Human-readable run summary.
    ///
    /// Failed pages and zero-match pages are listed on separate lines: the
    /// first is an engine problem, the second usually a configuration one.
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let mut out = format!(
            "{} pages: {} redacted, {} without matches, {} failed; {} regions replaced\n",
            s.total_pages, s.redacted_pages, s.no_match_pages, s.failed_pages, s.total_regions
        );
        let failed = self.failed_pages();
        if !failed.is_empty() {
            let _ = writeln!(
                out,
                "RECOGNITION FAILED (emitted unredacted): pages {}",
                join_pages(&failed)
            );
        }
        let empty = self.no_match_pages();
        if !empty.is_empty() {
            let _ = writeln!(
                out,
                "No matches (check the pattern): pages {}",
                join_pages(&empty)
            );
        }
        let diag_total = s.generation_fallbacks
            + s.replacement_overflows
            + s.region_overlaps
            + s.low_confidence_fills;
        if diag_total > 0 {
            let _ = writeln!(
                out,
                "Diagnostics: {} fallbacks, {} overflows, {} overlaps, {} low-confidence fills",
                s.generation_fallbacks,
                s.replacement_overflows,
                s.region_overlaps,
                s.low_confidence_fills
            );
        }
        out
    }
}

fn join_pages(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format and page count of an input, from [`crate::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub source_format: SourceFormat,
    pub page_count: usize,
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageKind;

    fn report(page_num: usize, status: PageStatus, regions: usize) -> PageReport {
        PageReport {
            page_num,
            status,
            token_count: regions * 2,
            low_confidence_tokens: 0,
            region_count: regions,
            duration_ms: 1,
            error: (status == PageStatus::RecognitionFailed).then(|| PageError::Recognition {
                page: page_num,
                detail: "engine crashed".into(),
            }),
        }
    }

    fn output(pages: Vec<PageReport>, diagnostics: Vec<Diagnostic>) -> RedactionOutput {
        let mut stats = RedactionStats::default();
        stats.tally(&pages, &diagnostics);
        RedactionOutput {
            artifact: vec![1, 2, 3],
            source_format: SourceFormat::Pdf,
            output_format: OutputFormat::Pdf,
            dpi: 200,
            pages,
            diagnostics,
            stats,
        }
    }

    #[test]
    fn tally_counts_statuses_and_diagnostics() {
        let out = output(
            vec![
                report(1, PageStatus::Redacted, 2),
                report(2, PageStatus::RecognitionFailed, 0),
                report(3, PageStatus::NoMatches, 0),
            ],
            vec![
                Diagnostic::ReplacementOverflow {
                    page: 1,
                    region: 0,
                    replacement_chars: 30,
                    rendered_chars: 6,
                },
                Diagnostic::LowConfidenceFill {
                    page: 1,
                    region: 1,
                    spread: 80.0,
                },
            ],
        );
        assert_eq!(out.stats.redacted_pages, 1);
        assert_eq!(out.stats.failed_pages, 1);
        assert_eq!(out.stats.no_match_pages, 1);
        assert_eq!(out.stats.total_regions, 2);
        assert_eq!(out.stats.replacement_overflows, 1);
        assert_eq!(out.stats.low_confidence_fills, 1);
        assert_eq!(out.failed_pages(), vec![2]);
        assert_eq!(out.no_match_pages(), vec![3]);
    }

    #[test]
    fn summary_separates_failures_from_empty_pages() {
        let out = output(
            vec![
                report(1, PageStatus::NoMatches, 0),
                report(2, PageStatus::RecognitionFailed, 0),
            ],
            vec![],
        );
        let summary = out.summary();
        assert!(
            summary.contains("RECOGNITION FAILED (emitted unredacted): pages 2"),
            "{summary}"
        );
        assert!(
            summary.contains("No matches (check the pattern): pages 1"),
            "{summary}"
        );
    }

    #[test]
    fn into_result_rejects_partial_runs() {
        let out = output(vec![report(1, PageStatus::RecognitionFailed, 0)], vec![]);
        assert!(matches!(
            out.into_result(),
            Err(RedactError::PartialFailure {
                failed: 1,
                total: 1
            })
        ));
        let ok = output(vec![report(1, PageStatus::Redacted, 1)], vec![]);
        assert!(ok.into_result().is_ok());
    }

    #[test]
    fn json_report_omits_artifact() {
        let mut out = output(vec![report(1, PageStatus::Redacted, 1)], vec![]);
        out.source_format = SourceFormat::Image(ImageKind::Png);
        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("artifact"));
        assert!(json.contains("\"redacted\""));
    }
}
