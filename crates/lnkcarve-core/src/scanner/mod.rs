//! Brute-force scanning for embedded shell links.
//!
//! ## Algorithm Overview
//!
//! 1. Test the 20-byte header signature at every offset of the page
//! 2. On a match, decode the record with [`decode_at`]
//! 3. Hand the record to a [`RecordSink`]
//! 4. Resume one byte past the decoded structure, or one byte past the
//!    candidate if decoding failed
//!
//! Offsets in the last [`SMALLEST_LNK_FILE`] bytes of the page are never
//! candidates.
//!
//! ## Extensibility
//!
//! The [`ScanStrategy`] trait allows custom scanning algorithms:
//!
//! ```no_run
//! use lnkcarve_core::scanner::{ScanStrategy, ScanSummary};
//! use lnkcarve_core::{ByteView, RecordSink, Result};
//!
//! struct CustomScanner;
//!
//! impl ScanStrategy for CustomScanner {
//!     fn scan(&self, view: &ByteView<'_>, sink: &dyn RecordSink) -> Result<ScanSummary> {
//!         // Custom scanning logic
//!         Ok(ScanSummary::default())
//!     }
//! }
//! ```

use crate::buffer::ByteView;
use crate::error::{Error, Result};
use crate::lnk::{decode_at, matches_signature, LnkRecord};
use crate::sink::{MemorySink, RecordSink};
use tracing::{debug, trace};

/// Tail of the page, in bytes, in which no candidate offset is tested
pub const SMALLEST_LNK_FILE: usize = 1024;

/// Configuration for the scanner
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Log every failed candidate at debug level instead of trace
    pub debug: bool,
    /// Maximum number of records to emit per scan (0 = unlimited)
    pub max_records: usize,
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debug flag
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the maximum number of records to emit
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }
}

/// Counters describing a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Offsets where the signature matched
    pub candidates: usize,
    /// Records handed to the sink
    pub records: usize,
    /// Candidates whose decode ran out of buffer
    pub failures: usize,
    /// Number of candidate offsets in the scanned region
    pub candidate_offsets: usize,
}

impl ScanSummary {
    /// Adds another summary's counters to this one
    pub fn merge(&mut self, other: &ScanSummary) {
        self.candidates += other.candidates;
        self.records += other.records;
        self.failures += other.failures;
        self.candidate_offsets += other.candidate_offsets;
    }
}

/// Trait for implementing custom scanning strategies
pub trait ScanStrategy: Send + Sync {
    /// Scan the view, writing every record found to `sink`
    fn scan(&self, view: &ByteView<'_>, sink: &dyn RecordSink) -> Result<ScanSummary>;

    /// Scan the view and collect the records in memory
    fn scan_to_vec(&self, view: &ByteView<'_>) -> Result<Vec<LnkRecord>> {
        let sink = MemorySink::new();
        self.scan(view, &sink)?;
        Ok(sink.into_records())
    }
}

/// Primary scanner for carving shell links
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Returns the scanner configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }
}

impl ScanStrategy for Scanner {
    fn scan(&self, view: &ByteView<'_>, sink: &dyn RecordSink) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();

        if view.pagesize() <= SMALLEST_LNK_FILE {
            trace!("Page of {} bytes too small to scan", view.pagesize());
            return Ok(summary);
        }

        let limit = view.pagesize() - SMALLEST_LNK_FILE;
        summary.candidate_offsets = limit;
        debug!("Starting scan of {} offsets at {}", limit, view.pos0());

        let mut p = 0;
        while p < limit {
            if !matches_signature(view, p) {
                p += 1;
                continue;
            }

            summary.candidates += 1;
            match decode_at(view, p) {
                Ok(decoded) => {
                    debug!(
                        "Found shell link at {} ({} bytes, path {:?})",
                        decoded.record.position,
                        decoded.resume,
                        decoded.record.primary_value()
                    );
                    sink.write(&decoded.record)?;
                    summary.records += 1;

                    if self.config.max_records > 0 && summary.records >= self.config.max_records {
                        break;
                    }

                    // Skip the decoded structure, then take the loop's own step
                    p = p.saturating_add(decoded.resume).saturating_add(1);
                }
                Err(e) => {
                    if self.config.debug {
                        debug!("Candidate at {} rejected: {}", view.absolute(p), e);
                    } else {
                        trace!("Candidate at {} rejected: {}", view.absolute(p), e);
                    }
                    summary.failures += 1;
                    p += 1;
                }
            }
        }

        debug!(
            "Scan complete: {} candidates, {} records",
            summary.candidates, summary.records
        );
        Ok(summary)
    }
}

/// Scan a whole file as a single buffer
///
/// This is a convenience function that reads the file and scans it.
pub fn scan_file(
    path: impl AsRef<std::path::Path>,
    config: ScannerConfig,
    sink: &dyn RecordSink,
) -> Result<ScanSummary> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Scanner::with_config(config).scan(&ByteView::new(&data), sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lnk::tests::{header, link_info, NEW_YEAR_2024};
    use crate::lnk::{LinkFlags, HEADER_SIZE, LINK_INFO_SKIP_PREFIX, NO_LINK_INFO, SIGNATURE};
    use pretty_assertions::assert_eq;

    fn place(buf: &mut [u8], at: usize, bytes: &[u8]) {
        buf[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn scan(buf: &[u8]) -> Vec<LnkRecord> {
        Scanner::new().scan_to_vec(&ByteView::new(buf)).unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = ScannerConfig::new().debug(true).max_records(3);
        assert!(config.debug);
        assert_eq!(config.max_records, 3);
    }

    #[test]
    fn test_small_buffers_are_not_scanned() {
        for len in [0, 20, HEADER_SIZE, SMALLEST_LNK_FILE] {
            let mut buf = vec![0u8; len.max(HEADER_SIZE)];
            place(&mut buf, 0, &header(0, 0, 0, 0));
            buf.truncate(len);
            let sink = MemorySink::new();
            let summary = Scanner::new().scan(&ByteView::new(&buf), &sink).unwrap();
            assert_eq!(summary, ScanSummary::default());
            assert!(sink.is_empty());
        }
    }

    #[test]
    fn test_summary_counts_candidate_offsets() {
        let buf = vec![0u8; 4096];
        let view = ByteView::with_margin(&buf, 0, 3000).unwrap();
        let summary = Scanner::new().scan(&view, &MemorySink::new()).unwrap();
        assert_eq!(summary.candidate_offsets, 3000 - SMALLEST_LNK_FILE);
        assert_eq!(summary.candidates, 0);
    }

    #[test]
    fn test_smallest_scannable_buffer() {
        let mut buf = vec![0u8; SMALLEST_LNK_FILE + 1];
        place(&mut buf, 0, &header(0, 0, 0, 0));
        let records = scan(&buf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, 0);
    }

    #[test]
    fn test_record_at_offset() {
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 777, &header(0, NEW_YEAR_2024, NEW_YEAR_2024, 0));

        let records = scan(&buf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, 777);
        assert_eq!(records[0].ctime, "2024-01-01T00:00:00Z");
        assert_eq!(records[0].atime, "2024-01-01T00:00:00Z");
        assert_eq!(records[0].wtime, "");
        assert_eq!(records[0].primary_value(), NO_LINK_INFO);
        assert!(!records[0].fields().contains_key("path"));
    }

    #[test]
    fn test_record_at_offset_zero() {
        let mut buf = vec![0u8; 2048];
        place(&mut buf, 0, &header(0, 0, 0, 0));
        assert_eq!(scan(&buf)[0].position, 0);
    }

    #[test]
    fn test_position_includes_pos0() {
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 100, &header(0, 0, 0, 0));
        let view = ByteView::new(&buf).at(0x1000_0000);
        let records = Scanner::new().scan_to_vec(&view).unwrap();
        assert_eq!(records[0].position, 0x1000_0064);
    }

    #[test]
    fn test_link_info_path() {
        let mut buf = vec![0u8; 4096];
        let mut lnk = header(LinkFlags::HAS_LINK_INFO, 0, 0, 0);
        lnk.extend_from_slice(&link_info(b"C:\\test.txt"));
        place(&mut buf, 64, &lnk);

        let records = scan(&buf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path.as_deref(), Some("C:\\test.txt"));
        assert_eq!(records[0].fields()["path"], "C:\\test.txt");
    }

    #[test]
    fn test_path_truncated_at_buffer_end() {
        // Candidate in the page, unterminated path running to the end of the buffer
        let mut buf = vec![b'A'; 1100];
        let mut lnk = header(LinkFlags::HAS_LINK_INFO, 0, 0, 0);
        let mut info = link_info(b"");
        info.pop();
        lnk.extend_from_slice(&info);
        place(&mut buf, 0, &lnk);

        let records = scan(&buf);
        assert_eq!(records.len(), 1);
        let expected = "A".repeat(1100 - lnk.len());
        assert_eq!(records[0].path.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_path_read_from_margin() {
        let mut buf = vec![0u8; 2048];
        let mut lnk = header(LinkFlags::HAS_LINK_INFO, 0, 0, 0);
        let mut info = link_info(b"");
        info.pop();
        // Point the path into the margin
        let path_at = 1536 - HEADER_SIZE;
        info[16..20].copy_from_slice(&(path_at as u32).to_le_bytes());
        lnk.extend_from_slice(&info);
        place(&mut buf, 0, &lnk);
        place(&mut buf, 1536, b"E:\\margin.lnk\0");

        let view = ByteView::with_margin(&buf, 0, 1100).unwrap();
        let records = Scanner::new().scan_to_vec(&view).unwrap();
        assert_eq!(records[0].path.as_deref(), Some("E:\\margin.lnk"));
    }

    #[test]
    fn test_margin_offsets_are_not_candidates() {
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 2048, &header(0, 0, 0, 0));
        let view = ByteView::with_margin(&buf, 0, 2048).unwrap();
        assert!(Scanner::new().scan_to_vec(&view).unwrap().is_empty());
    }

    #[test]
    fn test_tail_of_page_is_not_scanned() {
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 4096 - SMALLEST_LNK_FILE, &header(0, 0, 0, 0));
        assert!(scan(&buf).is_empty());

        place(&mut buf, 4096 - SMALLEST_LNK_FILE - 1, &header(0, 0, 0, 0));
        assert_eq!(scan(&buf).len(), 1);
    }

    #[test]
    fn test_adjacent_records_resume_behaviour() {
        // No LinkInfo: resume is HEADER_SIZE plus the loop step, so a record
        // starting right at the end of the previous one is skipped.
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 0, &header(0, 0, 0, 0));
        place(&mut buf, HEADER_SIZE, &header(0, 0, 0, 0));
        let records = scan(&buf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, 0);

        // One byte of gap is enough to pick up the second record
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 0, &header(0, 0, 0, 0));
        place(&mut buf, HEADER_SIZE + 1, &header(0, 0, 0, 0));
        let positions: Vec<u64> = scan(&buf).iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, HEADER_SIZE as u64 + 1]);
    }

    #[test]
    fn test_adjacent_records_after_link_info() {
        let mut first = header(LinkFlags::HAS_LINK_INFO, 0, 0, 0);
        first.extend_from_slice(&link_info(b"C:\\one"));
        let second = header(0, 0, 0, 0);

        // The LinkInfo skip adds LINK_INFO_SKIP_PREFIX on top of a size that
        // already counts itself, so the resume point lands past the end.
        let resume_at = first.len() + LINK_INFO_SKIP_PREFIX + 1;
        for gap in 0..=LINK_INFO_SKIP_PREFIX + 1 {
            let mut buf = vec![0u8; 4096];
            place(&mut buf, 0, &first);
            place(&mut buf, first.len() + gap, &second);
            let records = scan(&buf);
            if first.len() + gap >= resume_at {
                assert_eq!(records.len(), 2, "gap {}", gap);
                assert_eq!(records[1].position, (first.len() + gap) as u64);
            } else {
                assert_eq!(records.len(), 1, "gap {}", gap);
            }
        }
    }

    #[test]
    fn test_near_miss_signatures_produce_nothing() {
        let mut buf = vec![0u8; 4096];
        for (word, at) in (0..SIGNATURE.len()).zip((0..).step_by(100)) {
            let mut lnk = header(0, 0, 0, 0);
            lnk[word * 4] ^= 0x01;
            place(&mut buf, at, &lnk);
        }
        // Overlapping near misses at consecutive offsets
        let mut lnk = header(0, 0, 0, 0);
        lnk[0x0c] = 0xc1;
        for at in 1000..1008 {
            place(&mut buf, at, &lnk[..20]);
        }

        let sink = MemorySink::new();
        let summary = Scanner::new().scan(&ByteView::new(&buf), &sink).unwrap();
        assert_eq!(summary.candidates, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failed_decode_resumes_next_byte() {
        // A truncated candidate whose IDList section runs past the buffer,
        // followed one byte later by nothing; the scan must just continue.
        let mut buf = vec![0u8; 4096];
        let mut bad = header(
            LinkFlags::HAS_LINK_TARGET_ID_LIST | LinkFlags::HAS_LINK_INFO,
            0,
            0,
            0,
        );
        bad.extend_from_slice(&0xffffu16.to_le_bytes());
        place(&mut buf, 10, &bad);
        place(&mut buf, 200, &header(0, 0, 0, 0));

        let sink = MemorySink::new();
        let summary = Scanner::new().scan(&ByteView::new(&buf), &sink).unwrap();
        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.records, 1);
        assert_eq!(sink.records()[0].position, 200);
    }

    #[test]
    fn test_max_records() {
        let mut buf = vec![0u8; 8192];
        for at in [0, 1000, 2000, 3000] {
            place(&mut buf, at, &header(0, 0, 0, 0));
        }
        let scanner = Scanner::with_config(ScannerConfig::new().max_records(2));
        let records = scanner.scan_to_vec(&ByteView::new(&buf)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(Scanner::new().scan_to_vec(&ByteView::new(&buf)).unwrap().len(), 4);
    }

    #[test]
    fn test_scan_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let image = temp_dir.path().join("dump.raw");
        let mut buf = vec![0u8; 4096];
        place(&mut buf, 512, &header(0, 0, 0, 0));
        std::fs::write(&image, &buf).unwrap();

        let sink = MemorySink::new();
        let summary = scan_file(&image, ScannerConfig::new(), &sink).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(sink.records()[0].position, 512);

        let missing = scan_file(temp_dir.path().join("absent"), ScannerConfig::new(), &sink);
        assert!(matches!(missing, Err(Error::FileRead { .. })));
    }

    #[test]
    fn test_summary_merge() {
        let mut total = ScanSummary::default();
        let page = ScanSummary {
            candidates: 2,
            records: 1,
            failures: 1,
            candidate_offsets: 100,
        };
        total.merge(&page);
        total.merge(&page);
        assert_eq!(total.records, 2);
        assert_eq!(total.candidate_offsets, 200);
    }
}
