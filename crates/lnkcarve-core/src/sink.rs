//! Record sinks.
//!
//! A [`RecordSink`] receives every carved record. Sinks take `&self` so one
//! sink can be shared by scans running on different threads; each `write`
//! call appends exactly one whole record.

use crate::error::Result;
use crate::lnk::LnkRecord;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Name under which shell link records are filed
pub const FEATURE_NAME: &str = "winlnk";

/// Destination for carved records
pub trait RecordSink: Send + Sync {
    /// Append one record
    fn write(&self, record: &LnkRecord) -> Result<()>;
}

/// A sink that keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LnkRecord>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records written so far
    pub fn records(&self) -> Vec<LnkRecord> {
        self.records.lock().clone()
    }

    /// Number of records written so far
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Consumes the sink, returning its records in write order
    pub fn into_records(self) -> Vec<LnkRecord> {
        self.records.into_inner()
    }
}

impl RecordSink for MemorySink {
    fn write(&self, record: &LnkRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Output format of a [`WriterSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    /// `position<TAB>primary value<TAB><lnk>...</lnk>` lines
    FeatureFile,
    /// One JSON object per line
    JsonLines,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    position: u64,
    path: &'a str,
    fields: BTreeMap<&'static str, &'a str>,
}

struct WriterState<W> {
    out: W,
    source: Option<String>,
}

/// A sink that formats records onto a [`Write`] implementation
pub struct WriterSink<W: Write + Send> {
    format: SinkFormat,
    state: Mutex<WriterState<W>>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Creates a sink, writing the feature file header if applicable
    pub fn new(mut out: W, format: SinkFormat) -> Result<Self> {
        if format == SinkFormat::FeatureFile {
            writeln!(out, "# Feature-Recorder: {}", FEATURE_NAME)?;
        }
        Ok(Self {
            format,
            state: Mutex::new(WriterState { out, source: None }),
        })
    }

    /// Labels subsequent records with the file they were carved from
    pub fn set_source(&self, source: impl Into<String>) -> Result<()> {
        let source = source.into();
        let mut state = self.state.lock();
        if self.format == SinkFormat::FeatureFile {
            writeln!(state.out, "# Source: {}", source)?;
        }
        state.source = Some(source);
        Ok(())
    }

    /// Flushes the underlying writer
    pub fn flush(&self) -> Result<()> {
        self.state.lock().out.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> Result<W> {
        let mut state = self.state.into_inner();
        state.out.flush()?;
        Ok(state.out)
    }
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
    fn write(&self, record: &LnkRecord) -> Result<()> {
        let mut state = self.state.lock();
        let line = match self.format {
            SinkFormat::FeatureFile => feature_line(record),
            SinkFormat::JsonLines => serde_json::to_string(&JsonRecord {
                source: state.source.as_deref(),
                position: record.position(),
                path: record.primary_value(),
                fields: record.fields(),
            })?,
        };
        writeln!(state.out, "{}", line)?;
        Ok(())
    }
}

/// Formats a record as a feature file line
pub fn feature_line(record: &LnkRecord) -> String {
    format!(
        "{}\t{}\t{}",
        record.position(),
        record.primary_value(),
        xml_context(record)
    )
}

/// Renders the record's fields as `<lnk><key>value</key>...</lnk>`, keys sorted
pub fn xml_context(record: &LnkRecord) -> String {
    let mut out = String::from("<lnk>");
    for (key, value) in record.fields() {
        out.push('<');
        out.push_str(key);
        out.push('>');
        out.push_str(&xml_escape(value));
        out.push_str("</");
        out.push_str(key);
        out.push('>');
    }
    out.push_str("</lnk>");
    out
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
