use crate::analysis::{analyze_long_operations, TagHotspot};
use crate::context::{RequestContext, RequestReport};
use crate::diagnostics::LongOperation;
use crate::domain::ExportError;
use crate::events::EventStats;
use crate::hook::{HookStats, LiveEntries};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::rc::Rc;

/// Everything one simulated or replayed run produced
pub struct RunSummary {
    /// Closed requests first, in close order
    pub requests: Vec<Rc<RequestContext<Value>>>,
    pub long_operations: Vec<LongOperation>,
    pub hook: HookStats,
    pub events: EventStats,
    /// Map sizes at the end of the run; zero when every task was destroyed
    pub live: LiveEntries,
}

impl RunSummary {
    #[must_use]
    pub fn reports(&self) -> Vec<RequestReport> {
        self.requests.iter().map(|request| request.report()).collect()
    }

    #[must_use]
    pub fn hotspots(&self) -> Vec<TagHotspot> {
        analyze_long_operations(&self.long_operations)
    }
}

/// Report file container
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    display_time_unit: &'static str,
    requests: Vec<RequestReport>,
    long_operations: &'a [LongOperation],
    hotspots: Vec<TagHotspot>,
}

/// JSON report exporter for per-request CPU attribution
pub struct ReportExporter {
    requests: Vec<RequestReport>,
    long_operations: Vec<LongOperation>,
}

impl ReportExporter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            long_operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            requests: summary.reports(),
            long_operations: summary.long_operations.clone(),
        }
    }

    pub fn add_request(&mut self, report: RequestReport) {
        self.requests.push(report);
    }

    pub fn add_long_operation(&mut self, op: LongOperation) {
        self.long_operations.push(op);
    }

    /// Export the report to any writer (file, stdout, buffer, etc.)
    ///
    /// # Example
    /// ```
    /// use loopscope::export::ReportExporter;
    ///
    /// # fn example() -> Result<(), loopscope::domain::ExportError> {
    /// let exporter = ReportExporter::new();
    /// let mut buffer = Vec::new();
    /// exporter.export(&mut buffer)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let report = Report {
            display_time_unit: "ms",
            requests: self.requests.clone(),
            long_operations: &self.long_operations,
            hotspots: analyze_long_operations(&self.long_operations),
        };
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new()
    }
}
