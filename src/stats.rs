use serde::Serialize;
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Counters collected while merging
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub records_emitted: usize,
    pub malformed_dropped: usize,
    pub records_filtered: usize,
    pub files_opened: usize,
    pub files_written: usize,
    pub jobs_run: usize,
    pub errors: usize,
    #[serde(rename = "processing_time_ms", serialize_with = "serialize_millis")]
    pub processing_time: Duration,
    #[serde(skip)]
    pub start_time: Option<Instant>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

// The merge loop is single threaded, so one counter set per thread is the whole picture
thread_local! {
    static THREAD_STATS: RefCell<ProcessingStats> = RefCell::new(ProcessingStats::new());
}

fn with_stats(f: impl FnOnce(&mut ProcessingStats)) {
    THREAD_STATS.with(|stats| f(&mut stats.borrow_mut()));
}

pub fn stats_add_line_read() {
    with_stats(|s| s.lines_read += 1);
}

pub fn stats_add_record_emitted() {
    with_stats(|s| s.records_emitted += 1);
}

pub fn stats_add_malformed() {
    with_stats(|s| s.malformed_dropped += 1);
}

pub fn stats_add_record_filtered() {
    with_stats(|s| s.records_filtered += 1);
}

pub fn stats_add_file_opened() {
    with_stats(|s| s.files_opened += 1);
}

pub fn stats_add_files_written(count: usize) {
    with_stats(|s| s.files_written += count);
}

pub fn stats_add_job() {
    with_stats(|s| s.jobs_run += 1);
}

pub fn stats_add_error() {
    with_stats(|s| s.errors += 1);
}

pub fn stats_start_timer() {
    with_stats(|s| s.start_time = Some(Instant::now()));
}

pub fn stats_finish_processing() {
    with_stats(|s| {
        if let Some(start) = s.start_time {
            s.processing_time = start.elapsed();
        }
    });
}

pub fn stats_reset() {
    with_stats(|s| *s = ProcessingStats::new());
}

pub fn get_thread_stats() -> ProcessingStats {
    THREAD_STATS.with(|stats| stats.borrow().clone())
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Elapsed time, live while the timer is still running
    fn elapsed(&self) -> Duration {
        if self.processing_time.is_zero() {
            self.start_time.map(|t| t.elapsed()).unwrap_or_default()
        } else {
            self.processing_time
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} output, {} malformed",
            self.lines_read, self.records_emitted, self.malformed_dropped
        );

        if self.records_filtered > 0 {
            output.push_str(&format!(", {} filtered", self.records_filtered));
        }
        if self.files_opened > 0 {
            output.push_str(&format!(", {} files read", self.files_opened));
        }
        if self.files_written > 0 {
            output.push_str(&format!(", {} files written", self.files_written));
        }
        if self.errors > 0 {
            output.push_str(&format!(", {} errors", self.errors));
        }

        let processing_time_ms = self.elapsed().as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.lines_read > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        output
    }

    pub fn to_json(&self) -> String {
        let mut snapshot = self.clone();
        snapshot.processing_time = self.elapsed();
        serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }
}
