//! Aggregated results for batch decryption runs.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Outcome of one file.
#[derive(Debug)]
pub struct FileResult {
    pub input: PathBuf,
    pub output: PathBuf,
    /// `None` on success, otherwise the rendered error.
    pub error: Option<String>,
    /// Size of the written plaintext, when known.
    pub output_size: u64,
    pub elapsed: Duration,
}

impl FileResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Collected results across one batch invocation.
#[derive(Debug)]
pub struct Report {
    results: Vec<FileResult>,
    started: Instant,
}

impl Report {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, result: FileResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[FileResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failures(&self) -> usize {
        self.total() - self.successes()
    }

    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.successes() as f64 * 100.0 / self.total() as f64
    }

    /// Print totals to stderr; failed files are listed individually,
    /// successes stay silent.
    pub fn print_summary(&self) {
        let line = "=".repeat(60);
        eprintln!("\n{line}");
        eprintln!("Decryption report");
        eprintln!("{line}");
        eprintln!("Total files: {}", self.total());
        eprintln!("Succeeded:   {}", self.successes());
        eprintln!("Failed:      {}", self.failures());
        eprintln!("Elapsed:     {:.1?}", self.started.elapsed());
        eprintln!("{line}");

        if self.failures() > 0 {
            eprintln!("\nFailed files:");
            for result in self.results.iter().filter(|r| !r.succeeded()) {
                eprintln!(
                    "  {} - {}",
                    result.input.display(),
                    result.error.as_deref().unwrap_or("unknown error"),
                );
            }
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
