use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{IngestWarning, RawDocument};
use crate::error::AppError;

pub mod files;
pub mod guides;
pub mod statutes;

pub use files::FileAdapter;
pub use guides::GuideAdapter;
pub use statutes::StatuteAdapter;

/// Result of running one adapter. Per-source failures become warnings and
/// never abort the batch; a `Result::Err` from `fetch_and_parse` means the
/// adapter itself could not run at all (e.g. bad catalog).
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    pub documents: Vec<RawDocument>,
    pub warnings: Vec<IngestWarning>,
}

pub trait SourceAdapter {
    fn name(&self) -> &'static str;
    fn fetch_and_parse(&self) -> Result<AdapterOutput, AppError>;
}

/// Minimum pause between outbound fetches to the same upstream.
pub struct Pacer {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Block until at least `min_interval` has passed since the last call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("INGEST_TIME_FAILED", "Failed to format current time").with_details(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_enforces_minimum_interval() {
        let mut pacer = Pacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
