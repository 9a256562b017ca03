//! Append-only JSONL run journal.

use crate::core::types::{RunEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_timestamp(secs)
}

fn format_timestamp(unix_secs: u64) -> String {
    let (year, month, day) = civil_date(unix_secs / 86_400);
    let secs = unix_secs % 86_400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

/// Days since 1970-01-01 to a Gregorian date, counting 400-year eras from
/// 0000-03-01 so leap days fall at the end of each year.
fn civil_date(days: u64) -> (u64, u64, u64) {
    let shifted = days + 719_468;
    let era = shifted / 146_097;
    let day_of_era = shifted % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let march_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * march_month + 2) / 5 + 1;
    let month = if march_month < 10 { march_month + 3 } else { march_month - 9 };
    let year = era * 400 + year_of_era + u64::from(month <= 2);
    (year, month, day)
}

/// Generate a run ID, unique within the process even for runs started in
/// the same nanosecond.
pub fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("r-{:012x}-{:04x}", nanos & 0xFFFF_FFFF_FFFF, seq & 0xFFFF)
}

/// A journal file for one recipe.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Journal at `{dir}/{name}/events.jsonl`.
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(name).join("events.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line.
    pub fn append(&self, event: RunEvent) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create journal dir: {}", e))?;
        }

        let te = TimestampedEvent {
            ts: now_iso8601(),
            event,
        };
        let mut line =
            serde_json::to_string(&te).map_err(|e| format!("JSON serialize error: {}", e))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("cannot open journal {}: {}", self.path.display(), e))?;
        // One write per line so concurrent runs never interleave mid-line.
        file.write_all(line.as_bytes())
            .map_err(|e| format!("write error: {}", e))?;

        Ok(())
    }

    /// Read every event back, oldest first.
    pub fn read_events(&self) -> Result<Vec<TimestampedEvent>, String> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {}", self.path.display(), e))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .map_err(|e| format!("{}:{}: invalid event: {}", self.path.display(), i + 1, e))
            })
            .collect()
    }
}
