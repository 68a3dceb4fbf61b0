use std::io::{self, Write};
use std::time::Instant;

use crate::convert::ConversionStats;

/// Timestamped status lines on stderr for the command-line tool.
pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }

    pub fn progress(&self, label: &str, current: usize, total: usize) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", progress_line(label, current, total));
    }

    /// Callback for [`crate::convert::ConversionOrchestrator::run`]; the orchestrator's sheet
    /// index is 0-based, the printed one 1-based.
    pub fn sheet_callback(&self) -> impl FnMut(&str, usize, usize) + '_ {
        move |sheet: &str, index: usize, total: usize| {
            self.progress(&format!("sheet {sheet:?}"), index + 1, total);
        }
    }

    pub fn summary(&self, stats: &ConversionStats) {
        self.info(format!(
            "done: {} sheets, {} cells, {} text, {} already unicode, {} converted, {} unchanged",
            stats.sheets_processed,
            stats.total_cells,
            stats.string_cells,
            stats.already_unicode,
            stats.converted_cells,
            stats.unchanged_cells
        ));
    }
}

fn progress_line(label: &str, current: usize, total: usize) -> String {
    let total = total.max(1);
    let current = current.min(total);
    let pct = (current as f64 / total as f64) * 100.0;
    format!("{label} {current}/{total} ({pct:5.1}%)")
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
