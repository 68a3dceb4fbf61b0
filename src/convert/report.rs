use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};

use super::ConversionStats;
use crate::error::Result;

const RULE_WIDTH: usize = 80;

/// Plain-text conversion log: counts, then every changed cell with its before/after text.
pub fn render_report(
    stats: &ConversionStats,
    fingerprint: Option<&str>,
    at: DateTime<Local>,
) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "TCVN3 → Unicode Conversion Log");
    let _ = writeln!(out, "Time: {}", at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(fp) = fingerprint {
        let _ = writeln!(out, "Mapping: sha256:{fp}");
    }
    let _ = writeln!(out, "{heavy}");
    out.push('\n');

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  - Total cells: {}", thousands(stats.total_cells));
    let _ = writeln!(out, "  - Text cells: {}", thousands(stats.string_cells));
    let _ = writeln!(out, "  - Already Unicode: {}", thousands(stats.already_unicode));
    let _ = writeln!(out, "  - Converted: {}", thousands(stats.converted_cells));
    let _ = writeln!(out, "  - Unchanged: {}", thousands(stats.unchanged_cells));
    let _ = writeln!(out, "  - Sheets: {}", stats.sheets_processed);
    out.push('\n');

    if stats.logs.is_empty() {
        let _ = writeln!(out, "No cells needed conversion.");
        return out;
    }

    let _ = writeln!(out, "Details of {} converted cells:", stats.logs.len());
    let _ = writeln!(out, "{light}");
    for (i, log) in stats.logs.iter().enumerate() {
        let _ = writeln!(
            out,
            "\n[{}] Sheet: {} | Row: {} | Col: {}",
            i + 1,
            log.sheet,
            log.row,
            log.col_name
        );
        let _ = writeln!(out, "    BEFORE: {}", log.original);
        let _ = writeln!(out, "    AFTER:  {}", log.converted);
    }
    out
}

pub fn write_report(path: &Path, stats: &ConversionStats, fingerprint: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_report(stats, fingerprint, Local::now()))?;
    Ok(())
}

fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
