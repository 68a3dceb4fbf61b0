//! Walks a grid of cells and rewrites legacy-encoded text in place.

mod grid;
mod report;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::is_already_unicode;
use crate::error::Result;
use crate::transduce::Transducer;

pub use grid::{CellValue, CsvGrid, Grid, MemoryGrid};
pub use report::{render_report, write_report};

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFFF00";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Leave cells that already read as Unicode alone, unless the skip selection says otherwise.
    pub skip_already_unicode: bool,
    /// Fill color for converted cells; `None` disables highlighting.
    pub highlight: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            skip_already_unicode: true,
            highlight: None,
        }
    }
}

/// Per-cell overrides keyed by [`cell_id`]: `true` skips the cell, `false` forces conversion.
/// Cells without an entry are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipSelection(BTreeMap<String, bool>);

impl SkipSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: impl Into<String>, skip: bool) {
        self.0.insert(id.into(), skip);
    }

    #[must_use]
    pub fn should_skip(&self, id: &str) -> bool {
        self.0.get(id).copied().unwrap_or(true)
    }

    /// Starting point for a manual review: every previewed cell that already reads as Unicode,
    /// marked skipped. Flipping an entry to `false` forces that cell through the transducer.
    #[must_use]
    pub fn from_preview(entries: &[ConversionLogEntry]) -> Self {
        let mut skip = Self::new();
        for entry in entries.iter().filter(|e| e.was_unicode) {
            skip.set(entry.cell_id(), true);
        }
        skip
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `"{sheet}_{row}_{col}"` with a 1-based row and 0-based column.
#[must_use]
pub fn cell_id(sheet: &str, row: usize, col: usize) -> String {
    format!("{sheet}_{}_{col}", row + 1)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionLogEntry {
    pub sheet: String,
    /// 1-based.
    pub row: usize,
    pub col: usize,
    pub col_name: String,
    pub original: String,
    pub converted: String,
    pub was_unicode: bool,
}

impl ConversionLogEntry {
    fn new(
        sheet: &str,
        row: usize,
        col: usize,
        original: &str,
        converted: &str,
        was_unicode: bool,
    ) -> Self {
        Self {
            sheet: sheet.to_string(),
            row: row + 1,
            col,
            col_name: format!("Col_{col}"),
            original: original.to_string(),
            converted: converted.to_string(),
            was_unicode,
        }
    }

    /// The [`cell_id`] of the cell this entry describes.
    #[must_use]
    pub fn cell_id(&self) -> String {
        cell_id(&self.sheet, self.row.saturating_sub(1), self.col)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total_cells: usize,
    pub string_cells: usize,
    pub already_unicode: usize,
    pub converted_cells: usize,
    pub unchanged_cells: usize,
    pub sheets_processed: usize,
    pub logs: Vec<ConversionLogEntry>,
}

pub struct ConversionOrchestrator<'a> {
    transducer: &'a Transducer,
}

impl<'a> ConversionOrchestrator<'a> {
    #[must_use]
    pub fn new(transducer: &'a Transducer) -> Self {
        Self { transducer }
    }

    /// Converts every text cell in sheet order, then row-major. `progress` is called with
    /// `(sheet, index, total)` before each sheet, index 0-based. A grid error aborts the run.
    pub fn run<G: Grid + ?Sized>(
        &self,
        grid: &mut G,
        options: &ConversionOptions,
        skip: &SkipSelection,
        mut progress: Option<&mut dyn FnMut(&str, usize, usize)>,
    ) -> Result<ConversionStats> {
        let mut stats = ConversionStats::default();
        let sheets = grid.sheet_names();
        let total = sheets.len();

        for (index, sheet) in sheets.iter().enumerate() {
            if let Some(cb) = progress.as_mut() {
                cb(sheet.as_str(), index, total);
            }
            let (rows, cols) = grid.dimensions(sheet)?;
            stats.sheets_processed += 1;
            let converted_before = stats.converted_cells;

            for row in 0..rows {
                for col in 0..cols {
                    stats.total_cells += 1;
                    let CellValue::Text(original) = grid.cell(sheet, row, col)? else {
                        continue;
                    };
                    if original.trim().is_empty() {
                        continue;
                    }
                    stats.string_cells += 1;

                    let was_unicode = is_already_unicode(&original);
                    if options.skip_already_unicode
                        && was_unicode
                        && skip.should_skip(&cell_id(sheet, row, col))
                    {
                        stats.already_unicode += 1;
                        continue;
                    }

                    let converted = self.transducer.apply(&original);
                    if converted == original.as_str() {
                        stats.unchanged_cells += 1;
                        continue;
                    }
                    grid.set_cell(sheet, row, col, &converted)?;
                    if let Some(color) = options.highlight.as_deref() {
                        grid.highlight_cell(sheet, row, col, color)?;
                    }
                    stats.converted_cells += 1;
                    stats.logs.push(ConversionLogEntry::new(
                        sheet,
                        row,
                        col,
                        &original,
                        &converted,
                        was_unicode,
                    ));
                }
            }
            tracing::debug!(
                sheet = %sheet,
                rows,
                cols,
                converted = stats.converted_cells - converted_before,
                "sheet processed"
            );
        }
        Ok(stats)
    }

    /// Lists every non-blank text cell with what it would become, without touching the grid.
    /// Stops after `max_samples` entries.
    pub fn preview<G: Grid + ?Sized>(
        &self,
        grid: &G,
        max_samples: usize,
    ) -> Result<Vec<ConversionLogEntry>> {
        let mut samples = Vec::new();
        for sheet in grid.sheet_names() {
            let (rows, cols) = grid.dimensions(&sheet)?;
            for row in 0..rows {
                for col in 0..cols {
                    if samples.len() >= max_samples {
                        return Ok(samples);
                    }
                    let cell = grid.cell(&sheet, row, col)?;
                    let Some(original) = cell.as_text() else {
                        continue;
                    };
                    let converted = self.transducer.apply(original);
                    samples.push(ConversionLogEntry::new(
                        &sheet,
                        row,
                        col,
                        original,
                        &converted,
                        is_already_unicode(original),
                    ));
                }
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CharacterMapping;
    use pretty_assertions::assert_eq;

    fn transducer() -> Transducer {
        let mapping: CharacterMapping = [('µ', 'à'), ('Ð', 'Đ'), ('é', 'ộ'), ('§', 'Đ')]
            .into_iter()
            .collect();
        Transducer::compile(&mapping)
    }

    fn run(
        grid: &mut MemoryGrid,
        options: &ConversionOptions,
        skip: &SkipSelection,
    ) -> ConversionStats {
        let t = transducer();
        ConversionOrchestrator::new(&t)
            .run(grid, options, skip, None)
            .unwrap()
    }

    #[test]
    fn legacy_cell_is_rewritten() {
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&["Hµ Néi"]]);
        let stats = run(&mut g, &ConversionOptions::default(), &SkipSelection::new());

        assert_eq!(stats.string_cells, 1);
        assert_eq!(stats.already_unicode, 0);
        assert_eq!(stats.converted_cells, 1);
        assert_eq!(g.cell("S", 0, 0).unwrap(), CellValue::Text("Hà Nội".into()));
        assert_eq!(
            stats.logs,
            vec![ConversionLogEntry {
                sheet: "S".into(),
                row: 1,
                col: 0,
                col_name: "Col_0".into(),
                original: "Hµ Néi".into(),
                converted: "Hà Nội".into(),
                was_unicode: false,
            }]
        );
    }

    #[test]
    fn unicode_cell_is_left_alone() {
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&["Hà Nội"]]);
        let stats = run(&mut g, &ConversionOptions::default(), &SkipSelection::new());

        assert_eq!(stats.already_unicode, 1);
        assert_eq!(stats.converted_cells, 0);
        assert_eq!(g.cell("S", 0, 0).unwrap(), CellValue::Text("Hà Nội".into()));
    }

    #[test]
    fn counts_every_cell_and_skips_non_text() {
        let mut g = MemoryGrid::new();
        g.add_sheet(
            "S",
            vec![
                vec![CellValue::Number(1.0), CellValue::Empty, CellValue::from("  ")],
                vec![CellValue::from("abc"), CellValue::from("§µ")],
            ],
        );
        let options = ConversionOptions {
            skip_already_unicode: false,
            highlight: None,
        };
        let stats = run(&mut g, &options, &SkipSelection::new());
        assert_eq!(stats.total_cells, 6);
        assert_eq!(stats.string_cells, 2);
        assert_eq!(stats.unchanged_cells, 1);
        assert_eq!(stats.converted_cells, 1);
        assert_eq!(g.cell("S", 1, 1).unwrap(), CellValue::Text("Đà".into()));
    }

    #[test]
    fn skip_selection_can_force_unicode_cells() {
        // "Né" is valid Vietnamese, but é is also a legacy glyph for ộ.
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&["Né", "Né"]]);
        let mut skip = SkipSelection::new();
        skip.set(cell_id("S", 0, 1), false);

        let stats = run(&mut g, &ConversionOptions::default(), &skip);
        assert_eq!(stats.already_unicode, 1);
        assert_eq!(stats.converted_cells, 1);
        assert!(stats.logs[0].was_unicode);
        assert_eq!(g.cell("S", 0, 0).unwrap(), CellValue::Text("Né".into()));
        assert_eq!(g.cell("S", 0, 1).unwrap(), CellValue::Text("Nộ".into()));
    }

    #[test]
    fn highlights_and_progress() {
        let mut g = MemoryGrid::new();
        g.add_text_sheet("A", &[&["Hµ"]]);
        g.add_text_sheet("B", &[&["ok"]]);
        let options = ConversionOptions {
            highlight: Some(DEFAULT_HIGHLIGHT_COLOR.to_string()),
            ..ConversionOptions::default()
        };
        let t = transducer();
        let mut seen = Vec::new();
        let mut cb = |sheet: &str, i: usize, n: usize| seen.push((sheet.to_string(), i, n));
        let stats = ConversionOrchestrator::new(&t)
            .run(&mut g, &options, &SkipSelection::new(), Some(&mut cb))
            .unwrap();

        assert_eq!(stats.sheets_processed, 2);
        assert_eq!(seen, vec![("A".to_string(), 0, 2), ("B".to_string(), 1, 2)]);
        assert_eq!(g.highlights("A"), &[(0, 0, "#FFFF00".to_string())]);
        assert!(g.highlights("B").is_empty());
    }

    #[test]
    fn preview_lists_all_text_cells() {
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&["Hµ Néi", "", "Hà Nội"], &["x"]]);
        let t = transducer();
        let before = g.clone();

        let samples = ConversionOrchestrator::new(&t).preview(&g, 10).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].converted, "Hà Nội");
        assert!(samples[1].was_unicode);
        assert_eq!(samples[2].row, 2);
        assert_eq!(g, before);

        assert_eq!(ConversionOrchestrator::new(&t).preview(&g, 1).unwrap().len(), 1);
    }

    #[test]
    fn preview_entries_round_trip_through_skip_selection() {
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&["Hµ Néi", "Né"], &["", "Hà Nội"]]);
        let t = transducer();
        let samples = ConversionOrchestrator::new(&t).preview(&g, 10).unwrap();
        let ids: Vec<String> = samples.iter().map(ConversionLogEntry::cell_id).collect();
        assert_eq!(ids, vec!["S_1_0", "S_1_1", "S_2_1"]);

        let mut skip = SkipSelection::from_preview(&samples);
        assert_eq!(skip.len(), 2);
        let json = skip.to_json_pretty().unwrap();
        assert_eq!(json, "{\n  \"S_1_1\": true,\n  \"S_2_1\": true\n}");

        // The reviewer flips "Né" to be converted.
        skip.set(samples[1].cell_id(), false);
        let stats = run(&mut g, &ConversionOptions::default(), &skip);
        assert_eq!(stats.already_unicode, 1);
        assert_eq!(g.cell("S", 0, 1).unwrap(), CellValue::Text("Nộ".into()));
        assert_eq!(g.cell("S", 1, 1).unwrap(), CellValue::Text("Hà Nội".into()));
    }

    #[test]
    fn cells_are_transduced_without_repair() {
        // What `--test` prints must match what a cell becomes.
        let text = "Tiáº¿ng Hµ";
        let mut g = MemoryGrid::new();
        g.add_text_sheet("S", &[&[text]]);
        run(&mut g, &ConversionOptions::default(), &SkipSelection::new());

        let t = transducer();
        assert_eq!(g.cell("S", 0, 0).unwrap(), CellValue::Text(t.apply(text).into_owned()));
        assert_eq!(t.apply(text), "Tiáº¿ng Hà");
    }

    /// Lists a sheet the backing grid does not have.
    struct GhostSheetGrid(MemoryGrid);

    impl Grid for GhostSheetGrid {
        fn sheet_names(&self) -> Vec<String> {
            let mut names = self.0.sheet_names();
            names.push("Ghost".to_string());
            names
        }

        fn dimensions(&self, sheet: &str) -> Result<(usize, usize)> {
            self.0.dimensions(sheet)
        }

        fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellValue> {
            self.0.cell(sheet, row, col)
        }

        fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
            self.0.set_cell(sheet, row, col, value)
        }
    }

    #[test]
    fn grid_errors_abort_the_run() {
        let mut inner = MemoryGrid::new();
        inner.add_text_sheet("S", &[&["Hµ"]]);
        let mut g = GhostSheetGrid(inner);
        let t = transducer();
        let mut seen = Vec::new();
        let mut cb = |sheet: &str, _: usize, _: usize| seen.push(sheet.to_string());

        let err = ConversionOrchestrator::new(&t)
            .run(
                &mut g,
                &ConversionOptions::default(),
                &SkipSelection::new(),
                Some(&mut cb),
            )
            .unwrap_err();
        assert!(
            matches!(&err, crate::Error::Grid { sheet, .. } if sheet == "Ghost"),
            "{err}"
        );
        assert_eq!(seen, vec!["S", "Ghost"]);
        // Sheets before the failure were still written.
        assert_eq!(g.0.cell("S", 0, 0).unwrap(), CellValue::Text("Hà".into()));

        assert!(ConversionOrchestrator::new(&t).preview(&g, 10).is_err());
    }

    #[test]
    fn skip_selection_from_json() {
        let skip = SkipSelection::from_json(r#"{"S_1_0": false, "S_2_0": true}"#).unwrap();
        assert!(!skip.should_skip("S_1_0"));
        assert!(skip.should_skip("S_2_0"));
        assert!(skip.should_skip("S_3_0"));
    }
}
