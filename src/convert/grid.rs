use std::collections::HashSet;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Text content, if this is a text cell with something besides whitespace.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

/// Sheets of cells, addressed by sheet name and zero-based row/column.
pub trait Grid {
    fn sheet_names(&self) -> Vec<String>;

    /// `(rows, columns)` of a sheet.
    fn dimensions(&self, sheet: &str) -> Result<(usize, usize)>;

    /// Cells outside a ragged row read as [`CellValue::Empty`].
    fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellValue>;

    fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()>;

    /// Marks a cell with a fill color. Returns `false` when the grid cannot store formatting.
    fn highlight_cell(
        &mut self,
        _sheet: &str,
        _row: usize,
        _col: usize,
        _color: &str,
    ) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct MemorySheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
    highlights: Vec<(usize, usize, String)>,
}

/// In-memory grid for tests and embedding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryGrid {
    sheets: Vec<MemorySheet>,
}

impl MemoryGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> &mut Self {
        self.sheets.push(MemorySheet {
            name: name.into(),
            rows,
            highlights: Vec::new(),
        });
        self
    }

    /// Adds a sheet of text cells; empty strings become empty cells.
    pub fn add_text_sheet(&mut self, name: impl Into<String>, rows: &[&[&str]]) -> &mut Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|&c| CellValue::from(c)).collect())
            .collect();
        self.add_sheet(name, rows)
    }

    #[must_use]
    pub fn rows(&self, sheet: &str) -> Option<&[Vec<CellValue>]> {
        self.find(sheet).ok().map(|s| s.rows.as_slice())
    }

    /// Highlighted cells of a sheet as `(row, col, color)`.
    #[must_use]
    pub fn highlights(&self, sheet: &str) -> &[(usize, usize, String)] {
        self.find(sheet)
            .map(|s| s.highlights.as_slice())
            .unwrap_or(&[])
    }

    fn find(&self, sheet: &str) -> Result<&MemorySheet> {
        self.sheets
            .iter()
            .find(|s| s.name == sheet)
            .ok_or_else(|| Error::grid(sheet, "no such sheet"))
    }

    fn find_mut(&mut self, sheet: &str) -> Result<&mut MemorySheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == sheet)
            .ok_or_else(|| Error::grid(sheet, "no such sheet"))
    }
}

impl Grid for MemoryGrid {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn dimensions(&self, sheet: &str) -> Result<(usize, usize)> {
        let s = self.find(sheet)?;
        let cols = s.rows.iter().map(Vec::len).max().unwrap_or(0);
        Ok((s.rows.len(), cols))
    }

    fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellValue> {
        let s = self.find(sheet)?;
        Ok(s.rows
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or(CellValue::Empty))
    }

    fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
        let s = self.find_mut(sheet)?;
        let r = s
            .rows
            .get_mut(row)
            .ok_or_else(|| Error::grid(sheet, format!("row {row} out of range")))?;
        if r.len() <= col {
            r.resize(col + 1, CellValue::Empty);
        }
        r[col] = CellValue::Text(value.to_string());
        Ok(())
    }

    fn highlight_cell(&mut self, sheet: &str, row: usize, col: usize, color: &str) -> Result<bool> {
        let s = self.find_mut(sheet)?;
        s.highlights.push((row, col, color.to_string()));
        Ok(true)
    }
}

#[derive(Clone, Debug)]
struct CsvSheet {
    name: String,
    file_name: String,
    rows: Vec<Vec<String>>,
}

/// One CSV file per sheet: either a single file, or every `*.csv` in a directory (sorted by
/// name). Sheet names are the file stems; a stem seen before (`a.CSV` next to `a.csv`) gets a
/// `_2`, `_3`, ... suffix.
#[derive(Clone, Debug)]
pub struct CsvGrid {
    sheets: Vec<CsvSheet>,
    is_dir: bool,
    warned_highlight: bool,
}

impl CsvGrid {
    pub fn open(path: &Path) -> Result<Self> {
        let is_dir = path.is_dir();
        let files = if is_dir {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_csv_extension(p))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut sheets = Vec::with_capacity(files.len());
        let mut used = HashSet::new();
        for file in files {
            let mut sheet = read_sheet(&file)?;
            sheet.name = unique_name(&sheet.name, &mut used);
            sheets.push(sheet);
        }
        tracing::debug!(path = %path.display(), sheets = sheets.len(), "csv grid opened");
        Ok(Self {
            sheets,
            is_dir,
            warned_highlight: false,
        })
    }

    /// Where a converted copy goes by default: `a.csv` → `a{suffix}.csv`, `dir` → `dir{suffix}`.
    #[must_use]
    pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = if input.is_dir() {
            let full = input
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(stem);
            format!("{full}{suffix}")
        } else {
            match input.extension() {
                Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
                None => format!("{stem}{suffix}"),
            }
        };
        input.with_file_name(name)
    }

    /// Writes every sheet. A grid opened from a directory is written into directory `dest`,
    /// a single-file grid to file `dest`.
    pub fn save(&self, dest: &Path) -> Result<()> {
        if self.is_dir {
            std::fs::create_dir_all(dest)?;
            for sheet in &self.sheets {
                write_sheet(sheet, &dest.join(&sheet.file_name))?;
            }
        } else if let Some(sheet) = self.sheets.first() {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            write_sheet(sheet, dest)?;
        }
        Ok(())
    }

    fn find(&self, sheet: &str) -> Result<&CsvSheet> {
        self.sheets
            .iter()
            .find(|s| s.name == sheet)
            .ok_or_else(|| Error::grid(sheet, "no such sheet"))
    }
}

impl Grid for CsvGrid {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn dimensions(&self, sheet: &str) -> Result<(usize, usize)> {
        let s = self.find(sheet)?;
        let cols = s.rows.iter().map(Vec::len).max().unwrap_or(0);
        Ok((s.rows.len(), cols))
    }

    fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellValue> {
        let s = self.find(sheet)?;
        let Some(raw) = s.rows.get(row).and_then(|r| r.get(col)) else {
            return Ok(CellValue::Empty);
        };
        Ok(match parse_number(raw) {
            Some(n) => CellValue::Number(n),
            None => CellValue::from(raw.as_str()),
        })
    }

    fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
        let s = self
            .sheets
            .iter_mut()
            .find(|s| s.name == sheet)
            .ok_or_else(|| Error::grid(sheet, "no such sheet"))?;
        let r = s
            .rows
            .get_mut(row)
            .ok_or_else(|| Error::grid(sheet, format!("row {row} out of range")))?;
        if r.len() <= col {
            r.resize(col + 1, String::new());
        }
        r[col] = value.to_string();
        Ok(())
    }

    fn highlight_cell(
        &mut self,
        _sheet: &str,
        _row: usize,
        _col: usize,
        _color: &str,
    ) -> Result<bool> {
        if !self.warned_highlight {
            tracing::warn!("csv output cannot carry cell colors; highlighting ignored");
            self.warned_highlight = true;
        }
        Ok(false)
    }
}

fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = stem.to_string();
    let mut n = 1usize;
    while !used.insert(name.clone()) {
        n += 1;
        name = format!("{stem}_{n}");
        tracing::debug!(stem, renamed = %name, "duplicate sheet name");
    }
    name
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Plain decimal numbers only; words like "nan" or "inf" stay text.
fn parse_number(raw: &str) -> Option<f64> {
    let t = raw.trim();
    let has_digit = t.bytes().any(|b| b.is_ascii_digit());
    let has_word = t
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && !b.eq_ignore_ascii_case(&b'e'));
    if !has_digit || has_word {
        return None;
    }
    t.parse().ok()
}

fn read_sheet(path: &Path) -> Result<CsvSheet> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{name}.csv"));
    let text = std::fs::read_to_string(path)?;
    let text = text.trim_start_matches('\u{FEFF}');

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::grid(&name, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(CsvSheet {
        name,
        file_name,
        rows,
    })
}

fn write_sheet(sheet: &CsvSheet, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::grid(&sheet.name, e))?;
    for row in &sheet.rows {
        writer
            .write_record(row)
            .map_err(|e| Error::grid(&sheet.name, e))?;
    }
    writer.flush()?;
    Ok(())
}
