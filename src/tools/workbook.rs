//! In-memory workbook model shared by the spreadsheet tools.
//!
//! Workbooks are read with `calamine` and written with `rust_xlsxwriter`. Only
//! values survive a round trip; styling and formulas are not preserved.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_xlsxwriter::{
    Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, Workbook as XlsxWorkbook,
    Worksheet,
};
use serde_json::{Map, Number, Value};

use super::ToolError;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => Cell::Text(s.clone()),
            Data::DateTime(dt) if dt.is_datetime() => dt
                .as_datetime()
                .map_or(Cell::Number(dt.as_f64()), Cell::DateTime),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) => data
                .as_datetime()
                .map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Convert an LLM-supplied JSON scalar.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Number(n) => number_json(*n),
            Cell::DateTime(_) => Value::String(self.to_string()),
        }
    }

    /// Accepts `YYYY-MM-DD`, with an optional `HH:MM:SS` after a space or `T`.
    pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric view; numeric text is coerced, anything else is not a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Ordering between comparable values; mixed kinds are incomparable.
    pub fn compare(&self, other: &Cell) -> Option<Ordering> {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.partial_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => Some(a.cmp(b)),
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            (Cell::DateTime(a), Cell::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Key used for grouping and de-duplication.
    pub fn key(&self) -> String {
        match self {
            Cell::Empty => String::from("\u{0}empty"),
            Cell::Number(n) => format!("n:{}", n),
            Cell::Text(s) => format!("s:{}", s),
            Cell::Bool(b) => format!("b:{}", b),
            Cell::DateTime(dt) => format!("d:{}", dt),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) if dt.time() == NaiveTime::MIN => {
                write!(f, "{}", dt.format(DATE_FORMAT))
            }
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

/// Whole numbers render as integers so row previews read naturally.
fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// A header row plus data rows, every row padded to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// First grid row is the header; blank header cells get positional names.
    fn from_grid(mut grid: Vec<Vec<Cell>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header_row = grid.remove(0);
        let headers = header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Cell::Empty => format!("Unnamed: {}", i),
                other => other.to_string(),
            })
            .collect();
        Self::new(headers, grid)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ToolError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ToolError::ColumnNotFound(name.to_string()))
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Numeric column: every non-empty cell is a number.
    pub fn is_numeric_column(&self, index: usize) -> bool {
        self.column(index)
            .all(|c| matches!(c, Cell::Empty | Cell::Number(_)))
    }

    /// Date column: every non-empty cell is a date or timestamp.
    pub fn is_datetime_column(&self, index: usize) -> bool {
        self.column(index)
            .all(|c| matches!(c, Cell::Empty | Cell::DateTime(_)))
    }

    /// Add a column, replacing an existing column of the same name.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        match self.headers.iter().position(|h| h == name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    pub fn remove_columns(&mut self, indices: &[usize]) {
        let keep: Vec<bool> = (0..self.headers.len())
            .map(|i| !indices.contains(&i))
            .collect();
        let mut flags = keep.iter();
        self.headers.retain(|_| *flags.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    pub fn row_json(&self, row: &[Cell]) -> Value {
        let object: Map<String, Value> = self
            .headers
            .iter()
            .zip(row)
            .map(|(h, c)| (h.clone(), c.to_json()))
            .collect();
        Value::Object(object)
    }
}

/// Comparison rule for a cell-value highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HighlightRule {
    GreaterThan(f64),
    LessThan(f64),
    EqualTo(f64),
    NotEqualTo(f64),
}

/// A conditional fill applied to one column's data cells when saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub column: usize,
    pub rule: HighlightRule,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
    pub highlights: Vec<Highlight>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
            highlights: Vec::new(),
        }
    }

    /// Rows in the sheet including the header row.
    pub fn total_rows(&self) -> usize {
        if self.table.headers.is_empty() {
            0
        } else {
            self.table.rows.len() + 1
        }
    }
}

/// All sheets of one workbook, in file order. The first sheet is the active one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        let path = path.as_ref();
        let read_err = |message: String| ToolError::Read {
            path: path.display().to_string(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| read_err(e.to_string()))?;
        let names = workbook.sheet_names();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names.iter() {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| read_err(e.to_string()))?;
            let grid: Vec<Vec<Cell>> = range
                .rows()
                .map(|row| row.iter().map(Cell::from_data).collect())
                .collect();
            sheets.push(Sheet::new(name.to_string(), Table::from_grid(grid)));
        }
        Ok(Self { sheets })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn position(&self, name: Option<&str>) -> Result<usize, ToolError> {
        match name {
            None if self.sheets.is_empty() => Err(ToolError::Rejected(
                "Workbook contains no sheets.".to_string(),
            )),
            None => Ok(0),
            Some(name) => self
                .sheets
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| ToolError::SheetNotFound {
                    name: name.to_string(),
                    available: self.sheet_names(),
                }),
        }
    }

    /// Named sheet, or the active sheet when `name` is `None`.
    pub fn sheet(&self, name: Option<&str>) -> Result<&Sheet, ToolError> {
        let index = self.position(name)?;
        Ok(&self.sheets[index])
    }

    pub fn sheet_mut(&mut self, name: Option<&str>) -> Result<&mut Sheet, ToolError> {
        let index = self.position(name)?;
        Ok(&mut self.sheets[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ToolError> {
        let mut workbook = XlsxWorkbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            write_table(worksheet, &sheet.table)?;
            for highlight in &sheet.highlights {
                write_highlight(worksheet, &sheet.table, highlight)?;
            }
        }
        workbook.save(path.as_ref())?;
        Ok(())
    }
}

/// Load one sheet's table from a workbook file.
pub fn load_table(path: &str, sheet_name: Option<&str>) -> Result<Table, ToolError> {
    let mut workbook = Workbook::open(path)?;
    let index = workbook.position(sheet_name)?;
    Ok(workbook.sheets.swap_remove(index).table)
}

/// Save a table as a single-sheet workbook.
pub fn save_table(table: &Table, path: &Path) -> Result<(), ToolError> {
    Workbook {
        sheets: vec![Sheet::new("Sheet1", table.clone())],
    }
    .save(path)
}

fn cell_coords(row: usize, col: usize) -> Result<(u32, u16), ToolError> {
    let row = u32::try_from(row).map_err(|_| ToolError::Rejected("Too many rows to write.".into()))?;
    let col = u16::try_from(col).map_err(|_| ToolError::Rejected("Too many columns to write.".into()))?;
    Ok((row, col))
}

/// Serial day number in Excel's 1900 date system; 1970-01-01 is day 25569.
fn excel_serial(dt: &NaiveDateTime) -> f64 {
    const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
    UNIX_EPOCH_SERIAL + dt.and_utc().timestamp_millis() as f64 / 86_400_000.0
}

fn write_table(worksheet: &mut Worksheet, table: &Table) -> Result<(), ToolError> {
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    for (c, header) in table.headers.iter().enumerate() {
        let (r, c) = cell_coords(0, c)?;
        worksheet.write_string(r, c, header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = cell_coords(r + 1, c)?;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Number(_) => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Cell::DateTime(dt) => {
                    let format = if dt.time() == NaiveTime::MIN {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_number_with_format(r, c, excel_serial(dt), format)?;
                }
            }
        }
    }
    Ok(())
}

fn write_highlight(
    worksheet: &mut Worksheet,
    table: &Table,
    highlight: &Highlight,
) -> Result<(), ToolError> {
    let rule = match highlight.rule {
        HighlightRule::GreaterThan(v) => ConditionalFormatCellRule::GreaterThan(v),
        HighlightRule::LessThan(v) => ConditionalFormatCellRule::LessThan(v),
        HighlightRule::EqualTo(v) => ConditionalFormatCellRule::EqualTo(v),
        HighlightRule::NotEqualTo(v) => ConditionalFormatCellRule::NotEqualTo(v),
    };
    let format = Format::new().set_background_color(Color::RGB(highlight.color));
    let conditional = ConditionalFormatCell::new().set_rule(rule).set_format(format);

    let (last_row, col) = cell_coords(table.rows.len().max(1), highlight.column)?;
    worksheet.add_conditional_format(1, col, last_row, col, &conditional)?;
    Ok(())
}

/// Join `filename` onto `output_dir`, refusing traversal and absolute paths.
pub fn safe_output_path(output_dir: impl AsRef<Path>, filename: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(filename);
    let escapes = filename.contains("..")
        || candidate.is_absolute()
        || candidate
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    if filename.trim().is_empty() || escapes {
        return Err(ToolError::UnsafePath(filename.to_string()));
    }
    Ok(output_dir.as_ref().join(candidate))
}

/// A file in the same directory as `primary`, under the same rules as
/// [`safe_output_path`].
pub fn sibling_path(primary: impl AsRef<Path>, filename: &str) -> Result<PathBuf, ToolError> {
    let dir = primary.as_ref().parent().unwrap_or_else(|| Path::new(""));
    safe_output_path(dir, filename)
}
