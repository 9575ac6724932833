//! Read-only tools: summaries, previews, unique values and aggregates.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::workbook::{load_table, Cell, Workbook};
use super::{sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

/// Sheet name, row count and header of one sheet.
pub struct GetDataSummary;

impl Tool for GetDataSummary {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_data_summary",
            description: "Reads an Excel file and returns a summary of its contents, including sheet name, total rows, and header columns.",
            params: vec![ParamSpec::string(
                "sheet_name",
                "The name of the sheet to summarize. Defaults to the active sheet if not provided.",
            )],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "sheet_name"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let workbook = Workbook::open(args.str("file_path")?)?;
        let sheet = workbook.sheet(args.opt_str("sheet_name")?)?;
        Ok(json!({
            "sheet_name": sheet.name,
            "total_rows": sheet.total_rows(),
            "header_columns": sheet.table.headers,
        }))
    }
}

pub struct ListSheets;

impl Tool for ListSheets {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list_sheets",
            description: "Lists all the names of the sheets in the Excel workbook.",
            params: vec![],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let workbook = Workbook::open(args.str("file_path")?)?;
        Ok(json!({ "success": true, "sheet_names": workbook.sheet_names() }))
    }
}

/// A window of rows as header-keyed objects.
pub struct ReadRows;

impl Tool for ReadRows {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read_rows",
            description: "Reads a specific range of rows from an Excel sheet.",
            params: vec![
                ParamSpec::string(
                    "sheet_name",
                    "The name of the sheet to read from. Defaults to the active sheet.",
                ),
                ParamSpec::integer(
                    "offset",
                    "The 0-based row number to start reading from (row 0 is the header). Defaults to 1.",
                ),
                ParamSpec::integer("limit", "The maximum number of rows to read. Defaults to 5."),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "sheet_name", "offset", "limit"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let offset = args.usize_or("offset", 1)?;
        let limit = args.usize_or("limit", 5)?;

        let header_row: Vec<Cell> = table.headers.iter().map(|h| Cell::Text(h.clone())).collect();
        let rows: Vec<Value> = std::iter::once(&header_row)
            .chain(table.rows.iter())
            .skip(offset)
            .take(limit)
            .map(|row| table.row_json(row))
            .collect();
        Ok(Value::Array(rows))
    }
}

pub struct GetUniqueValues;

impl Tool for GetUniqueValues {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_unique_values",
            description: "Gets a list of unique values from a specified column.",
            params: vec![
                ParamSpec::string("column_name", "The name of the column to get unique values from.")
                    .required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "column_name", "sheet_name"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column = table.column_index(args.str("column_name")?)?;

        let mut seen = HashSet::new();
        let unique: Vec<Value> = table
            .column(column)
            .filter(|cell| seen.insert(cell.key()))
            .map(Cell::to_json)
            .collect();
        Ok(json!({ "count": unique.len(), "unique_values": unique }))
    }
}

const AGGREGATES: &[&str] = &["sum", "mean", "min", "max"];

/// Sum, mean, min or max over the numeric cells of one column.
pub struct ColumnAggregate;

impl Tool for ColumnAggregate {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "column_aggregate",
            description: "Performs a simple aggregation (sum, mean, min, max) on a single column.",
            params: vec![
                ParamSpec::string("column_name", "The name of the column to aggregate.").required(),
                ParamSpec::string("aggregate_function", "The aggregation function to apply.")
                    .one_of(AGGREGATES)
                    .required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "column_name", "aggregate_function", "sheet_name"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column = table.column_index(args.str("column_name")?)?;
        let function = args.str("aggregate_function")?;
        if !AGGREGATES.contains(&function) {
            return Err(ToolError::invalid(
                "aggregate_function",
                format!("Unsupported aggregate function '{}'.", function),
            ));
        }

        let values: Vec<f64> = table.column(column).filter_map(Cell::as_f64).collect();
        let Some(result) = aggregate(function, &values) else {
            return Ok(json!({ "result": null, "processed_rows": 0 }));
        };
        Ok(json!({ "result": result, "processed_rows": values.len() }))
    }
}

/// Apply a named aggregate; `None` for an empty input.
pub(super) fn aggregate(function: &str, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    match function {
        "sum" => Some(sum),
        "mean" => Some(sum / values.len() as f64),
        "min" => values.iter().copied().reduce(f64::min),
        "max" => values.iter().copied().reduce(f64::max),
        "count" => Some(values.len() as f64),
        _ => None,
    }
}
