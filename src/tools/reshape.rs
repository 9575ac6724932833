//! Tools that reshape a table: pivots, group-bys and lookups.

use std::collections::HashMap;

use serde_json::{json, Value};

use super::inspect::aggregate;
use super::rows::sort_order;
use super::workbook::{load_table, safe_output_path, save_table, sibling_path, Cell, Table};
use super::{output_param, sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

/// Distinct non-empty values of one column, sorted, each with its row indices.
struct Groups {
    keys: Vec<Cell>,
    members: Vec<Vec<usize>>,
}

impl Groups {
    fn by_column(table: &Table, column: usize) -> Self {
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Cell, Vec<usize>)> = Vec::new();
        for (i, cell) in table.column(column).enumerate() {
            if cell.is_empty() {
                continue;
            }
            let slot = *position.entry(cell.key()).or_insert_with(|| {
                groups.push((cell.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(i);
        }
        groups.sort_by(|a, b| sort_order(&a.0, &b.0, true));
        let (keys, members) = groups.into_iter().unzip();
        Self { keys, members }
    }

    fn index_of(&self, cell: &Cell) -> Option<usize> {
        self.keys.iter().position(|k| k.key() == cell.key())
    }
}

/// Reduce one group of cells; `count` counts non-empty cells, the rest work on numbers.
fn reduce(function: &str, cells: &[&Cell]) -> Cell {
    if function == "count" {
        return Cell::Number(cells.iter().filter(|c| !c.is_empty()).count() as f64);
    }
    let numbers: Vec<f64> = cells.iter().filter_map(|c| c.as_f64()).collect();
    aggregate(function, &numbers).map_or(Cell::Empty, Cell::Number)
}

fn check_function(name: &str, function: &str, allowed: &[&str]) -> Result<(), ToolError> {
    if allowed.contains(&function) {
        Ok(())
    } else {
        Err(ToolError::invalid(
            name,
            format!("Unsupported aggregation function '{}'.", function),
        ))
    }
}

const PIVOT_FUNCTIONS: &[&str] = &["sum", "mean", "count"];

pub struct CreatePivotTable;

impl Tool for CreatePivotTable {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_pivot_table",
            description: "Creates a pivot table and saves it to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'pivot_table.xlsx')."),
                ParamSpec::string("index_column", "The column to use as the pivot table's index (rows).")
                    .required(),
                ParamSpec::string("columns_column", "The column to use for the pivot table's columns.")
                    .required(),
                ParamSpec::string("values_column", "The column to aggregate.").required(),
                ParamSpec::string("agg_func", "The aggregation function to use.").one_of(PIVOT_FUNCTIONS),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "index_column",
            "columns_column",
            "values_column",
            "agg_func",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let index_name = args.str("index_column")?;
        let index = table.column_index(index_name)?;
        let columns = table.column_index(args.str("columns_column")?)?;
        let values = table.column_index(args.str("values_column")?)?;
        let function = args.opt_str("agg_func")?.unwrap_or("sum");
        check_function("agg_func", function, PIVOT_FUNCTIONS)?;

        let row_groups = Groups::by_column(&table, index);
        let col_groups = Groups::by_column(&table, columns);

        let mut cells: Vec<Vec<Vec<&Cell>>> =
            vec![vec![Vec::new(); col_groups.keys.len()]; row_groups.keys.len()];
        for (r, members) in row_groups.members.iter().enumerate() {
            for &i in members {
                let row = &table.rows[i];
                if let Some(c) = col_groups.index_of(&row[columns]) {
                    cells[r][c].push(&row[values]);
                }
            }
        }

        let mut headers = vec![index_name.to_string()];
        headers.extend(col_groups.keys.iter().map(Cell::to_string));
        let rows = row_groups
            .keys
            .iter()
            .zip(&cells)
            .map(|(key, per_column)| {
                let mut row = vec![key.clone()];
                row.extend(per_column.iter().map(|group| {
                    if group.is_empty() {
                        Cell::Empty
                    } else {
                        reduce(function, group)
                    }
                }));
                row
            })
            .collect();
        let pivot = Table::new(headers, rows);
        save_table(&pivot, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "rows_written": pivot.rows.len(),
        }))
    }
}

const GROUP_FUNCTIONS: &[&str] = &["sum", "mean", "min", "max", "count"];

pub struct GroupByAndAggregate;

impl Tool for GroupByAndAggregate {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "group_by_and_aggregate",
            description: "Groups data by a column and calculates aggregations (e.g., sum, mean) for another column.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'grouped_data.xlsx')."),
                ParamSpec::string("group_by_column", "The column to group the data by.").required(),
                ParamSpec::string("agg_column", "The numeric column to perform the aggregations on.")
                    .required(),
                ParamSpec::list("agg_functions", "A list of aggregation functions to apply.")
                    .one_of(GROUP_FUNCTIONS)
                    .required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "group_by_column",
            "agg_column",
            "agg_functions",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let group_name = args.str("group_by_column")?;
        let group = table.column_index(group_name)?;
        let target = table.column_index(args.str("agg_column")?)?;
        let functions = args.str_list("agg_functions")?;
        if functions.is_empty() {
            return Err(ToolError::invalid("agg_functions", "at least one function is required"));
        }
        for function in &functions {
            check_function("agg_functions", function, GROUP_FUNCTIONS)?;
        }

        // Aggregated values are numeric; text that does not parse is ignored, even by count.
        let numeric: Vec<Cell> = table
            .column(target)
            .map(|c| c.as_f64().map_or(Cell::Empty, Cell::Number))
            .collect();
        let groups = Groups::by_column(&table, group);

        let mut headers = vec![group_name.to_string()];
        headers.extend(functions.iter().cloned());
        let rows = groups
            .keys
            .iter()
            .zip(&groups.members)
            .map(|(key, members)| {
                let cells: Vec<&Cell> = members.iter().map(|&i| &numeric[i]).collect();
                let mut row = vec![key.clone()];
                row.extend(functions.iter().map(|f| reduce(f, &cells)));
                row
            })
            .collect();
        let grouped = Table::new(headers, rows);
        save_table(&grouped, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "rows_written": grouped.rows.len(),
        }))
    }
}

/// Left join of selected columns from a second workbook, like VLOOKUP.
pub struct LookupAndMergeColumns;

impl Tool for LookupAndMergeColumns {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "lookup_and_merge_columns",
            description: "Merges columns from a secondary file/sheet into the primary file, similar to VLOOKUP.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'merged_data.xlsx')."),
                ParamSpec::string("left_on_column", "The key column in the primary (left) file to join on.")
                    .required(),
                ParamSpec::string(
                    "right_file_path",
                    "The filename of the secondary (right) file to merge from, located next to the primary file.",
                )
                .required(),
                ParamSpec::string("right_on_column", "The key column in the secondary (right) file to join on.")
                    .required(),
                ParamSpec::list(
                    "columns_to_merge",
                    "A list of column names from the secondary file to add to the primary file.",
                )
                .required(),
                sheet_param(),
                ParamSpec::string(
                    "right_sheet_name",
                    "The sheet in the secondary file to use. Defaults to the active sheet.",
                ),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "left_on_column",
            "right_file_path",
            "right_on_column",
            "columns_to_merge",
            "sheet_name",
            "right_sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let file_path = args.str("file_path")?;
        let right_path = sibling_path(file_path, args.str("right_file_path")?)?;

        let left = load_table(file_path, args.opt_str("sheet_name")?)?;
        let right = load_table(&right_path.to_string_lossy(), args.opt_str("right_sheet_name")?)?;

        let left_on_name = args.str("left_on_column")?;
        let left_on = left.column_index(left_on_name).map_err(|_| {
            ToolError::Rejected(format!(
                "Left key column '{}' not found in the primary file.",
                left_on_name
            ))
        })?;
        let right_on_name = args.str("right_on_column")?;
        let right_on = right.column_index(right_on_name).map_err(|_| {
            ToolError::Rejected(format!(
                "Right key column '{}' not found in the secondary file.",
                right_on_name
            ))
        })?;
        let merge_names = args.str_list("columns_to_merge")?;
        let merge: Vec<usize> = merge_names
            .iter()
            .map(|name| {
                right.column_index(name).map_err(|_| {
                    ToolError::Rejected(format!(
                        "Column to merge '{}' not found in the secondary file.",
                        name
                    ))
                })
            })
            .collect::<Result<_, _>>()?;

        // The right key is carried over unless it shares the left key's name.
        let mut right_columns = Vec::with_capacity(merge.len() + 1);
        if right_on_name != left_on_name {
            right_columns.push(right_on);
        }
        right_columns.extend(merge.iter().copied().filter(|&c| c != right_on));

        let right_headers: Vec<String> = right_columns.iter().map(|&c| right.headers[c].clone()).collect();
        let mut headers: Vec<String> = left
            .headers
            .iter()
            .map(|h| {
                if right_headers.contains(h) && h != left_on_name {
                    format!("{}_x", h)
                } else {
                    h.clone()
                }
            })
            .collect();
        headers.extend(right_headers.iter().map(|h| {
            if left.headers.contains(h) {
                format!("{}_y", h)
            } else {
                h.clone()
            }
        }));

        let mut lookup: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, cell) in right.column(right_on).enumerate() {
            if !cell.is_empty() {
                lookup.entry(cell.key()).or_default().push(i);
            }
        }

        let mut rows = Vec::with_capacity(left.rows.len());
        for row in &left.rows {
            let key = &row[left_on];
            let matches = if key.is_empty() { None } else { lookup.get(&key.key()) };
            match matches {
                Some(indices) => {
                    for &i in indices {
                        let mut merged = row.clone();
                        merged.extend(right_columns.iter().map(|&c| right.rows[i][c].clone()));
                        rows.push(merged);
                    }
                }
                None => rows.push(row.clone()),
            }
        }
        let merged = Table::new(headers, rows);
        save_table(&merged, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "rows_written": merged.rows.len(),
        }))
    }
}
