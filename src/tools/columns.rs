//! Column-level write tools.

use serde_json::{json, Value};

use super::condition::{coerce_for_column, Comparison, OPERATORS};
use super::workbook::{load_table, safe_output_path, save_table, Cell};
use super::{output_param, sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

const ARITHMETIC: &[&str] = &["+", "-", "*", "/"];

/// `new = col1 <op> col2`, row by row, over numeric-coercible cells.
pub struct AddColumnFromFormula;

impl Tool for AddColumnFromFormula {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_column_from_formula",
            description: "Adds a new column based on a formula involving two existing columns and saves to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'calculated_data.xlsx')."),
                ParamSpec::string("new_column_name", "The name for the new column being created.")
                    .required(),
                ParamSpec::string("col1", "The name of the first column in the formula.").required(),
                ParamSpec::string("operator", "The mathematical operator to use.")
                    .one_of(ARITHMETIC)
                    .required(),
                ParamSpec::string("col2", "The name of the second column in the formula.").required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "new_column_name",
            "col1",
            "operator",
            "col2",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let left = table.column_index(args.str("col1")?)?;
        let right = table.column_index(args.str("col2")?)?;
        let operator = args.str("operator")?;
        let apply: fn(f64, f64) -> f64 = match operator {
            "+" => |a, b| a + b,
            "-" => |a, b| a - b,
            "*" => |a, b| a * b,
            "/" => |a, b| a / b,
            other => {
                return Err(ToolError::invalid(
                    "operator",
                    format!("Operator '{}' not handled.", other),
                ))
            }
        };

        let values = table
            .rows
            .iter()
            .map(|row| match (row[left].as_f64(), row[right].as_f64()) {
                (Some(a), Some(b)) => Some(apply(a, b))
                    .filter(|n| n.is_finite())
                    .map_or(Cell::Empty, Cell::Number),
                _ => Cell::Empty,
            })
            .collect();
        table.set_column(args.str("new_column_name")?, values);
        save_table(&table, &output)?;

        Ok(json!({ "success": true, "output_file": output.display().to_string() }))
    }
}

pub struct DeleteColumns;

impl Tool for DeleteColumns {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_columns",
            description: "Deletes one or more specified columns from the sheet and saves to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'data_without_columns.xlsx')."),
                ParamSpec::list("columns_to_delete", "A list of column names to be deleted.").required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "columns_to_delete",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let requested = args.str_list("columns_to_delete")?;

        let existing: Vec<String> = requested
            .iter()
            .filter(|name| table.headers.contains(*name))
            .cloned()
            .collect();
        if existing.is_empty() {
            return Err(ToolError::Rejected(format!(
                "None of the specified columns {:?} exist in the file.",
                requested
            )));
        }
        let indices: Vec<usize> = existing
            .iter()
            .filter_map(|name| table.column_index(name).ok())
            .collect();
        table.remove_columns(&indices);
        save_table(&table, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "deleted_columns": existing,
        }))
    }
}

pub struct RenameColumn;

impl Tool for RenameColumn {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "rename_column",
            description: "Renames a single column and saves the result to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'renamed_data.xlsx')."),
                ParamSpec::string("old_column_name", "The current name of the column to rename.")
                    .required(),
                ParamSpec::string("new_column_name", "The new name for the column.").required(),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "old_column_name",
            "new_column_name",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let old_name = args.str("old_column_name")?;
        let new_name = args.str("new_column_name")?;

        let index = table.column_index(old_name)?;
        table.headers[index] = new_name.to_string();
        save_table(&table, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "renamed_from": old_name,
            "renamed_to": new_name,
        }))
    }
}

pub struct FillMissingValues;

impl Tool for FillMissingValues {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "fill_missing_values",
            description: "Fills empty cells in a specified column with a given value.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'filled_data.xlsx')."),
                ParamSpec::string("column_name", "The column in which to fill missing values.")
                    .required(),
                ParamSpec::string(
                    "fill_value",
                    "The value to use for filling. For numeric columns, provide a number as a string.",
                )
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
            "column_name",
            "fill_value",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column_name = args.str("column_name")?;
        let column = table.column_index(column_name)?;

        let mut fill = args.cell("fill_value")?;
        if table.is_numeric_column(column) {
            fill = fill.as_f64().map(Cell::Number).ok_or_else(|| {
                ToolError::invalid(
                    "fill_value",
                    format!(
                        "Cannot convert fill_value '{}' to numeric type for column '{}'.",
                        fill, column_name
                    ),
                )
            })?;
        }
        for row in &mut table.rows {
            if row[column].is_empty() {
                row[column] = fill.clone();
            }
        }
        save_table(&table, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "filled_column": column_name,
        }))
    }
}

const STRING_OPERATIONS: &[&str] = &["uppercase", "lowercase", "trim"];

pub struct StringManipulationInColumn;

impl Tool for StringManipulationInColumn {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "string_manipulation_in_column",
            description: "Performs a string operation (uppercase, lowercase, trim) on all values in a column.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'cleaned_data.xlsx')."),
                ParamSpec::string("column_name", "The column to manipulate.").required(),
                ParamSpec::string("operation", "The string operation to perform.")
                    .one_of(STRING_OPERATIONS)
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
            "column_name",
            "operation",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column_name = args.str("column_name")?;
        let column = table.column_index(column_name)?;
        let operation = args.str("operation")?;
        let transform: fn(&str) -> String = match operation {
            "uppercase" => str::to_uppercase,
            "lowercase" => str::to_lowercase,
            "trim" => |s| s.trim().to_string(),
            other => {
                return Err(ToolError::invalid(
                    "operation",
                    format!("Invalid string operation '{}'.", other),
                ))
            }
        };

        // Every non-empty value becomes text, numbers included.
        for row in &mut table.rows {
            if !row[column].is_empty() {
                row[column] = Cell::Text(transform(&row[column].to_string()));
            }
        }
        save_table(&table, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "manipulated_column": column_name,
            "operation": operation,
        }))
    }
}

/// `new = if source <op> value { true_value } else { false_value }`.
pub struct ConditionalValueColumn;

impl Tool for ConditionalValueColumn {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "conditional_value_column",
            description: "Creates a new column with values based on an if/else condition on a source column.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'conditional_data.xlsx')."),
                ParamSpec::string("new_column_name", "The name of the new column to create.").required(),
                ParamSpec::string("source_column", "The name of the column to check the condition against.")
                    .required(),
                ParamSpec::string("operator", "The comparison operator for the condition.")
                    .one_of(OPERATORS)
                    .required(),
                ParamSpec::string("value", "The value to compare against in the condition.").required(),
                ParamSpec::string("true_value", "The value to set in the new column if the condition is true.")
                    .required(),
                ParamSpec::string(
                    "false_value",
                    "The value to set in the new column if the condition is false.",
                )
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
            "new_column_name",
            "source_column",
            "operator",
            "value",
            "true_value",
            "false_value",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let source = table.column_index(args.str("source_column")?)?;
        let comparison = Comparison::parse(args.str("operator")?)?;
        let value = coerce_for_column(&table, source, args.cell("value")?);
        let if_true = args.cell("true_value")?;
        let if_false = args.cell("false_value")?;

        let values = table
            .rows
            .iter()
            .map(|row| {
                if comparison.matches(&row[source], &value) {
                    if_true.clone()
                } else {
                    if_false.clone()
                }
            })
            .collect();
        table.set_column(args.str("new_column_name")?, values);
        save_table(&table, &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "rows_written": table.rows.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::workbook::{Sheet, Table, Workbook};
    use serde_json::Map;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.xlsx");
        let t = |s: &str| Cell::Text(s.to_string());
        let table = Table::new(
            vec!["Item".into(), "Qty".into(), "Price".into()],
            vec![
                vec![t("  apple "), Cell::Number(2.0), Cell::Number(1.5)],
                vec![t("Pear"), Cell::Number(4.0), Cell::Number(0.0)],
                vec![t("plum"), Cell::Empty, t("n/a")],
            ],
        );
        Workbook {
            sheets: vec![Sheet::new("Orders", table)],
        }
        .save(&path)
        .unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    fn run(tool: &dyn Tool, dir: &TempDir, file: &str, extra: Value) -> Result<Value, ToolError> {
        let mut map = Map::new();
        map.insert("file_path".into(), json!(file));
        map.insert("file_output_dir".into(), json!(dir.path().to_string_lossy()));
        if let Value::Object(extra) = extra {
            map.extend(extra);
        }
        tool.run(&ToolArgs::new(map))
    }

    fn output(dir: &TempDir) -> Table {
        load_table(&dir.path().join("out.xlsx").to_string_lossy(), None).unwrap()
    }

    #[test]
    fn formula_leaves_invalid_results_empty() {
        let (dir, file) = fixture();
        run(
            &AddColumnFromFormula,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "new_column_name": "Unit", "col1": "Qty", "operator": "/", "col2": "Price" }),
        )
        .unwrap();
        let table = output(&dir);
        assert_eq!(table.headers, vec!["Item", "Qty", "Price", "Unit"]);
        let unit: Vec<Cell> = table.column(3).cloned().collect();
        assert_eq!(unit[0], Cell::Number(2.0 / 1.5));
        assert_eq!(unit[1], Cell::Empty);
        assert_eq!(unit[2], Cell::Empty);
    }

    #[test]
    fn formula_with_missing_column() {
        let (dir, file) = fixture();
        let err = run(
            &AddColumnFromFormula,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "new_column_name": "X", "col1": "Qty", "operator": "+", "col2": "Tax" }),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::ColumnNotFound(c) if c == "Tax"));
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[test]
    fn delete_reports_only_existing_columns() {
        let (dir, file) = fixture();
        let out = run(
            &DeleteColumns,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "columns_to_delete": ["Price", "Ghost"] }),
        )
        .unwrap();
        assert_eq!(out["deleted_columns"], json!(["Price"]));
        assert_eq!(output(&dir).headers, vec!["Item", "Qty"]);

        let err = run(
            &DeleteColumns,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "columns_to_delete": ["Ghost"] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("None of the specified columns"));
    }

    #[test]
    fn rename_keeps_position() {
        let (dir, file) = fixture();
        let out = run(
            &RenameColumn,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "old_column_name": "Qty", "new_column_name": "Quantity" }),
        )
        .unwrap();
        assert_eq!(out["renamed_from"], "Qty");
        assert_eq!(out["renamed_to"], "Quantity");
        assert_eq!(output(&dir).headers, vec!["Item", "Quantity", "Price"]);
    }

    #[test]
    fn fill_numeric_column_coerces_value() {
        let (dir, file) = fixture();
        let out = run(
            &FillMissingValues,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "column_name": "Qty", "fill_value": "0" }),
        )
        .unwrap();
        assert_eq!(out["filled_column"], "Qty");
        assert_eq!(output(&dir).rows[2][1], Cell::Number(0.0));

        let err = run(
            &FillMissingValues,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "column_name": "Qty", "fill_value": "none" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cannot convert fill_value 'none'"));
    }

    #[test]
    fn string_operations() {
        let (dir, file) = fixture();
        run(
            &StringManipulationInColumn,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "column_name": "Item", "operation": "trim" }),
        )
        .unwrap();
        assert_eq!(output(&dir).rows[0][0], Cell::Text("apple".into()));

        let out = run(
            &StringManipulationInColumn,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "column_name": "Item", "operation": "uppercase" }),
        )
        .unwrap();
        assert_eq!(out["operation"], "uppercase");
        assert_eq!(output(&dir).rows[1][0], Cell::Text("PEAR".into()));

        let err = run(
            &StringManipulationInColumn,
            &dir,
            &file,
            json!({ "output_filename": "out.xlsx", "column_name": "Item", "operation": "reverse" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid string operation 'reverse'"));
    }

    #[test]
    fn conditional_column_labels_rows() {
        let (dir, file) = fixture();
        let out = run(
            &ConditionalValueColumn,
            &dir,
            &file,
            json!({
                "output_filename": "out.xlsx",
                "new_column_name": "Bulk",
                "source_column": "Qty",
                "operator": ">=",
                "value": "3",
                "true_value": "yes",
                "false_value": "no"
            }),
        )
        .unwrap();
        assert_eq!(out["rows_written"], 3);
        let bulk: Vec<Cell> = output(&dir).column(3).cloned().collect();
        assert_eq!(
            bulk,
            vec![Cell::Text("no".into()), Cell::Text("yes".into()), Cell::Text("no".into())]
        );
    }
}
