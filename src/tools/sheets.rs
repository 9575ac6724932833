//! Workbook-level tools. These rewrite every sheet of the workbook, not just one table.

use serde_json::{json, Value};

use super::workbook::{safe_output_path, Highlight, HighlightRule, Sheet, Table, Workbook};
use super::{output_param, sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

fn sheet_exists(name: &str) -> ToolError {
    ToolError::Rejected(format!("A sheet named '{}' already exists.", name))
}

pub struct CreateSheet;

impl Tool for CreateSheet {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_sheet",
            description: "Creates a new, empty sheet with a specified name in the workbook.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'workbook_new_sheet.xlsx')."),
                ParamSpec::string("new_sheet_name", "The name for the new sheet to be created.").required(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "file_output_dir", "output_filename", "new_sheet_name"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut workbook = Workbook::open(args.str("file_path")?)?;
        let name = args.str("new_sheet_name")?;
        if workbook.contains(name) {
            return Err(sheet_exists(name));
        }

        workbook.sheets.push(Sheet::new(name, Table::default()));
        workbook.save(&output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "created_sheet_name": name,
        }))
    }
}

pub struct DeleteSheet;

impl Tool for DeleteSheet {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_sheet",
            description: "Deletes a specific sheet from the workbook.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'workbook_deleted_sheet.xlsx')."),
                ParamSpec::string("sheet_to_delete", "The name of the sheet to be deleted.").required(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &["file_path", "file_output_dir", "output_filename", "sheet_to_delete"]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut workbook = Workbook::open(args.str("file_path")?)?;
        let name = args.str("sheet_to_delete")?;
        // Resolve first so a missing sheet reports the available names.
        workbook.sheet(Some(name))?;
        if workbook.sheets.len() <= 1 {
            return Err(ToolError::Rejected(
                "Cannot delete the only sheet in the workbook.".to_string(),
            ));
        }

        workbook.sheets.retain(|s| s.name != name);
        workbook.save(&output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "deleted_sheet_name": name,
        }))
    }
}

pub struct DuplicateSheet;

impl Tool for DuplicateSheet {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "duplicate_sheet",
            description: "Duplicates an existing sheet and saves the workbook with the new sheet.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'workbook_duplicated.xlsx')."),
                ParamSpec::string("source_sheet", "The name of the existing sheet to duplicate.").required(),
                ParamSpec::string("new_sheet_name", "The name for the newly created duplicate sheet.")
                    .required(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "source_sheet",
            "new_sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut workbook = Workbook::open(args.str("file_path")?)?;
        let source = args.str("source_sheet")?;
        let name = args.str("new_sheet_name")?;

        let mut copy = workbook.sheet(Some(source))?.clone();
        if workbook.contains(name) {
            return Err(sheet_exists(name));
        }
        copy.name = name.to_string();
        workbook.sheets.push(copy);
        workbook.save(&output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "duplicated_from": source,
            "duplicated_to": name,
        }))
    }
}

const FORMAT_OPERATORS: &[&str] = &["greaterThan", "lessThan", "equal", "notEqual"];
const FORMAT_COLORS: &[&str] = &["red", "green", "yellow"];

fn highlight_rule(operator: &str, value: f64) -> Result<HighlightRule, ToolError> {
    Ok(match operator {
        "greaterThan" => HighlightRule::GreaterThan(value),
        "lessThan" => HighlightRule::LessThan(value),
        "equal" => HighlightRule::EqualTo(value),
        "notEqual" => HighlightRule::NotEqualTo(value),
        other => {
            return Err(ToolError::invalid(
                "operator",
                format!("Operator '{}' is not supported.", other),
            ))
        }
    })
}

fn fill_color(color: &str) -> Result<u32, ToolError> {
    match color {
        "red" => Ok(0xFF0000),
        "green" => Ok(0x00FF00),
        "yellow" => Ok(0xFFFF00),
        other => Err(ToolError::invalid(
            "color",
            format!("Color '{}' is not supported. Use red, green, or yellow.", other),
        )),
    }
}

/// Cell-value highlight on one column's data cells.
pub struct ApplyConditionalFormatting;

impl Tool for ApplyConditionalFormatting {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "apply_conditional_formatting",
            description: "Applies conditional formatting to a column based on a cell value condition.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'formatted_data.xlsx')."),
                ParamSpec::string("column_name", "The name of the column to apply the formatting to.")
                    .required(),
                ParamSpec::string("operator", "The comparison operator for the rule.")
                    .one_of(FORMAT_OPERATORS)
                    .required(),
                ParamSpec::string("value", "The number to compare against.").required(),
                ParamSpec::string("color", "The color to apply if the rule is met.")
                    .one_of(FORMAT_COLORS)
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
            "operator",
            "value",
            "color",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let value = args.cell("value")?;
        let number = value
            .as_f64()
            .ok_or_else(|| ToolError::invalid("value", format!("'{}' is not a number.", value)))?;
        let rule = highlight_rule(args.str("operator")?, number)?;
        let color = fill_color(args.str("color")?)?;

        let mut workbook = Workbook::open(args.str("file_path")?)?;
        let column_name = args.str("column_name")?;
        let sheet = workbook.sheet_mut(args.opt_str("sheet_name")?)?;
        let column = sheet.table.column_index(column_name)?;
        sheet.highlights.push(Highlight { column, rule, color });
        workbook.save(&output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "formatted_column": column_name,
        }))
    }
}
