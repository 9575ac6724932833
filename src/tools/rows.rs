//! Row-level write tools: filtering, sorting and de-duplication.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{json, Value};

use super::condition::{coerce_for_column, Comparison, OPERATORS};
use super::workbook::{load_table, safe_output_path, save_table, Cell, Table};
use super::{output_param, sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

pub struct FilterRows;

impl Tool for FilterRows {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "filter_rows",
            description: "Filters rows based on a condition and saves the result to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'filtered_data.xlsx')."),
                ParamSpec::string("column_name", "The column to filter on.").required(),
                ParamSpec::string("operator", "The comparison operator.")
                    .one_of(OPERATORS)
                    .required(),
                ParamSpec::string(
                    "value",
                    "The value to compare against. For numeric comparisons, provide a number as a string.",
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
            "operator",
            "value",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column = table.column_index(args.str("column_name")?)?;
        let comparison = Comparison::parse(args.str("operator")?)?;
        let value = coerce_for_column(&table, column, args.cell("value")?);

        let rows: Vec<Vec<Cell>> = table
            .rows
            .iter()
            .filter(|row| comparison.matches(&row[column], &value))
            .cloned()
            .collect();
        let rows_written = rows.len();
        save_table(&Table::new(table.headers.clone(), rows), &output)?;

        Ok(json!({
            "success": true,
            "output_file": output.display().to_string(),
            "rows_written": rows_written,
        }))
    }
}

pub struct SortData;

impl Tool for SortData {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "sort_data",
            description: "Sorts the data by a specific column and saves to a new file.",
            params: vec![
                output_param("The name for the new output Excel file (e.g., 'sorted_data.xlsx')."),
                ParamSpec::string("sort_by_column", "The column to sort the data by.").required(),
                ParamSpec::boolean(
                    "ascending",
                    "Whether to sort in ascending (true) or descending (false) order. Defaults to true.",
                ),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "file_output_dir",
            "output_filename",
            "sort_by_column",
            "ascending",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let output = safe_output_path(args.str("file_output_dir")?, args.str("output_filename")?)?;
        let mut table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let column = table.column_index(args.str("sort_by_column")?)?;
        let ascending = args.bool_or("ascending", true)?;

        table
            .rows
            .sort_by(|a, b| sort_order(&a[column], &b[column], ascending));
        save_table(&table, &output)?;

        Ok(json!({ "success": true, "output_file": output.display().to_string() }))
    }
}

/// Empty cells always sort last; otherwise numbers, then dates, then
/// booleans, then text.
pub(super) fn sort_order(a: &Cell, b: &Cell, ascending: bool) -> Ordering {
    fn rank(cell: &Cell) -> u8 {
        match cell {
            Cell::Number(_) => 0,
            Cell::DateTime(_) => 1,
            Cell::Bool(_) => 2,
            Cell::Text(_) => 3,
            Cell::Empty => 4,
        }
    }
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let ordering = rank(a)
        .cmp(&rank(b))
        .then_with(|| a.compare(b).unwrap_or(Ordering::Equal));
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

const DUPLICATE_ACTIONS: &[&str] = &["find", "remove"];

pub struct HandleDuplicates;

impl Tool for HandleDuplicates {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "handle_duplicates",
            description: "Finds or removes duplicate rows based on specified columns.",
            params: vec![
                ParamSpec::string(
                    "output_filename",
                    "The name for the new output Excel file (e.g., 'data_no_duplicates.xlsx'). Required only for 'remove' action.",
                ),
                ParamSpec::list(
                    "subset_columns",
                    "A list of column names to check for duplicates. If empty, all columns are used.",
                ),
                ParamSpec::string(
                    "action",
                    "The action to perform: 'find' to report duplicates, 'remove' to delete them.",
                )
                .one_of(DUPLICATE_ACTIONS)
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
            "subset_columns",
            "action",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let action = args.str("action")?;
        if !DUPLICATE_ACTIONS.contains(&action) {
            return Err(ToolError::invalid(
                "action",
                format!("Invalid action '{}'. Must be 'find' or 'remove'.", action),
            ));
        }
        let output = match action {
            "remove" => Some(safe_output_path(
                args.str("file_output_dir")?,
                args.str("output_filename")?,
            )?),
            _ => None,
        };

        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let columns: Vec<usize> = match args.opt_str_list("subset_columns")? {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| table.column_index(name))
                .collect::<Result<_, _>>()?,
            _ => (0..table.headers.len()).collect(),
        };
        let row_key = |row: &[Cell]| -> Vec<String> { columns.iter().map(|&c| row[c].key()).collect() };

        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        for row in &table.rows {
            *counts.entry(row_key(row)).or_default() += 1;
        }

        match output {
            None => {
                let duplicates: Vec<Value> = table
                    .rows
                    .iter()
                    .filter(|row| counts[&row_key(row)] > 1)
                    .map(|row| table.row_json(row))
                    .collect();
                Ok(json!({
                    "success": true,
                    "action": "find",
                    "duplicates_found": duplicates.len(),
                    "duplicate_rows": duplicates,
                }))
            }
            Some(output) => {
                let mut seen = std::collections::HashSet::new();
                let kept: Vec<Vec<Cell>> = table
                    .rows
                    .iter()
                    .filter(|row| seen.insert(row_key(row)))
                    .cloned()
                    .collect();
                let removed = table.rows.len() - kept.len();
                save_table(&Table::new(table.headers.clone(), kept), &output)?;
                Ok(json!({
                    "success": true,
                    "action": "remove",
                    "output_file": output.display().to_string(),
                    "duplicates_removed": removed,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::workbook::{Sheet, Workbook};
    use serde_json::Map;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        file: String,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("people.xlsx");
            let t = |s: &str| Cell::Text(s.to_string());
            let table = Table::new(
                vec!["Name".into(), "City".into(), "Age".into()],
                vec![
                    vec![t("Ann"), t("Oslo"), Cell::Number(31.0)],
                    vec![t("Bob"), t("Rome"), Cell::Number(25.0)],
                    vec![t("Cid"), t("Oslo"), Cell::Empty],
                    vec![t("Ann"), t("Oslo"), Cell::Number(31.0)],
                ],
            );
            Workbook {
                sheets: vec![Sheet::new("People", table)],
            }
            .save(&path)
            .unwrap();
            let file = path.to_string_lossy().into_owned();
            Self { dir, file }
        }

        fn args(&self, extra: Value) -> ToolArgs {
            let mut map = Map::new();
            map.insert("file_path".into(), json!(self.file));
            map.insert("file_output_dir".into(), json!(self.dir.path().to_string_lossy()));
            if let Value::Object(extra) = extra {
                map.extend(extra);
            }
            ToolArgs::new(map)
        }

        fn read(&self, name: &str) -> Table {
            load_table(&self.dir.path().join(name).to_string_lossy(), None).unwrap()
        }
    }

    #[test]
    fn filter_coerces_numeric_value() {
        let fx = Fixture::new();
        let out = FilterRows
            .run(&fx.args(json!({
                "output_filename": "older.xlsx",
                "column_name": "Age",
                "operator": ">",
                "value": "30"
            })))
            .unwrap();
        assert_eq!(out["rows_written"], 2);
        let table = fx.read("older.xlsx");
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r[0] == Cell::Text("Ann".into())));
    }

    #[test]
    fn filter_contains_on_text() {
        let fx = Fixture::new();
        let out = FilterRows
            .run(&fx.args(json!({
                "output_filename": "o.xlsx",
                "column_name": "City",
                "operator": "contains",
                "value": "Ro"
            })))
            .unwrap();
        assert_eq!(out["rows_written"], 1);
    }

    #[test]
    fn filter_rejects_traversal_before_writing() {
        let fx = Fixture::new();
        let err = FilterRows
            .run(&fx.args(json!({
                "output_filename": "../evil.xlsx",
                "column_name": "Age",
                "operator": ">",
                "value": "1"
            })))
            .unwrap_err();
        assert!(matches!(err, ToolError::UnsafePath(_)));
        assert!(!fx.dir.path().parent().unwrap().join("evil.xlsx").exists());
    }

    #[test]
    fn sort_descending_keeps_empty_last() {
        let fx = Fixture::new();
        SortData
            .run(&fx.args(json!({
                "output_filename": "sorted.xlsx",
                "sort_by_column": "Age",
                "ascending": false
            })))
            .unwrap();
        let ages: Vec<Cell> = fx.read("sorted.xlsx").rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(
            ages,
            vec![Cell::Number(31.0), Cell::Number(31.0), Cell::Number(25.0), Cell::Empty]
        );
    }

    #[test]
    fn date_columns_filter_and_sort_as_dates() {
        let fx = Fixture::new();
        let day = |d: u32| {
            Cell::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 3, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        };
        let table = Table::new(
            vec!["Joined".into()],
            vec![vec![day(20)], vec![day(2)], vec![day(11)]],
        );
        Workbook {
            sheets: vec![Sheet::new("People", table)],
        }
        .save(&fx.file)
        .unwrap();

        FilterRows
            .run(&fx.args(json!({
                "output_filename": "recent.xlsx",
                "column_name": "Joined",
                "operator": ">=",
                "value": "2024-03-10"
            })))
            .unwrap();
        SortData
            .run(&fx.args(json!({ "output_filename": "sorted.xlsx", "sort_by_column": "Joined" })))
            .unwrap();

        assert_eq!(fx.read("recent.xlsx").rows, vec![vec![day(20)], vec![day(11)]]);
        assert_eq!(
            fx.read("sorted.xlsx").rows,
            vec![vec![day(2)], vec![day(11)], vec![day(20)]]
        );
    }

    #[test]
    fn find_duplicates_reports_all_copies() {
        let fx = Fixture::new();
        let out = HandleDuplicates
            .run(&fx.args(json!({ "action": "find" })))
            .unwrap();
        assert_eq!(out["duplicates_found"], 2);
        assert_eq!(out["duplicate_rows"][0]["Name"], "Ann");
        assert!(out.get("output_file").is_none());
    }

    #[test]
    fn remove_duplicates_on_subset() {
        let fx = Fixture::new();
        let out = HandleDuplicates
            .run(&fx.args(json!({
                "action": "remove",
                "subset_columns": ["City"],
                "output_filename": "dedup.xlsx"
            })))
            .unwrap();
        assert_eq!(out["duplicates_removed"], 2);
        assert!(Path::new(out["output_file"].as_str().unwrap()).exists());
        assert_eq!(fx.read("dedup.xlsx").rows.len(), 2);
    }

    #[test]
    fn invalid_duplicate_action() {
        let fx = Fixture::new();
        let err = HandleDuplicates
            .run(&fx.args(json!({ "action": "merge" })))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid action 'merge'"));
    }
}
