//! Row conditions shared by filtering and conditional columns.

use std::cmp::Ordering;

use super::workbook::{Cell, Table};
use super::ToolError;

pub(super) const OPERATORS: &[&str] = &["==", "!=", ">", "<", ">=", "<=", "contains"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
}

impl Comparison {
    pub(super) fn parse(operator: &str) -> Result<Self, ToolError> {
        Ok(match operator {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "contains" => Self::Contains,
            other => {
                return Err(ToolError::invalid(
                    "operator",
                    format!("Operator '{}' not handled.", other),
                ))
            }
        })
    }

    /// Incomparable values (empty cells, mixed kinds) only satisfy `!=`.
    pub(super) fn matches(self, cell: &Cell, value: &Cell) -> bool {
        let ordering = || cell.compare(value);
        match self {
            Self::Contains => !cell.is_empty() && cell.to_string().contains(&value.to_string()),
            Self::Eq => ordering().is_some_and(Ordering::is_eq),
            Self::Ne => !ordering().is_some_and(Ordering::is_eq),
            Self::Gt => ordering().is_some_and(Ordering::is_gt),
            Self::Lt => ordering().is_some_and(Ordering::is_lt),
            Self::Ge => ordering().is_some_and(Ordering::is_ge),
            Self::Le => ordering().is_some_and(Ordering::is_le),
        }
    }
}

/// Numeric columns compare against a number when the value parses as one;
/// date columns against a timestamp when the value reads as a date.
pub(super) fn coerce_for_column(table: &Table, column: usize, value: Cell) -> Cell {
    if table.is_numeric_column(column) {
        if let Some(n) = value.as_f64() {
            return Cell::Number(n);
        }
    } else if table.is_datetime_column(column) {
        if let Cell::Text(text) = &value {
            if let Some(dt) = Cell::parse_datetime(text) {
                return Cell::DateTime(dt);
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparisons() {
        let five = Cell::Number(5.0);
        assert!(Comparison::parse(">").unwrap().matches(&Cell::Number(6.0), &five));
        assert!(Comparison::parse("<=").unwrap().matches(&five, &five));
        assert!(!Comparison::parse("==").unwrap().matches(&Cell::Empty, &five));
        assert!(Comparison::parse("!=").unwrap().matches(&Cell::Empty, &five));
    }

    #[test]
    fn contains_uses_text_form() {
        let op = Comparison::parse("contains").unwrap();
        assert!(op.matches(&Cell::Text("North-East".into()), &Cell::Text("East".into())));
        assert!(op.matches(&Cell::Number(120.0), &Cell::Text("12".into())));
        assert!(!op.matches(&Cell::Empty, &Cell::Text("".into())));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = Comparison::parse("~=").unwrap_err();
        assert!(err.to_string().contains("Operator '~=' not handled."));
    }

    #[test]
    fn values_are_coerced_for_numeric_columns() {
        let table = Table::new(
            vec!["N".into(), "S".into()],
            vec![vec![Cell::Number(1.0), Cell::Text("a".into())]],
        );
        assert_eq!(coerce_for_column(&table, 0, Cell::Text("3".into())), Cell::Number(3.0));
        assert_eq!(
            coerce_for_column(&table, 1, Cell::Text("3".into())),
            Cell::Text("3".into())
        );
    }

    #[test]
    fn date_columns_compare_against_date_text() {
        let day = |d: u32| {
            Cell::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 3, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        };
        let table = Table::new(vec!["When".into()], vec![vec![day(1)], vec![day(20)]]);
        let cutoff = coerce_for_column(&table, 0, Cell::Text("2024-03-10".into()));
        assert_eq!(cutoff, day(10));

        let op = Comparison::parse(">").unwrap();
        assert!(op.matches(&day(20), &cutoff));
        assert!(!op.matches(&day(1), &cutoff));
    }
}
