//! SVG charts rendered with `plotters`.

use std::fmt::Display;
use std::path::Path;

use plotters::prelude::{
    ChartBuilder, Circle, Color, IntoDrawingArea, IntoFont, LineSeries, Rectangle, SVGBackend,
    BLUE, WHITE,
};
use serde_json::{json, Value};

use super::workbook::{load_table, safe_output_path, Table};
use super::{sheet_param, ParamSpec, Tool, ToolArgs, ToolError, ToolSpec};

const CHART_TYPES: &[&str] = &["bar", "line", "scatter"];
const CHART_SIZE: (u32, u32) = (1000, 600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartKind {
    Bar,
    Line,
    Scatter,
}

impl ChartKind {
    fn parse(name: &str) -> Result<Self, ToolError> {
        match name {
            "bar" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            "scatter" => Ok(Self::Scatter),
            other => Err(ToolError::invalid(
                "chart_type",
                format!("Unsupported chart type '{}'.", other),
            )),
        }
    }
}

/// Points to plot. Non-numeric x values are plotted at their position and
/// labelled with the original text.
struct Series {
    points: Vec<(f64, f64)>,
    categories: Option<Vec<String>>,
}

impl Series {
    fn from_table(table: &Table, x: usize, y: usize) -> Result<Self, ToolError> {
        let numeric_x = table.is_numeric_column(x);
        let mut points = Vec::new();
        let mut categories = Vec::new();
        for row in &table.rows {
            let Some(y_value) = row[y].as_f64() else {
                continue;
            };
            if numeric_x {
                if let Some(x_value) = row[x].as_f64() {
                    points.push((x_value, y_value));
                }
            } else {
                points.push((categories.len() as f64, y_value));
                categories.push(row[x].to_string());
            }
        }
        if points.is_empty() {
            return Err(ToolError::Rejected(format!(
                "Column '{}' has no numeric values to plot.",
                table.headers[y]
            )));
        }
        Ok(Self {
            points,
            categories: (!numeric_x).then_some(categories),
        })
    }

    fn x_range(&self, kind: ChartKind) -> (f64, f64) {
        let (lo, hi) = bounds(self.points.iter().map(|p| p.0));
        match (&self.categories, kind) {
            (Some(_), _) | (None, ChartKind::Bar) => (lo - 0.5 * self.bar_width(), hi + 0.5 * self.bar_width()),
            _ => pad(lo, hi),
        }
    }

    fn y_range(&self, kind: ChartKind) -> (f64, f64) {
        let (lo, hi) = bounds(self.points.iter().map(|p| p.1));
        match kind {
            ChartKind::Bar => pad(lo.min(0.0), hi.max(0.0)),
            _ => pad(lo, hi),
        }
    }

    /// Bars fill most of the smallest gap between neighbouring x positions.
    fn bar_width(&self) -> f64 {
        if self.categories.is_some() {
            return 1.0;
        }
        let mut xs: Vec<f64> = self.points.iter().map(|p| p.0).collect();
        xs.sort_by(f64::total_cmp);
        xs.windows(2)
            .map(|w| w[1] - w[0])
            .filter(|gap| *gap > 0.0)
            .reduce(f64::min)
            .unwrap_or(1.0)
    }

    fn label(&self, x: f64) -> String {
        match &self.categories {
            None => format!("{}", x),
            Some(names) => {
                let index = x.round();
                if (x - index).abs() > 1e-6 || index < 0.0 {
                    return String::new();
                }
                names.get(index as usize).cloned().unwrap_or_default()
            }
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let margin = (hi - lo) * 0.05;
    (lo - margin, hi + margin)
}

fn chart_err(e: impl Display) -> ToolError {
    ToolError::Chart(e.to_string())
}

fn render(path: &Path, kind: ChartKind, series: &Series, x_name: &str, y_name: &str) -> Result<(), ToolError> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let (x_lo, x_hi) = series.x_range(kind);
    let (y_lo, y_hi) = series.y_range(kind);
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} by {}", y_name, x_name), ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(chart_err)?;

    let format_x = |x: &f64| series.label(*x);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(x_name).y_desc(y_name).x_label_formatter(&format_x);
    if let Some(categories) = &series.categories {
        mesh.x_labels(categories.len().max(2));
    }
    mesh.draw().map_err(chart_err)?;

    match kind {
        ChartKind::Bar => {
            let half = series.bar_width() * 0.4;
            chart
                .draw_series(series.points.iter().map(|&(x, y)| {
                    Rectangle::new([(x - half, 0.0), (x + half, y)], BLUE.filled())
                }))
                .map_err(chart_err)?;
        }
        ChartKind::Line => {
            chart
                .draw_series(LineSeries::new(series.points.iter().copied(), &BLUE))
                .map_err(chart_err)?;
        }
        ChartKind::Scatter => {
            chart
                .draw_series(
                    series
                        .points
                        .iter()
                        .map(|&point| Circle::new(point, 4, BLUE.filled())),
                )
                .map_err(chart_err)?;
        }
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

pub struct CreateChart;

impl Tool for CreateChart {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_chart",
            description: "Creates a chart from the data and saves it as an SVG image file.",
            params: vec![
                ParamSpec::string("chart_type", "The type of chart to create.")
                    .one_of(CHART_TYPES)
                    .required(),
                ParamSpec::string("x_column", "The column to use for the X-axis.").required(),
                ParamSpec::string("y_column", "The column to use for the Y-axis.").required(),
                ParamSpec::string(
                    "output_filename",
                    "Optional name for the output image file (e.g., 'sales_chart.svg'). A timestamped name is used if omitted.",
                ),
                sheet_param(),
            ],
        }
    }

    fn accepted_params(&self) -> &'static [&'static str] {
        &[
            "file_path",
            "chart_output_dir",
            "chart_type",
            "x_column",
            "y_column",
            "output_filename",
            "sheet_name",
        ]
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let filename = match args.opt_str("output_filename")? {
            Some(name) => Path::new(name).with_extension("svg").to_string_lossy().into_owned(),
            None => format!("chart_{}.svg", chrono::Utc::now().timestamp()),
        };
        let output = safe_output_path(args.str("chart_output_dir")?, &filename)?;
        let kind = ChartKind::parse(args.str("chart_type")?)?;

        let table = load_table(args.str("file_path")?, args.opt_str("sheet_name")?)?;
        let x_name = args.str("x_column")?;
        let y_name = args.str("y_column")?;
        let x = table.column_index(x_name)?;
        let y = table.column_index(y_name)?;
        let series = Series::from_table(&table, x, y)?;

        render(&output, kind, &series, x_name, y_name)?;
        tracing::debug!(path = %output.display(), points = series.points.len(), "Chart written");

        Ok(json!({ "success": true, "chart_path": output.display().to_string() }))
    }
}
