// src/render.rs
//
// Plot model for a pair of axes over the sample store, and its egui_plot drawing.

use crate::store::SampleStore;
use eframe::egui::{self, Color32};
use egui_plot::{Line, MarkerShape, Plot, PlotBounds, PlotPoints, Points};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    ReadingNumber,
    Time,
    Voltage,
    Current,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::ReadingNumber, Axis::Time, Axis::Voltage, Axis::Current];

    pub fn name(self) -> &'static str {
        match self {
            Axis::ReadingNumber => "Reading Number",
            Axis::Time => "Time",
            Axis::Voltage => "Voltage",
            Axis::Current => "Current",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::ReadingNumber => "Reading Number",
            Axis::Time => "Time (s)",
            Axis::Voltage => "Voltage (V)",
            Axis::Current => "Current (A)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlotView {
    /// Labelled axes, no series.
    NoData {
        title: &'static str,
        x_label: &'static str,
        y_label: &'static str,
    },
    Series {
        title: String,
        x_label: &'static str,
        y_label: &'static str,
        points: Vec<[f64; 2]>,
        x_range: Range,
        y_range: Range,
    },
}

pub fn plot_view(store: &SampleStore, x: Axis, y: Axis) -> PlotView {
    build(&store.series(x), &store.series(y), x, y)
}

/// Pair up two series, dropping any pair with a missing side.
pub fn build(xs: &[Option<f64>], ys: &[Option<f64>], x: Axis, y: Axis) -> PlotView {
    if xs.is_empty() || ys.is_empty() {
        return PlotView::NoData {
            title: "Experiment Results (No data available)",
            x_label: x.label(),
            y_label: y.label(),
        };
    }

    let points: Vec<[f64; 2]> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(&px, &py)| match (px, py) {
            (Some(px), Some(py)) if !px.is_nan() && !py.is_nan() => Some([px, py]),
            _ => None,
        })
        .collect();

    let (Some(x_range), Some(y_range)) = (
        padded_range(points.iter().map(|p| p[0])),
        padded_range(points.iter().map(|p| p[1])),
    ) else {
        return PlotView::NoData {
            title: "Experiment Results (No valid data received)",
            x_label: x.label(),
            y_label: y.label(),
        };
    };

    PlotView::Series {
        title: format!("{} vs {}", y.name(), x.name()),
        x_label: x.label(),
        y_label: y.label(),
        points,
        x_range,
        y_range,
    }
}

/// min/max widened by 5 % of the span, or by 0.1 when the span is zero.
fn padded_range(values: impl Iterator<Item = f64>) -> Option<Range> {
    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    let margin = if max != min { (max - min) * 0.05 } else { 0.1 };
    Some(Range {
        min: min - margin,
        max: max + margin,
    })
}

impl PlotView {
    pub fn title(&self) -> &str {
        match self {
            PlotView::NoData { title, .. } => title,
            PlotView::Series { title, .. } => title,
        }
    }

    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            PlotView::NoData { .. } => &[],
            PlotView::Series { points, .. } => points,
        }
    }
}

// ----------------- drawing -----------------

const SERIES_COLOR: Color32 = Color32::from_rgb(0, 255, 255);

pub fn show(ui: &mut egui::Ui, view: &PlotView) {
    let (x_label, y_label) = match view {
        PlotView::NoData {
            x_label, y_label, ..
        }
        | PlotView::Series {
            x_label, y_label, ..
        } => (*x_label, *y_label),
    };

    let title_color = match view {
        PlotView::NoData { .. } => Color32::from_rgb(220, 60, 60),
        PlotView::Series { .. } => Color32::WHITE,
    };
    ui.vertical_centered(|ui| {
        ui.label(egui::RichText::new(view.title()).strong().color(title_color));
    });

    Plot::new("results_plot")
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            if let PlotView::Series {
                x_range, y_range, ..
            } = view
            {
                let points = view.points();
                let line: PlotPoints = points.iter().copied().collect();
                plot_ui.line(Line::new(view.title(), line).color(SERIES_COLOR).width(2.0));

                let markers: PlotPoints = points.iter().copied().collect();
                plot_ui.points(
                    Points::new("Samples", markers)
                        .shape(MarkerShape::Circle)
                        .radius(4.0)
                        .filled(true)
                        .color(Color32::WHITE),
                );

                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [x_range.min, y_range.min],
                    [x_range.max, y_range.max],
                ));
            }
        });
}
