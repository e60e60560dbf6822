use crate::common::{DevMode, FaceLensError, Result};
use crate::core::runner::ChartRenderer;
use crate::service::protocol::SkinMetrics;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

pub const AXIS_MIN: f64 = 0.0;
pub const AXIS_MAX: f64 = 100.0;
pub const AXIS_STEP: f64 = 20.0;
pub const DEFAULT_SIZE: (u32, u32) = (480, 480);

const SERIES_COLOR: RGBColor = RGBColor(0, 84, 255);
const GRID_COLOR: RGBColor = RGBColor(200, 200, 200);
const TICK_COLOR: RGBColor = RGBColor(110, 110, 110);

/// Radar chart of the `[label, score]` metrics. One axis per metric, fixed
/// 0..100 scale, no legend.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarChart {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl RadarChart {
    pub fn from_metrics(metrics: &SkinMetrics) -> Self {
        let (labels, values) = metrics
            .rows()
            .map(|row| (row.key.replace('_', " "), row.score))
            .unzip();
        Self { labels, values }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn ticks() -> Vec<f64> {
        let steps = ((AXIS_MAX - AXIS_MIN) / AXIS_STEP).round() as usize;
        (1..=steps).map(|i| AXIS_MIN + AXIS_STEP * i as f64).collect()
    }

    fn angle(&self, axis: usize) -> f64 {
        -PI / 2.0 + 2.0 * PI * axis as f64 / self.labels.len().max(1) as f64
    }

    /// Pixel position of `value` on `axis`. Values outside the scale are
    /// pinned to its edge.
    pub fn vertex(&self, axis: usize, value: f64, center: (i32, i32), radius: f64) -> (i32, i32) {
        let scaled = ((value - AXIS_MIN) / (AXIS_MAX - AXIS_MIN)).clamp(0.0, 1.0) * radius;
        let angle = self.angle(axis);
        (
            center.0 + (scaled * angle.cos()).round() as i32,
            center.1 + (scaled * angle.sin()).round() as i32,
        )
    }

    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()> {
        let chart_err = |e: DrawingAreaErrorKind<DB::ErrorType>| FaceLensError::Chart(e.to_string());

        let (width, height) = root.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = (width.min(height) as f64 / 2.0) * 0.7;
        let axes = self.labels.len();

        root.fill(&WHITE).map_err(chart_err)?;

        // Grid rings
        for tick in Self::ticks() {
            if axes >= 3 {
                let mut ring: Vec<_> = (0..axes).map(|i| self.vertex(i, tick, center, radius)).collect();
                ring.push(ring[0]);
                root.draw(&PathElement::new(ring, GRID_COLOR.stroke_width(1))).map_err(chart_err)?;
            } else {
                let r = ((tick - AXIS_MIN) / (AXIS_MAX - AXIS_MIN) * radius).round() as u32;
                root.draw(&Circle::new(center, r, GRID_COLOR.stroke_width(1))).map_err(chart_err)?;
            }
        }

        // Spokes and point labels
        let label_style = TextStyle::from(("sans-serif", 13).into_font())
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        for (i, label) in self.labels.iter().enumerate() {
            let tip = self.vertex(i, AXIS_MAX, center, radius);
            root.draw(&PathElement::new(vec![center, tip], GRID_COLOR.stroke_width(1))).map_err(chart_err)?;

            let angle = self.angle(i);
            let at = (
                center.0 + ((radius + 22.0) * angle.cos()).round() as i32,
                center.1 + ((radius + 22.0) * angle.sin()).round() as i32,
            );
            root.draw(&Text::new(label.clone(), at, label_style.clone())).map_err(chart_err)?;
        }

        // Tick labels up the vertical axis
        let tick_style = TextStyle::from(("sans-serif", 10).into_font())
            .color(&TICK_COLOR)
            .pos(Pos::new(HPos::Left, VPos::Center));
        for tick in Self::ticks() {
            let y = center.1 - ((tick - AXIS_MIN) / (AXIS_MAX - AXIS_MIN) * radius).round() as i32;
            root.draw(&Text::new(format!("{}", tick), (center.0 + 4, y), tick_style.clone()))
                .map_err(chart_err)?;
        }

        if axes == 0 {
            return root.present().map_err(chart_err);
        }

        // Dataset
        let points: Vec<_> = self.values
            .iter()
            .enumerate()
            .map(|(i, v)| self.vertex(i, *v, center, radius))
            .collect();

        root.draw(&Polygon::new(points.clone(), SERIES_COLOR.mix(0.2).filled())).map_err(chart_err)?;
        let mut outline = points.clone();
        outline.push(points[0]);
        root.draw(&PathElement::new(outline, SERIES_COLOR.stroke_width(2))).map_err(chart_err)?;

        for point in &points {
            root.draw(&Circle::new(*point, 4, WHITE.filled())).map_err(chart_err)?;
            root.draw(&Circle::new(*point, 3, SERIES_COLOR.filled())).map_err(chart_err)?;
        }

        root.present().map_err(chart_err)
    }

    /// Builds a fresh chart file, replacing any previous one.
    pub fn render_svg(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }

        let root = SVGBackend::new(path, size).into_drawing_area();
        self.draw(&root)
    }

    pub fn render_svg_string(&self, size: (u32, u32)) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
            self.draw(&root)?;
        }
        Ok(svg)
    }
}

/// Writes the radar chart to the configured SVG file (a new timestamped file
/// per render in dev mode).
pub struct SvgChartWriter {
    path: PathBuf,
    dev_mode: DevMode,
    size: (u32, u32),
}

impl SvgChartWriter {
    pub fn new(path: PathBuf, dev_mode: DevMode) -> Self {
        Self { path, dev_mode, size: DEFAULT_SIZE }
    }
}

impl ChartRenderer for SvgChartWriter {
    fn render(&mut self, metrics: &SkinMetrics) -> Result<PathBuf> {
        let path = self.dev_mode.chart_path(&self.path);
        RadarChart::from_metrics(metrics).render_svg(&path, self.size)?;
        tracing::info!("Radar chart written to {}", path.display());
        Ok(path)
    }
}
