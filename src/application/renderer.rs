// Renderer - turns render payloads into pixel geometry and answers pointer queries
use crate::domain::guide;
use crate::domain::layers::Layer;
use crate::domain::payload::RenderPayload;
use crate::domain::placement::{self, PlotGeometry, Rect, TooltipRequest};
use crate::domain::scale::{LinearScale, Tick, YScale};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a guide dot goes when its point has no value.
const OFF_PLOT: f64 = -20.0;

/// Width of the stub drawn for an isolated point so it stays visible.
const ISOLATED_POINT_STUB: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartSize {
    pub width: f64,
    pub height: f64,
}

/// Layout settings that come from configuration rather than from the request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub container_top: f64,
    #[serde(default = "default_char_width")]
    pub tooltip_char_width: f64,
    #[serde(default = "default_tooltip_padding")]
    pub tooltip_padding: f64,
    #[serde(default = "default_tooltip_height")]
    pub tooltip_height: f64,
}

fn default_char_width() -> f64 {
    7.0
}

fn default_tooltip_padding() -> f64 {
    10.0
}

fn default_tooltip_height() -> f64 {
    20.0
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            container_top: 0.0,
            tooltip_char_width: default_char_width(),
            tooltip_padding: default_tooltip_padding(),
            tooltip_height: default_tooltip_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaPoint {
    pub x: f64,
    pub y0: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationMark {
    pub id: i64,
    pub label: String,
    pub description: String,
    pub line_x: f64,
    pub tooltip: Rect,
}

/// Draw instructions for one chart, in plot pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
    pub x_domain: [f64; 2],
    pub y_domain: [f64; 2],
    pub y_ticks: Vec<Tick>,
    /// Per layer, the continuous runs of `[x, y]` points.
    pub current_lines: Vec<Vec<Vec<[f64; 2]>>>,
    pub previous_lines: Vec<Vec<Vec<[f64; 2]>>>,
    pub areas: Vec<Vec<Vec<AreaPoint>>>,
    pub annotations: Vec<AnnotationMark>,
    pub has_data: bool,
    pub smoothed: bool,
    /// The last fetch cycle failed and this frame shows older data.
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideDot {
    pub layer: usize,
    pub historical: bool,
    pub x: f64,
    pub y: f64,
    /// Sample time in ms, on the layer's own axis.
    pub time: i64,
    pub value: String,
    pub label: String,
}

pub struct Renderer {
    settings: RenderSettings,
    size: ChartSize,
    last: Option<Arc<RenderPayload>>,
    current_axes: Vec<Vec<i64>>,
    previous_axes: Vec<Vec<i64>>,
    x_scale: LinearScale,
    y_scale: YScale,
    last_update: DateTime<Utc>,
    stale: bool,
}

impl Renderer {
    pub fn new(settings: RenderSettings, size: ChartSize) -> Self {
        Self {
            settings,
            size,
            last: None,
            current_axes: Vec::new(),
            previous_axes: Vec::new(),
            x_scale: LinearScale::new([0.0, 1.0], [0.0, size.width]),
            y_scale: YScale::Linear(LinearScale::new([0.0, 1.0], [size.height, 0.0])),
            last_update: Utc::now(),
            stale: false,
        }
    }

    pub fn payload(&self) -> Option<&Arc<RenderPayload>> {
        self.last.as_ref()
    }

    /// Sets the size used by the next redraw.
    pub fn set_size(&mut self, size: ChartSize) {
        self.size = size;
    }

    /// Changes the plot size; redraws the retained payload without refetching.
    pub fn resize(&mut self, size: ChartSize) -> Option<Frame> {
        self.size = size;
        let payload = self.last.clone()?;
        self.rescale(&payload);
        Some(self.frame(&payload))
    }

    /// Installs a fresh payload and draws it.
    pub fn redraw(&mut self, payload: Arc<RenderPayload>) -> Frame {
        self.redraw_at(payload, Utc::now())
    }

    fn redraw_at(&mut self, payload: Arc<RenderPayload>, now: DateTime<Utc>) -> Frame {
        self.last_update = now;
        self.stale = false;
        self.current_axes = payload.current_layers.iter().map(Layer::axis).collect();
        self.previous_axes = payload.previous_layers.iter().map(Layer::axis).collect();
        self.rescale(&payload);

        let frame = self.frame(&payload);
        self.last = Some(payload);
        frame
    }

    /// Marks the retained frame as outdated after a failed cycle.
    pub fn mark_failed(&mut self) -> Option<Frame> {
        self.stale = true;
        let payload = self.last.clone()?;
        Some(self.frame(&payload))
    }

    fn rescale(&mut self, payload: &RenderPayload) {
        self.x_scale = LinearScale::new(
            [payload.start as f64 * 1000.0, payload.end as f64 * 1000.0],
            [0.0, self.size.width],
        );
        self.y_scale = YScale::for_extent(payload.min, payload.max, &payload.options, self.size.height);
    }

    fn frame(&self, payload: &RenderPayload) -> Frame {
        let options = &payload.options;

        let current_lines = payload
            .current_layers
            .iter()
            .map(|layer| self.line_runs(layer))
            .collect();
        let previous_lines = if options.overlay_enabled() {
            payload
                .previous_layers
                .iter()
                .map(|layer| self.line_runs(layer))
                .collect()
        } else {
            Vec::new()
        };
        let areas = if options.area_graph {
            payload
                .current_layers
                .iter()
                .map(|layer| self.area_runs(layer))
                .collect()
        } else {
            Vec::new()
        };
        let annotations = if options.show_annotations {
            self.annotation_marks(payload)
        } else {
            Vec::new()
        };

        Frame {
            width: self.size.width,
            height: self.size.height,
            x_domain: self.x_scale.domain(),
            y_domain: self.y_scale.domain(),
            y_ticks: self.y_scale.ticks(self.size.height),
            current_lines,
            previous_lines,
            areas,
            annotations,
            has_data: payload.has_data(),
            smoothed: options.smooth,
            stale: self.stale,
        }
    }

    /// Splits a layer at null values; an isolated point becomes a short stub.
    fn line_runs(&self, layer: &Layer) -> Vec<Vec<[f64; 2]>> {
        let mut runs: Vec<Vec<[f64; 2]>> = Vec::new();
        let mut run: Vec<[f64; 2]> = Vec::new();

        for point in &layer.points {
            match point.y {
                Some(y) => run.push([
                    self.x_scale.map((point.x + layer.shift) as f64),
                    self.y_scale.map(y + point.y0),
                ]),
                None if !run.is_empty() => runs.push(std::mem::take(&mut run)),
                None => {}
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }

        for run in runs.iter_mut().filter(|r| r.len() == 1) {
            let [x, y] = run[0];
            run.push([x + ISOLATED_POINT_STUB, y]);
        }
        runs
    }

    fn area_runs(&self, layer: &Layer) -> Vec<Vec<AreaPoint>> {
        let mut runs = Vec::new();
        let mut run = Vec::new();
        for point in &layer.points {
            match point.y {
                Some(y) => run.push(AreaPoint {
                    x: self.x_scale.map((point.x + layer.shift) as f64),
                    y0: self.y_scale.map(point.y0),
                    y1: self.y_scale.map(y + point.y0),
                }),
                None if !run.is_empty() => runs.push(std::mem::take(&mut run)),
                None => {}
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }
        runs
    }

    fn annotation_marks(&self, payload: &RenderPayload) -> Vec<AnnotationMark> {
        let short = payload.options.short_annotations;
        let requests: Vec<TooltipRequest> = payload
            .annotations
            .iter()
            .map(|annotation| TooltipRequest {
                id: annotation.id,
                line_x: self.x_scale.map(annotation.time as f64).floor(),
                width: self.tooltip_width(&annotation.label(short)),
                height: self.settings.tooltip_height,
            })
            .collect();

        let plot = PlotGeometry {
            width: self.size.width,
            height: self.size.height,
            container_top: self.settings.container_top,
            x_scale: &self.x_scale,
            y_scale: &self.y_scale,
            layers: payload.visible_layers(),
        };
        let placements = placement::place_all(&requests, &plot);

        payload
            .annotations
            .iter()
            .zip(&requests)
            .filter_map(|(annotation, request)| {
                let placed = placements.iter().find(|p| p.id == annotation.id)?;
                Some(AnnotationMark {
                    id: annotation.id,
                    label: annotation.label(short),
                    description: annotation.description.clone(),
                    line_x: request.line_x,
                    tooltip: placed.rect,
                })
            })
            .collect()
    }

    fn tooltip_width(&self, label: &str) -> f64 {
        label.chars().count() as f64 * self.settings.tooltip_char_width + self.settings.tooltip_padding
    }

    /// Nearest sample of every layer to the pointer at plot x `pointer_x`. With an overlay,
    /// current and previous dots alternate per source.
    pub fn guide(&self, pointer_x: f64) -> Vec<GuideDot> {
        let Some(payload) = &self.last else {
            return Vec::new();
        };
        let time = self.x_scale.invert(pointer_x);

        let current = self.guide_dots(&payload.current_layers, &self.current_axes, time, false);
        if !payload.options.overlay_enabled() {
            return current;
        }
        let previous = self.guide_dots(&payload.previous_layers, &self.previous_axes, time, true);

        let mut dots = Vec::with_capacity(current.len() + previous.len());
        for layer in 0..payload.layer_count {
            dots.extend(current.iter().filter(|d| d.layer == layer).cloned());
            dots.extend(previous.iter().filter(|d| d.layer == layer).cloned());
        }
        dots
    }

    fn guide_dots(&self, layers: &[Layer], axes: &[Vec<i64>], time: f64, historical: bool) -> Vec<GuideDot> {
        guide::resolve(layers, axes, time)
            .into_iter()
            .enumerate()
            .filter_map(|(l, index)| {
                let layer = &layers[l];
                let point = layer.points[index?];

                let (x, y, value) = match point.y {
                    Some(y) => {
                        let total = y + point.y0;
                        (
                            self.x_scale.map((point.x + layer.shift) as f64),
                            self.y_scale.map(total),
                            format!("{total:.3}"),
                        )
                    }
                    None => (OFF_PLOT, OFF_PLOT, "undef".to_string()),
                };

                Some(GuideDot {
                    layer: l,
                    historical,
                    x,
                    y,
                    time: point.x,
                    label: format!("{} @ {}", value, self.format_time(point.x)),
                    value,
                })
            })
            .collect()
    }

    /// `HH:MM` for samples on the day of the last redraw, the full date otherwise.
    fn format_time(&self, ms: i64) -> String {
        let Some(time) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            return String::new();
        };
        if time.date_naive() == self.last_update.date_naive() {
            time.format("%H:%M").to_string()
        } else {
            time.format("%a %Y-%m-%d %H:%M").to_string()
        }
    }
}
