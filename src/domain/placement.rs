// Annotation tooltip placement: keep tooltips off the plotted lines and off each other
use super::guide::{bisect_left, bisect_right};
use super::layers::Layer;
use super::scale::{LinearScale, YScale};
use serde::Serialize;

/// Distance from the top of the container to a tooltip's default position.
pub const DEFAULT_TOP_OFFSET: f64 = 25.0;
const DATA_PADDING_Y: f64 = 10.0;
const DATA_PADDING_X: f64 = 5.0;
const TOOLTIP_GAP: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// A tooltip waiting for a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TooltipRequest {
    pub id: i64,
    /// Pixel x of the annotation line.
    pub line_x: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub id: i64,
    pub rect: Rect,
}

/// What the solver needs to know about the rendered chart.
pub struct PlotGeometry<'a> {
    pub width: f64,
    pub height: f64,
    /// Offset of the chart container inside its page, usually 0.
    pub container_top: f64,
    pub x_scale: &'a LinearScale,
    pub y_scale: &'a YScale,
    /// Layers currently drawn, previous-period ones included when overlaid.
    pub layers: Vec<&'a Layer>,
}

impl PlotGeometry<'_> {
    fn default_y(&self) -> f64 {
        self.container_top + DEFAULT_TOP_OFFSET
    }

    /// True when the box, padded, covers a sample or sits between samples drawn above and
    /// below it (a line segment must cross it).
    fn conflicts_with_data(&self, rect: &Rect) -> bool {
        let upper = rect.y - DATA_PADDING_Y;
        let lower = rect.y + rect.height + DATA_PADDING_Y;
        let left_time = self.x_scale.invert(rect.x - DATA_PADDING_X);
        let right_time = self.x_scale.invert(rect.x + rect.width + DATA_PADDING_X);

        self.layers.iter().any(|layer| {
            let times: Vec<f64> = layer
                .points
                .iter()
                .map(|p| (p.x + layer.shift) as f64)
                .collect();
            let from = bisect_left(&times, &left_time);
            let to = bisect_right(&times, &right_time).max(from);

            let mut above = false;
            let mut below = false;
            // only the line matters, so y0 is not examined
            for y in layer.points[from..to].iter().filter_map(|p| p.y) {
                let py = self.y_scale.map(y);
                if py >= upper && py <= lower {
                    return true;
                }
                above |= py <= upper;
                below |= py >= lower;
                if above && below {
                    return true;
                }
            }
            false
        })
    }
}

/// Places one tooltip given the tooltips already placed.
pub fn place(request: &TooltipRequest, placed: &[Placement], plot: &PlotGeometry<'_>) -> Rect {
    let mut x = request.line_x;
    let (w, h) = (request.width, request.height);

    if x + w > plot.width {
        x -= w;
    } else if x < 0.0 {
        x += w;
    }

    let default_y = plot.default_y();
    let mut y = default_y;
    while plot.conflicts_with_data(&Rect { x, y, width: w, height: h }) {
        if y + h > plot.height {
            tracing::trace!(id = request.id, "no data-free spot for annotation tooltip");
            y = default_y;
            break;
        }
        y += h;
    }

    // lower ids keep their spot, higher ids move
    let collides = |y: f64| {
        let rect = Rect { x, y, width: w, height: h };
        placed
            .iter()
            .any(|other| other.id < request.id && rect.overlaps(&other.rect))
    };
    while collides(y) && y + h < plot.height {
        y += h + TOOLTIP_GAP;
    }

    Rect { x, y, width: w, height: h }
}

/// Places every tooltip, in ascending id order.
pub fn place_all(requests: &[TooltipRequest], plot: &PlotGeometry<'_>) -> Vec<Placement> {
    let mut ordered: Vec<&TooltipRequest> = requests.iter().collect();
    ordered.sort_by_key(|r| r.id);

    let mut placed = Vec::with_capacity(ordered.len());
    for request in ordered {
        let rect = place(request, &placed, plot);
        placed.push(Placement { id: request.id, rect });
    }
    placed
}
