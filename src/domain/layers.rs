// Layer transform: merged rows into drawable, optionally smoothed and stacked layers
use super::merge::MergedRow;
use super::options::GraphOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerPoint {
    /// Milliseconds since the epoch.
    pub x: i64,
    pub y: Option<f64>,
    /// Stacking baseline, 0 when stacking is off.
    pub y0: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Layer {
    pub points: Vec<LayerPoint>,
    /// Offset in ms to add to `x` when drawing on the current time axis.
    pub shift: i64,
}

impl Layer {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The ascending timestamps of the layer, used for bisection.
    pub fn axis(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.x).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSet {
    pub current: Vec<Layer>,
    pub previous: Vec<Layer>,
    pub max: f64,
    pub min: f64,
}

struct Extent {
    max: f64,
    min: f64,
}

impl Extent {
    fn include(&mut self, value: f64) {
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }
}

/// Builds one layer per source for the current and (possibly empty) previous period.
/// `offset` is the overlay distance in seconds.
pub fn build_layers(
    current: &[MergedRow],
    previous: &[MergedRow],
    source_count: usize,
    options: &GraphOptions,
    offset: i64,
) -> LayerSet {
    let mut extent = Extent {
        max: f64::NEG_INFINITY,
        min: f64::INFINITY,
    };
    let smoothing = options.smoothing_factor();

    let current = build_period(
        current,
        source_count,
        smoothing,
        options.stacked_graph,
        0,
        &mut extent,
    );
    let previous = build_period(
        previous,
        source_count,
        smoothing,
        options.stacked_graph,
        offset.saturating_mul(1000),
        &mut extent,
    );

    LayerSet {
        current,
        previous,
        max: extent.max,
        min: extent.min,
    }
}

fn build_period(
    rows: &[MergedRow],
    source_count: usize,
    smoothing: Option<f64>,
    stacked: bool,
    shift: i64,
    extent: &mut Extent,
) -> Vec<Layer> {
    // running top of the stack for each row
    let mut baseline = vec![0.0; rows.len()];

    (0..source_count)
        .map(|l| {
            let mut points = Vec::new();
            let mut last: Option<f64> = None;

            for (i, row) in rows.iter().enumerate() {
                let Some(raw) = row.values.get(l).and_then(|v| v.present()) else {
                    continue;
                };

                let y = match (smoothing, raw, last) {
                    (Some(alpha), Some(raw), Some(prev)) => Some(prev + alpha * (raw - prev)),
                    _ => raw,
                };
                last = y;

                let y0 = if stacked { baseline[i] } else { 0.0 };
                if let Some(y) = y {
                    extent.include(y + y0);
                    if stacked {
                        baseline[i] += y;
                    }
                }

                points.push(LayerPoint {
                    x: row.t.saturating_mul(1000),
                    y,
                    y0,
                });
            }

            Layer { points, shift }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::SampleValue::{self, Absent, Null, Value};

    fn row(t: i64, values: Vec<SampleValue>) -> MergedRow {
        MergedRow { t, values }
    }

    fn rows() -> Vec<MergedRow> {
        vec![
            row(10, vec![Value(1.0), Value(2.0), Value(3.0)]),
            row(20, vec![Value(4.0), Absent, Value(1.0)]),
            row(30, vec![Null, Value(5.0), Value(2.0)]),
        ]
    }

    fn find(layer: &Layer, x: i64) -> Option<LayerPoint> {
        layer.points.iter().copied().find(|p| p.x == x)
    }

    #[test]
    fn test_unstacked_baseline_is_zero() {
        let set = build_layers(&rows(), &rows(), 3, &GraphOptions::default(), 60);
        for layer in set.current.iter().chain(set.previous.iter()) {
            assert!(layer.points.iter().all(|p| p.y0 == 0.0));
        }
    }

    #[test]
    fn test_stacked_baseline_accumulates() {
        let options = GraphOptions {
            stacked_graph: true,
            ..Default::default()
        };
        let set = build_layers(&rows(), &[], 3, &options, 0);

        for l in 1..set.current.len() {
            for point in &set.current[l].points {
                let Some(below) = find(&set.current[l - 1], point.x) else {
                    continue;
                };
                if let (Some(y_below), Some(_)) = (below.y, point.y) {
                    assert_eq!(point.y0, below.y0 + y_below);
                }
            }
        }

        // at t=10: 1, 1+2
        assert_eq!(find(&set.current[2], 10_000).unwrap().y0, 3.0);
        // at t=30 the first layer is null and adds nothing
        assert_eq!(find(&set.current[1], 30_000).unwrap().y0, 0.0);
        assert_eq!(set.max, 7.0);
    }

    #[test]
    fn test_absent_samples_are_skipped() {
        let set = build_layers(&rows(), &[], 3, &GraphOptions::default(), 0);
        let xs: Vec<i64> = set.current[1].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![10_000, 30_000]);

        // explicit nulls stay in the layer
        assert_eq!(find(&set.current[0], 30_000).unwrap().y, None);
    }

    #[test]
    fn test_smoothing_sequence() {
        let options = GraphOptions {
            smooth: true,
            // 8 / 10^(log10(16)) = 0.5
            smooth_alpha: Some(100.0 * 16f64.log10()),
            ..Default::default()
        };
        let input = vec![
            row(1, vec![Value(10.0)]),
            row(2, vec![Value(20.0)]),
            row(3, vec![Value(30.0)]),
        ];
        let set = build_layers(&input, &[], 1, &options, 0);
        let ys: Vec<f64> = set.current[0].points.iter().filter_map(|p| p.y).collect();

        let expected = [10.0, 15.0, 22.5];
        for (y, e) in ys.iter().zip(expected) {
            assert!((y - e).abs() < 1e-9, "{y} != {e}");
        }
    }

    #[test]
    fn test_smoothing_preserves_nulls() {
        let options = GraphOptions {
            smooth: true,
            ..Default::default()
        };
        let input = vec![
            row(1, vec![Value(10.0)]),
            row(2, vec![Null]),
            row(3, vec![Value(30.0)]),
        ];
        let set = build_layers(&input, &[], 1, &options, 0);
        let ys: Vec<Option<f64>> = set.current[0].points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![Some(10.0), None, Some(30.0)]);
    }

    #[test]
    fn test_previous_layers_are_shifted() {
        let set = build_layers(&rows(), &rows(), 3, &GraphOptions::default(), 3600);
        assert!(set.current.iter().all(|l| l.shift == 0));
        assert!(set.previous.iter().all(|l| l.shift == 3_600_000));
    }

    #[test]
    fn test_extent_of_empty_input() {
        let set = build_layers(&[], &[], 2, &GraphOptions::default(), 0);
        assert_eq!(set.current.len(), 2);
        assert!(set.current.iter().all(Layer::is_empty));
        assert_eq!(set.max, f64::NEG_INFINITY);
        assert_eq!(set.min, f64::INFINITY);
    }

    #[test]
    fn test_extent_covers_both_periods() {
        let previous = vec![row(5, vec![Value(-4.0), Value(50.0), Null])];
        let set = build_layers(&rows(), &previous, 3, &GraphOptions::default(), 10);
        assert_eq!(set.max, 50.0);
        assert_eq!(set.min, -4.0);
    }

    #[test]
    fn test_extreme_times_saturate() {
        let huge = vec![row(i64::MAX / 10, vec![Value(1.0)])];
        let set = build_layers(&huge, &huge, 1, &GraphOptions::default(), i64::MAX / 10);
        assert_eq!(set.current[0].points[0].x, i64::MAX);
        assert_eq!(set.previous[0].shift, i64::MAX);
    }
}
