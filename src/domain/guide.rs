// Nearest-sample lookup for the pointer guide
use super::layers::Layer;

/// Index of the first element of `axis` that is not less than `value`.
pub fn bisect_left<T: PartialOrd>(axis: &[T], value: &T) -> usize {
    axis.partition_point(|x| x < value)
}

/// Index after the last element of `axis` that is not greater than `value`.
pub fn bisect_right<T: PartialOrd>(axis: &[T], value: &T) -> usize {
    axis.partition_point(|x| x <= value)
}

/// Index of the sample in `axis` closest to `time`. Equal distances resolve to the
/// earlier sample. `None` for an empty axis.
pub fn nearest_index(axis: &[i64], time: f64) -> Option<usize> {
    if axis.is_empty() {
        return None;
    }

    let times: Vec<f64> = axis.iter().map(|&t| t as f64).collect();
    let mut index = bisect_left(&times, &time).min(times.len() - 1);

    if index > 0 && (times[index] - time).abs() >= (times[index - 1] - time).abs() {
        index -= 1;
    }
    Some(index)
}

/// Closest point index for every layer at the pointer time `query_time` (ms on the current
/// axis). `axes[i]` holds the timestamps of `layers[i]`.
pub fn resolve(layers: &[Layer], axes: &[Vec<i64>], query_time: f64) -> Vec<Option<usize>> {
    layers
        .iter()
        .zip(axes)
        .map(|(layer, axis)| {
            if layer.is_empty() {
                return None;
            }
            nearest_index(axis, query_time - layer.shift as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layers::LayerPoint;

    fn layer(xs: &[i64], shift: i64) -> Layer {
        Layer {
            points: xs
                .iter()
                .map(|&x| LayerPoint {
                    x,
                    y: Some(1.0),
                    y0: 0.0,
                })
                .collect(),
            shift,
        }
    }

    #[test]
    fn test_nearest_prefers_closer_predecessor() {
        assert_eq!(nearest_index(&[0, 10, 20, 30], 14.0), Some(1));
        assert_eq!(nearest_index(&[0, 10, 20, 30], 16.0), Some(2));
    }

    #[test]
    fn test_nearest_tie_goes_left() {
        assert_eq!(nearest_index(&[0, 10, 20, 30], 15.0), Some(1));
    }

    #[test]
    fn test_nearest_clamps_to_ends() {
        assert_eq!(nearest_index(&[0, 10, 20, 30], 99.0), Some(3));
        assert_eq!(nearest_index(&[0, 10, 20, 30], -5.0), Some(0));
        assert_eq!(nearest_index(&[7], 100.0), Some(0));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn test_resolve_applies_layer_shift() {
        let layers = vec![layer(&[0, 10, 20, 30], 0), layer(&[0, 10, 20, 30], 100), layer(&[], 0)];
        let axes: Vec<Vec<i64>> = layers.iter().map(Layer::axis).collect();

        // the shifted layer sees local time 14 - 100 = -86
        assert_eq!(resolve(&layers, &axes, 14.0), vec![Some(1), Some(0), None]);
        assert_eq!(resolve(&layers, &axes, 122.0), vec![Some(3), Some(2), None]);
    }

    #[test]
    fn test_bisect() {
        let axis = [1, 2, 2, 3];
        assert_eq!(bisect_left(&axis, &2), 1);
        assert_eq!(bisect_right(&axis, &2), 3);
        assert_eq!(bisect_left(&axis, &0), 0);
        assert_eq!(bisect_right(&axis, &9), 4);
    }
}
