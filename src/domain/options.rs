// Graph options recognised by the fetch pipeline and the renderer
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_SMOOTH_ALPHA: f64 = 200.0;

/// `overlay_previous_period = 1` means "one zoom period back" rather than one second.
const PREVIOUS_PERIOD_SENTINEL: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphOptions {
    #[serde(default, deserialize_with = "de_opt_seconds")]
    pub overlay_previous_period: Option<i64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub stacked_graph: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub area_graph: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub smooth: bool,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub smooth_alpha: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub y_axis_log_scale: bool,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub y_axis_clamp: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub show_annotations: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub short_annotations: bool,
}

impl GraphOptions {
    pub fn overlay_enabled(&self) -> bool {
        self.overlay_previous_period.is_some()
    }

    /// Seconds between the current and the overlaid period, if overlay is on.
    pub fn overlay_offset(&self, zoom: i64) -> Option<i64> {
        self.overlay_previous_period.map(|period| {
            if period == PREVIOUS_PERIOD_SENTINEL {
                zoom
            } else {
                period
            }
        })
    }

    /// Exponential smoothing factor; a larger `smooth_alpha` gives a smaller factor.
    pub fn smoothing_factor(&self) -> Option<f64> {
        self.smooth.then(|| {
            let exponent = self.smooth_alpha.unwrap_or(DEFAULT_SMOOTH_ALPHA) / 100.0;
            8.0 / 10f64.powf(exponent)
        })
    }
}

// Form-driven callers send flags as "1", 1, true or leave them empty.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false"),
        _ => false,
    })
}

fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

fn de_opt_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Bool(true) => Some(PREVIOUS_PERIOD_SENTINEL),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(value.filter(|seconds| *seconds != 0))
}
