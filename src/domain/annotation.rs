// Annotations: events drawn as vertical lines with a tooltip
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Stable ordering key; lower ids win tooltip placement.
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// Milliseconds since the epoch.
    pub time: i64,
}

impl Annotation {
    /// Tooltip text: the annotation type, or just its first character when `short`.
    pub fn label(&self, short: bool) -> String {
        if short {
            self.kind.chars().take(1).collect()
        } else {
            self.kind.clone()
        }
    }
}

/// An `/annotations` entry as sent by a data server. Ids and times may arrive as numbers
/// or numeric strings, and times are in (possibly fractional) seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnnotation {
    #[serde(default)]
    id: Value,
    #[serde(rename = "type", default)]
    kind: Value,
    #[serde(default)]
    description: Value,
    #[serde(default)]
    time: Value,
}

impl RawAnnotation {
    pub fn into_annotation(self) -> Option<Annotation> {
        let id = number(&self.id)? as i64;
        let time = (number(&self.time)? * 1000.0) as i64;
        Some(Annotation {
            id,
            kind: text(self.kind),
            description: text(self.description),
            time,
        })
    }
}

/// Converts raw entries, dropping those without a usable id or time.
pub fn parse_annotations(raw: Vec<RawAnnotation>) -> Vec<Annotation> {
    let total = raw.len();
    let annotations: Vec<Annotation> = raw
        .into_iter()
        .filter_map(RawAnnotation::into_annotation)
        .collect();
    if annotations.len() < total {
        tracing::debug!(
            "Dropped {} unreadable annotations out of {}",
            total - annotations.len(),
            total
        );
    }
    annotations
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_representations() {
        let raw: Vec<RawAnnotation> = serde_json::from_str(
            r#"[
                {"id": 3, "type": "deploy", "description": "web 1.2", "time": 1700000000.5},
                {"id": "4", "type": 7, "description": "restart", "time": "1700000100"},
                {"id": null, "type": "broken", "description": "", "time": 1}
            ]"#,
        )
        .unwrap();

        let annotations = parse_annotations(raw);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].id, 3);
        assert_eq!(annotations[0].time, 1_700_000_000_500);
        assert_eq!(annotations[1].id, 4);
        assert_eq!(annotations[1].kind, "7");
        assert_eq!(annotations[1].time, 1_700_000_100_000);
    }

    #[test]
    fn test_label() {
        let annotation = Annotation {
            id: 1,
            kind: "deploy".to_string(),
            description: String::new(),
            time: 0,
        };
        assert_eq!(annotation.label(false), "deploy");
        assert_eq!(annotation.label(true), "d");
    }
}
