// Source references and raw samples as they arrive from data servers
use serde::{Deserialize, Serialize};

/// 9999-12-31T23:59:59Z. Timestamps beyond this, either side of the epoch, are rejected
/// so that millisecond arithmetic on them cannot overflow.
pub const MAX_EPOCH_SECS: i64 = 253_402_300_799;

pub fn epoch_in_range(secs: i64) -> bool {
    (-MAX_EPOCH_SECS..=MAX_EPOCH_SECS).contains(&secs)
}

/// A data source: the owning data server followed by its path on that server.
///
/// On the wire this is a flat JSON array, `["a1b2c3", "web", "requests"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SourceRef {
    pub server_id: String,
    pub path: Vec<String>,
}

impl SourceRef {
    pub fn new(server_id: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            server_id: server_id.into(),
            path,
        }
    }

    /// The full tuple, server id first.
    pub fn to_parts(&self) -> Vec<String> {
        std::iter::once(self.server_id.clone())
            .chain(self.path.iter().cloned())
            .collect()
    }
}

impl TryFrom<Vec<String>> for SourceRef {
    type Error = String;

    fn try_from(parts: Vec<String>) -> Result<Self, Self::Error> {
        let mut parts = parts.into_iter();
        match parts.next() {
            Some(server_id) if !server_id.is_empty() => Ok(Self {
                server_id,
                path: parts.collect(),
            }),
            _ => Err("source reference needs a server id".to_string()),
        }
    }
}

impl From<SourceRef> for Vec<String> {
    fn from(source: SourceRef) -> Self {
        source.to_parts()
    }
}

/// One slot of a merged row.
///
/// `Null` means the server answered for this instant without a value, `Absent` means the
/// server's response had no row for the instant at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Value(f64),
    Null,
    Absent,
}

impl SampleValue {
    /// The numeric value for a present sample, `None` for `Null`, and no answer for
    /// `Absent` samples.
    pub fn present(&self) -> Option<Option<f64>> {
        match *self {
            SampleValue::Value(v) => Some(Some(v)),
            SampleValue::Null => Some(None),
            SampleValue::Absent => None,
        }
    }
}

impl From<Option<f64>> for SampleValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => SampleValue::Value(v),
            None => SampleValue::Null,
        }
    }
}

/// A row of a `/data` response: `{"t": 1700000000, "v": [1.5, null]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub t: i64,
    pub v: Vec<Option<f64>>,
}

impl DataRow {
    pub fn new(t: i64, v: Vec<Option<f64>>) -> Self {
        Self { t, v }
    }
}
