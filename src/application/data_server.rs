// Port to the remote data servers that own metric sources
use crate::application::errors::FetchError;
use crate::domain::annotation::Annotation;
use crate::domain::source::{DataRow, SourceRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A range query against one data server. `start` already includes the left-edge buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub sources: Vec<SourceRef>,
    pub start: i64,
    pub end: i64,
    pub width: u32,
    pub token: String,
}

/// One legend line: the distinguishing path components of a source and its colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Vec<String>, String)", into = "(Vec<String>, String)")]
pub struct LegendEntry {
    pub parts: Vec<String>,
    pub color: String,
}

impl From<(Vec<String>, String)> for LegendEntry {
    fn from((parts, color): (Vec<String>, String)) -> Self {
        Self { parts, color }
    }
}

impl From<LegendEntry> for (Vec<String>, String) {
    fn from(entry: LegendEntry) -> Self {
        (entry.parts, entry.color)
    }
}

#[async_trait]
pub trait DataServer: Send + Sync {
    /// Rows of `{t, v}` ordered by time, one value per requested source.
    async fn fetch_data(&self, query: &RangeQuery) -> Result<Vec<DataRow>, FetchError>;

    /// Annotations in the queried window.
    async fn fetch_annotations(&self, query: &RangeQuery) -> Result<Vec<Annotation>, FetchError>;

    /// Legend entries, one per source.
    async fn legend(&self, sources: &[SourceRef], token: &str) -> Result<Vec<LegendEntry>, FetchError>;

    /// Title components shared by the sources.
    async fn title(&self, sources: &[SourceRef], token: &str) -> Result<Vec<String>, FetchError>;
}

/// Data servers by id.
#[derive(Clone, Default)]
pub struct DataServerRegistry {
    servers: HashMap<String, Arc<dyn DataServer>>,
}

impl DataServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, server: Arc<dyn DataServer>) {
        self.servers.insert(id.into(), server);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn DataServer>, FetchError> {
        self.servers
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::UnknownServer(id.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// The sources one server is asked for, with their positions in the full source list.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPartition {
    pub server_id: String,
    pub indices: Vec<usize>,
    pub sources: Vec<SourceRef>,
}

/// Groups sources by owning server, in order of first appearance.
pub fn partition_sources(sources: &[SourceRef]) -> Vec<ServerPartition> {
    let mut partitions: Vec<ServerPartition> = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        match partitions
            .iter_mut()
            .find(|p| p.server_id == source.server_id)
        {
            Some(partition) => {
                partition.indices.push(index);
                partition.sources.push(source.clone());
            }
            None => partitions.push(ServerPartition {
                server_id: source.server_id.clone(),
                indices: vec![index],
                sources: vec![source.clone()],
            }),
        }
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(server: &str, name: &str) -> SourceRef {
        SourceRef::new(server, vec![name.to_string()])
    }

    #[test]
    fn test_partition_keeps_global_indices() {
        let sources = vec![
            source("a", "cpu"),
            source("b", "mem"),
            source("a", "disk"),
            source("c", "net"),
        ];
        let partitions = partition_sources(&sources);

        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].server_id, "a");
        assert_eq!(partitions[0].indices, vec![0, 2]);
        assert_eq!(partitions[0].sources, vec![source("a", "cpu"), source("a", "disk")]);
        assert_eq!(partitions[1].indices, vec![1]);
        assert_eq!(partitions[2].indices, vec![3]);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition_sources(&[]).is_empty());
    }

    #[test]
    fn test_unknown_server() {
        let registry = DataServerRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(FetchError::UnknownServer(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_legend_entry_wire_format() {
        let entries: Vec<LegendEntry> =
            serde_json::from_str(r##"[[["web", "requests"], "#ff0000"]]"##).unwrap();
        assert_eq!(entries[0].parts, vec!["web", "requests"]);
        assert_eq!(entries[0].color, "#ff0000");
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory data server for tests.
    use super::*;
    use crate::domain::annotation::{parse_annotations, RawAnnotation};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct FakeDataServer {
        pub rows: Vec<DataRow>,
        /// Rows returned for queries whose end lies before `previous_before`.
        pub previous_rows: Vec<DataRow>,
        pub previous_before: i64,
        pub annotations: Vec<Annotation>,
        pub fail_status: Option<u16>,
        pub fail_annotations: bool,
        /// Answer `/annotations` with a body that does not parse.
        pub malformed_annotations: bool,
        pub panic_on_fetch: bool,
        pub delay: Duration,
        pub queries: Mutex<Vec<RangeQuery>>,
        pub annotation_queries: Mutex<Vec<RangeQuery>>,
    }

    impl FakeDataServer {
        pub fn with_rows(rows: Vec<DataRow>) -> Self {
            Self {
                rows,
                ..Default::default()
            }
        }

        pub fn recorded(&self) -> Vec<RangeQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataServer for FakeDataServer {
        async fn fetch_data(&self, query: &RangeQuery) -> Result<Vec<DataRow>, FetchError> {
            self.queries.lock().unwrap().push(query.clone());
            tokio::time::sleep(self.delay).await;
            if self.panic_on_fetch {
                panic!("fake data server failure");
            }
            if let Some(status) = self.fail_status {
                return Err(FetchError::Status {
                    server: "fake".to_string(),
                    status,
                    body: String::new(),
                });
            }
            if query.end < self.previous_before {
                Ok(self.previous_rows.clone())
            } else {
                Ok(self.rows.clone())
            }
        }

        async fn fetch_annotations(&self, query: &RangeQuery) -> Result<Vec<Annotation>, FetchError> {
            self.annotation_queries.lock().unwrap().push(query.clone());
            if self.fail_annotations {
                return Err(FetchError::Status {
                    server: "fake".to_string(),
                    status: 500,
                    body: String::new(),
                });
            }
            if self.malformed_annotations {
                let raw = serde_json::from_str::<Vec<RawAnnotation>>("{").map_err(|source| {
                    FetchError::Decode {
                        server: "fake".to_string(),
                        source,
                    }
                })?;
                return Ok(parse_annotations(raw));
            }
            Ok(self.annotations.clone())
        }

        async fn legend(&self, sources: &[SourceRef], _token: &str) -> Result<Vec<LegendEntry>, FetchError> {
            Ok(sources
                .iter()
                .map(|s| LegendEntry {
                    parts: s.path.clone(),
                    color: "#000000".to_string(),
                })
                .collect())
        }

        async fn title(&self, sources: &[SourceRef], _token: &str) -> Result<Vec<String>, FetchError> {
            Ok(sources.first().map(|s| s.path.clone()).unwrap_or_default())
        }
    }
}
