// HTTP data server adapter
use crate::application::data_server::{DataServer, LegendEntry, RangeQuery};
use crate::application::errors::FetchError;
use crate::domain::annotation::{parse_annotations, Annotation, RawAnnotation};
use crate::domain::source::{DataRow, SourceRef};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpDataServer {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct LegendResponse {
    legend: Vec<LegendEntry>,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: Vec<String>,
}

impl HttpDataServer {
    pub fn new(id: impl Into<String>, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn encode_sources(sources: &[SourceRef]) -> String {
        let parts: Vec<Vec<String>> = sources.iter().map(SourceRef::to_parts).collect();
        // a list of string lists always serializes
        let json = serde_json::to_string(&parts).unwrap_or_else(|_| "[]".to_string());
        urlencoding::encode(&json).into_owned()
    }

    fn range_url(&self, endpoint: &str, query: &RangeQuery) -> String {
        format!(
            "{}/{}?sources={}&start={}&end={}&width={}&token={}",
            self.base_url,
            endpoint,
            Self::encode_sources(&query.sources),
            query.start,
            query.end,
            query.width,
            urlencoding::encode(&query.token)
        )
    }

    fn sources_url(&self, endpoint: &str, sources: &[SourceRef], token: &str) -> String {
        format!(
            "{}/{}?sources={}&token={}",
            self.base_url,
            endpoint,
            Self::encode_sources(sources),
            urlencoding::encode(token)
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!(server = %self.id, "GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                server: self.id.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                server: self.id.clone(),
                status,
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
            server: self.id.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            server: self.id.clone(),
            source,
        })
    }
}

#[async_trait]
impl DataServer for HttpDataServer {
    async fn fetch_data(&self, query: &RangeQuery) -> Result<Vec<DataRow>, FetchError> {
        let rows: Vec<DataRow> = self.get_json(&self.range_url("data", query)).await?;
        tracing::debug!(server = %self.id, rows = rows.len(), "Fetched data rows");
        Ok(rows)
    }

    async fn fetch_annotations(&self, query: &RangeQuery) -> Result<Vec<Annotation>, FetchError> {
        let raw: Vec<RawAnnotation> = self.get_json(&self.range_url("annotations", query)).await?;
        Ok(parse_annotations(raw))
    }

    async fn legend(&self, sources: &[SourceRef], token: &str) -> Result<Vec<LegendEntry>, FetchError> {
        let response: LegendResponse = self.get_json(&self.sources_url("legend", sources, token)).await?;
        Ok(response.legend)
    }

    async fn title(&self, sources: &[SourceRef], token: &str) -> Result<Vec<String>, FetchError> {
        let response: TitleResponse = self.get_json(&self.sources_url("title", sources, token)).await?;
        Ok(response.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> HttpDataServer {
        HttpDataServer::new("east", "http://data.example:8889/", reqwest::Client::new())
    }

    fn sources() -> Vec<SourceRef> {
        vec![SourceRef::new("east", vec!["web".to_string(), "rps".to_string()])]
    }

    #[test]
    fn test_range_url() {
        let query = RangeQuery {
            sources: sources(),
            start: 940,
            end: 2000,
            width: 640,
            token: "a b".to_string(),
        };
        assert_eq!(
            server().range_url("data", &query),
            "http://data.example:8889/data?sources=%5B%5B%22east%22%2C%22web%22%2C%22rps%22%5D%5D\
             &start=940&end=2000&width=640&token=a%20b"
        );
    }

    #[test]
    fn test_sources_url() {
        assert_eq!(
            server().sources_url("title", &sources(), ""),
            "http://data.example:8889/title?sources=%5B%5B%22east%22%2C%22web%22%2C%22rps%22%5D%5D&token="
        );
    }

    #[test]
    fn test_legend_body() {
        let body = r##"{"legend": [[["web", "rps"], "#1f77b4"]]}"##;
        let response: LegendResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.legend[0].parts, vec!["web", "rps"]);
        assert_eq!(response.legend[0].color, "#1f77b4");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let server = HttpDataServer::new("down", "http://127.0.0.1:1", reqwest::Client::new());
        let err = server.title(&sources(), "").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { ref server, .. } if server == "down"));
    }

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn malformed_annotations_router() -> axum::Router {
        use axum::routing::get;
        axum::Router::new()
            .route("/data", get(|| async { r#"[{"t": 990, "v": [2.5]}]"# }))
            .route("/annotations", get(|| async { "{" }))
    }

    #[tokio::test]
    async fn test_malformed_annotations_are_decode_error() {
        let url = serve(malformed_annotations_router()).await;
        let server = HttpDataServer::new("east", &url, reqwest::Client::new());
        let query = RangeQuery {
            sources: sources(),
            start: 940,
            end: 1000,
            width: 100,
            token: String::new(),
        };

        let err = server.fetch_annotations(&query).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { ref server, .. } if server == "east"));

        let rows = server.fetch_data(&query).await.unwrap();
        assert_eq!(rows, vec![DataRow::new(990, vec![Some(2.5)])]);
    }

    #[tokio::test]
    async fn test_cycle_survives_malformed_annotations() {
        use crate::application::data_server::DataServerRegistry;
        use crate::application::fetch_coordinator::{CycleContext, FetchCoordinator, RenderRequest};
        use crate::domain::options::GraphOptions;
        use futures::future::AbortHandle;
        use std::sync::Arc;

        let url = serve(malformed_annotations_router()).await;
        let mut registry = DataServerRegistry::new();
        registry.register("east", Arc::new(HttpDataServer::new("east", &url, reqwest::Client::new())));
        let coordinator = FetchCoordinator::new(Arc::new(registry));

        let request = RenderRequest {
            sources: sources(),
            zoom: 60,
            options: GraphOptions {
                show_annotations: true,
                ..Default::default()
            },
            width: 100,
            token: String::new(),
            end: Some(1000),
        };
        let (abort, _registration) = AbortHandle::new_pair();
        let cycle = CycleContext::new(1, &request, 1000, abort).unwrap();

        let payload = coordinator.run_cycle(&cycle, &request).await.unwrap();
        assert!(payload.annotations.is_empty());
        assert_eq!(payload.current_layers.len(), 1);
        assert_eq!(payload.max, 2.5);
    }
}
