// Fetch/merge coordinator - fans a render request out to data servers and merges the answers
use crate::application::data_server::{
    partition_sources, DataServer, DataServerRegistry, LegendEntry, RangeQuery, ServerPartition,
};
use crate::application::errors::FetchError;
use crate::domain::annotation::Annotation;
use crate::domain::layers::build_layers;
use crate::domain::merge::MergedTable;
use crate::domain::options::GraphOptions;
use crate::domain::payload::RenderPayload;
use crate::domain::source::{epoch_in_range, SourceRef, MAX_EPOCH_SECS};
use futures::future::{try_join_all, AbortHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Every query starts this many seconds early so lines do not begin inside the plot.
pub const LEFT_EDGE_BUFFER_SECS: i64 = 60;

/// What a caller asks to have drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub sources: Vec<SourceRef>,
    /// Width of the time window in seconds.
    pub zoom: i64,
    #[serde(default)]
    pub options: GraphOptions,
    /// Plot width in pixels, forwarded to data servers for downsampling.
    pub width: u32,
    #[serde(default)]
    pub token: String,
    /// End of the window in epoch seconds; "now" when absent.
    #[serde(default)]
    pub end: Option<i64>,
}

/// State of one fetch cycle. A new cycle gets a new context; contexts are never shared.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub id: u64,
    pub start: i64,
    pub end: i64,
    /// Overlay distance in seconds when the previous period is fetched.
    pub offset: Option<i64>,
    abort: AbortHandle,
}

impl CycleContext {
    /// Fails when the window or the overlay distance lies outside the supported time range.
    pub fn new(id: u64, request: &RenderRequest, now: i64, abort: AbortHandle) -> Result<Self, FetchError> {
        let end = request.end.unwrap_or(now);
        if !epoch_in_range(end) {
            return Err(FetchError::WindowOutOfRange(format!("end {end}")));
        }
        if request.zoom <= 0 || request.zoom > MAX_EPOCH_SECS {
            return Err(FetchError::WindowOutOfRange(format!("zoom {}", request.zoom)));
        }
        let offset = request.options.overlay_offset(request.zoom);
        if let Some(offset) = offset.filter(|o| !epoch_in_range(*o)) {
            return Err(FetchError::WindowOutOfRange(format!("overlay offset {offset}")));
        }

        Ok(Self {
            id,
            start: end - request.zoom,
            end,
            offset,
            abort,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    fn ensure_live(&self) -> Result<(), FetchError> {
        if self.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    registry: Arc<DataServerRegistry>,
}

impl FetchCoordinator {
    pub fn new(registry: Arc<DataServerRegistry>) -> Self {
        Self { registry }
    }

    /// Runs one cycle: all requests concurrently, then merge and layer transform.
    /// Fails on the first failed data request; annotation failures only drop annotations.
    pub async fn run_cycle(
        &self,
        cycle: &CycleContext,
        request: &RenderRequest,
    ) -> Result<RenderPayload, FetchError> {
        let partitions = partition_sources(&request.sources);
        let servers = partitions
            .iter()
            .map(|p| self.registry.get(&p.server_id))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            cycle = cycle.id,
            sources = request.sources.len(),
            servers = partitions.len(),
            overlay = cycle.offset.is_some(),
            "Starting fetch cycle"
        );

        let current = self.fetch_period(&partitions, &servers, request, cycle.start, cycle.end);
        let previous = async {
            match cycle.offset {
                Some(offset) => self
                    .fetch_period(
                        &partitions,
                        &servers,
                        request,
                        cycle.start - offset,
                        cycle.end - offset,
                    )
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let annotations = async {
            Ok::<_, FetchError>(self.fetch_annotations(cycle, request).await)
        };

        let (current, previous, annotations) = futures::try_join!(current, previous, annotations)?;
        cycle.ensure_live()?;

        let source_count = request.sources.len();
        let offset = cycle.offset.unwrap_or(0);
        let previous_rows = previous.map(MergedTable::into_rows).unwrap_or_default();
        let layers = build_layers(
            &current.into_rows(),
            &previous_rows,
            source_count,
            &request.options,
            offset,
        );
        cycle.ensure_live()?;

        Ok(RenderPayload {
            options: request.options.clone(),
            start: cycle.start,
            end: cycle.end,
            offset,
            max: layers.max,
            min: layers.min,
            layer_count: source_count,
            current_layers: layers.current,
            previous_layers: layers.previous,
            annotations,
        })
    }

    async fn fetch_period(
        &self,
        partitions: &[ServerPartition],
        servers: &[Arc<dyn DataServer>],
        request: &RenderRequest,
        start: i64,
        end: i64,
    ) -> Result<MergedTable, FetchError> {
        let requests = partitions.iter().zip(servers).map(|(partition, server)| {
            let query = RangeQuery {
                sources: partition.sources.clone(),
                start: start - LEFT_EDGE_BUFFER_SECS,
                end,
                width: request.width,
                token: request.token.clone(),
            };
            async move {
                let rows = server.fetch_data(&query).await?;
                if let Some(row) = rows.iter().find(|row| !epoch_in_range(row.t)) {
                    return Err(FetchError::TimestampOutOfRange {
                        server: partition.server_id.clone(),
                        t: row.t,
                    });
                }
                Ok::<_, FetchError>((partition, rows))
            }
        });

        let mut table = MergedTable::new(request.sources.len());
        for (partition, rows) in try_join_all(requests).await? {
            table.install(&partition.indices, &rows);
        }
        Ok(table)
    }

    /// Annotations for the whole source list, asked of the server owning the first source.
    async fn fetch_annotations(&self, cycle: &CycleContext, request: &RenderRequest) -> Vec<Annotation> {
        if !request.options.show_annotations {
            return Vec::new();
        }
        let Some(first) = request.sources.first() else {
            return Vec::new();
        };

        let query = RangeQuery {
            sources: request.sources.clone(),
            start: cycle.start - LEFT_EDGE_BUFFER_SECS,
            end: cycle.end,
            width: request.width,
            token: request.token.clone(),
        };
        let result = match self.registry.get(&first.server_id) {
            Ok(server) => server.fetch_annotations(&query).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(cycle = cycle.id, "Ignoring annotations: {}", e);
            Vec::new()
        })
    }

    /// Legend entries for `sources`, in source order, gathered from every owning server.
    pub async fn legend(
        &self,
        sources: &[SourceRef],
        token: &str,
    ) -> Result<Vec<LegendEntry>, FetchError> {
        let partitions = partition_sources(sources);
        let requests = partitions.iter().map(|partition| async move {
            let server = self.registry.get(&partition.server_id)?;
            let entries = server.legend(&partition.sources, token).await?;
            Ok::<_, FetchError>((partition, entries))
        });

        let mut legend: Vec<Option<LegendEntry>> = vec![None; sources.len()];
        for (partition, entries) in try_join_all(requests).await? {
            for (entry, &index) in entries.into_iter().zip(&partition.indices) {
                legend[index] = Some(entry);
            }
        }

        legend
            .into_iter()
            .zip(sources)
            .map(|(entry, source)| entry.ok_or_else(|| FetchError::InvalidPath(source.to_parts())))
            .collect()
    }

    /// Title components, from the server owning the first source.
    pub async fn title(&self, sources: &[SourceRef], token: &str) -> Result<Vec<String>, FetchError> {
        let Some(first) = sources.first() else {
            return Ok(Vec::new());
        };
        self.registry.get(&first.server_id)?.title(sources, token).await
    }
}
