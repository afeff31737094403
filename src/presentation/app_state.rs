// Application state for HTTP handlers
use crate::application::fetch_coordinator::FetchCoordinator;
use crate::application::renderer::{ChartSize, RenderSettings};
use crate::application::session::ChartSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct SessionEntry {
    session: Arc<ChartSession>,
    last_used: Instant,
}

pub struct AppState {
    pub coordinator: FetchCoordinator,
    pub settings: RenderSettings,
    pub default_height: f64,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl AppState {
    pub fn new(
        coordinator: FetchCoordinator,
        settings: RenderSettings,
        default_height: f64,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            settings,
            default_height,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The session for chart `id`, started on first use.
    pub async fn session(&self, id: &str, size: ChartSize) -> Arc<ChartSession> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::info!(chart = id, "Starting chart session");
            SessionEntry {
                session: Arc::new(ChartSession::new(self.coordinator.clone(), self.settings, size)),
                last_used: Instant::now(),
            }
        });
        entry.last_used = Instant::now();
        entry.session.clone()
    }

    pub async fn existing(&self, id: &str) -> Option<Arc<ChartSession>> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<ChartSession>> {
        self.sessions.lock().await.remove(id).map(|entry| entry.session)
    }

    /// Stops every session unused for longer than the idle timeout. Returns how many were
    /// stopped.
    pub async fn evict_idle(&self) -> usize {
        let expired: Vec<(String, Arc<ChartSession>)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() >= self.idle_timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry.session)))
                .collect()
        };

        for (id, session) in &expired {
            session.shutdown().await;
            tracing::info!(chart = %id, "Idle chart session stopped");
        }
        expired.len()
    }

    /// Sweeps idle sessions every `period` until the state is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let state = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                let evicted = state.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Swept idle chart sessions");
                }
            }
        })
    }
}
