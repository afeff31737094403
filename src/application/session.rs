// Chart session - the interactive side of one chart: dispatches cycles, keeps the last frame
use crate::application::errors::SessionError;
use crate::application::fetch_coordinator::{FetchCoordinator, RenderRequest};
use crate::application::renderer::{ChartSize, Frame, GuideDot, RenderSettings, Renderer};
use crate::application::worker::{RenderWorker, WorkerEvent, WorkerHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Result of the newest cycle that reached the renderer.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Drawn { cycle: u64, frame: Frame },
    Failed { cycle: u64, error: String },
}

impl CycleOutcome {
    pub fn cycle(&self) -> u64 {
        match self {
            CycleOutcome::Drawn { cycle, .. } | CycleOutcome::Failed { cycle, .. } => *cycle,
        }
    }
}

pub struct ChartSession {
    worker: WorkerHandle,
    renderer: Arc<Mutex<Renderer>>,
    outcomes: watch::Receiver<Option<CycleOutcome>>,
    pump: JoinHandle<()>,
}

impl ChartSession {
    pub fn new(coordinator: FetchCoordinator, settings: RenderSettings, size: ChartSize) -> Self {
        let (worker, events) = RenderWorker::spawn(coordinator);
        let renderer = Arc::new(Mutex::new(Renderer::new(settings, size)));
        let (outcome_tx, outcomes) = watch::channel(None);

        let pump = tokio::spawn(pump_events(
            events,
            worker.latest_counter(),
            renderer.clone(),
            outcome_tx,
        ));

        Self {
            worker,
            renderer,
            outcomes,
            pump,
        }
    }

    /// Starts a new fetch cycle and waits for it to be drawn at `size`. Returns `Superseded`
    /// when a newer request was made in the meantime.
    pub async fn render(&self, request: RenderRequest, size: ChartSize) -> Result<Frame, SessionError> {
        let mut outcomes = self.outcomes.clone();
        let cycle = self.worker.render(request, size).await?;

        let outcome = outcomes
            .wait_for(|outcome| outcome.as_ref().is_some_and(|o| o.cycle() >= cycle))
            .await
            .map_err(|_| SessionError::WorkerGone)?
            .clone();

        match outcome {
            Some(outcome) if outcome.cycle() > cycle => Err(SessionError::Superseded),
            Some(CycleOutcome::Drawn { frame, .. }) => Ok(frame),
            Some(CycleOutcome::Failed { error, .. }) => Err(SessionError::Failed(error)),
            None => Err(SessionError::WorkerGone),
        }
    }

    /// Redraws the last payload at a new size.
    pub async fn resize(&self, size: ChartSize) -> Result<Frame, SessionError> {
        self.renderer
            .lock()
            .await
            .resize(size)
            .ok_or(SessionError::NotRendered)
    }

    pub async fn guide(&self, pointer_x: f64) -> Result<Vec<GuideDot>, SessionError> {
        let renderer = self.renderer.lock().await;
        if renderer.payload().is_none() {
            return Err(SessionError::NotRendered);
        }
        Ok(renderer.guide(pointer_x))
    }

    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
        self.pump.abort();
    }
}

/// Moves worker events into the renderer. Events older than the latest dispatched cycle
/// are dropped without touching the frame.
async fn pump_events(
    mut events: mpsc::Receiver<WorkerEvent>,
    latest: Arc<AtomicU64>,
    renderer: Arc<Mutex<Renderer>>,
    outcomes: watch::Sender<Option<CycleOutcome>>,
) {
    while let Some(event) = events.recv().await {
        let cycle = event.cycle();
        if cycle < latest.load(Ordering::SeqCst) {
            tracing::debug!(cycle, "Dropping stale cycle result");
            continue;
        }

        let outcome = {
            let mut renderer = renderer.lock().await;
            match event {
                WorkerEvent::Payload { payload, size, .. } => {
                    renderer.set_size(size);
                    CycleOutcome::Drawn {
                        cycle,
                        frame: renderer.redraw(payload),
                    }
                }
                WorkerEvent::Failed { error, .. } => {
                    renderer.mark_failed();
                    CycleOutcome::Failed { cycle, error }
                }
            }
        };

        if outcomes.send(Some(outcome)).is_err() {
            break;
        }
    }
}
