// Background render worker - runs fetch cycles off the interactive path
use crate::application::errors::{FetchError, SessionError};
use crate::application::fetch_coordinator::{CycleContext, FetchCoordinator, RenderRequest};
use crate::application::renderer::ChartSize;
use crate::domain::payload::RenderPayload;
use futures::future::{AbortHandle, Abortable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
pub enum WorkerCommand {
    /// Start a fetch cycle, cancelling whatever cycle is still in flight. The payload is
    /// drawn at `size`.
    Render {
        cycle: u64,
        request: RenderRequest,
        size: ChartSize,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Payload {
        cycle: u64,
        payload: Arc<RenderPayload>,
        size: ChartSize,
    },
    Failed {
        cycle: u64,
        error: String,
    },
}

impl WorkerEvent {
    pub fn cycle(&self) -> u64 {
        match self {
            WorkerEvent::Payload { cycle, .. } | WorkerEvent::Failed { cycle, .. } => *cycle,
        }
    }
}

pub struct RenderWorker {
    coordinator: FetchCoordinator,
    events: mpsc::Sender<WorkerEvent>,
    inflight: Option<AbortHandle>,
    /// Highest cycle id started so far.
    newest: u64,
}

impl RenderWorker {
    /// Spawns a worker task. Events for every finished cycle arrive on the returned receiver.
    pub fn spawn(coordinator: FetchCoordinator) -> (WorkerHandle, mpsc::Receiver<WorkerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let worker = RenderWorker {
            coordinator,
            events: event_tx,
            inflight: None,
            newest: 0,
        };
        tokio::spawn(worker.run(command_rx));

        let handle = WorkerHandle {
            commands: Mutex::new(command_tx),
            latest: Arc::new(AtomicU64::new(0)),
        };
        (handle, event_rx)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<WorkerCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::Render { cycle, .. } if cycle <= self.newest => {
                    tracing::debug!(cycle, newest = self.newest, "Ignoring out-of-order render");
                }
                WorkerCommand::Render {
                    cycle,
                    request,
                    size,
                } => self.start_cycle(cycle, request, size),
                WorkerCommand::Shutdown => break,
            }
        }
        self.cancel_inflight();
        tracing::debug!("Render worker stopped");
    }

    fn cancel_inflight(&mut self) {
        if let Some(previous) = self.inflight.take() {
            previous.abort();
        }
    }

    fn start_cycle(&mut self, cycle: u64, request: RenderRequest, size: ChartSize) {
        self.cancel_inflight();
        self.newest = cycle;

        let (abort, registration) = AbortHandle::new_pair();
        let coordinator = self.coordinator.clone();
        let cycle_abort = abort.clone();

        let work = tokio::spawn(async move {
            let now = chrono::Utc::now().timestamp();
            let context = CycleContext::new(cycle, &request, now, cycle_abort)?;
            Abortable::new(coordinator.run_cycle(&context, &request), registration)
                .await
                .unwrap_or(Err(FetchError::Cancelled))
        });

        // a panicking cycle still has to answer its caller
        let events = self.events.clone();
        let supervised = abort.clone();
        tokio::spawn(async move {
            let event = match work.await {
                Ok(Ok(payload)) => WorkerEvent::Payload {
                    cycle,
                    payload: Arc::new(payload),
                    size,
                },
                Ok(Err(FetchError::Cancelled)) => {
                    tracing::debug!(cycle, "Fetch cycle superseded");
                    return;
                }
                Ok(Err(e)) => {
                    tracing::error!(cycle, "Fetch cycle failed: {}", e);
                    WorkerEvent::Failed {
                        cycle,
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    tracing::error!(cycle, "Fetch cycle task died: {}", e);
                    WorkerEvent::Failed {
                        cycle,
                        error: format!("fetch cycle did not complete: {e}"),
                    }
                }
            };

            // a cycle cancelled after finishing its work still must not emit
            if supervised.is_aborted() {
                return;
            }
            let _ = events.send(event).await;
        });

        self.inflight = Some(abort);
    }
}

/// Sending side of a worker, held by the interactive context.
pub struct WorkerHandle {
    commands: Mutex<mpsc::Sender<WorkerCommand>>,
    latest: Arc<AtomicU64>,
}

impl WorkerHandle {
    /// Dispatches a new cycle and returns its id. Ids increase with every dispatch and reach
    /// the worker in that order.
    pub async fn render(&self, request: RenderRequest, size: ChartSize) -> Result<u64, SessionError> {
        let commands = self.commands.lock().await;
        let cycle = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        commands
            .send(WorkerCommand::Render {
                cycle,
                request,
                size,
            })
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        Ok(cycle)
    }

    /// Id of the most recently dispatched cycle, shared with the event consumer.
    pub fn latest_counter(&self) -> Arc<AtomicU64> {
        self.latest.clone()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.lock().await.send(WorkerCommand::Shutdown).await;
    }
}
