//! Tokio event loop for one node.

use crate::network::{Transport, TransportError};
use crate::router::{MessageRouter, RouterError};
use citygate_core::{Action, Event, StateMachine, TimerId};
use citygate_node::NodeStateMachine;
use citygate_types::{Phase, ProcessId, ResourceId, Timestamp};
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Errors that stop a running node.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// A phase change observed on a running node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEvent {
    pub at: Instant,
    pub process: ProcessId,
    pub resource: Option<ResourceId>,
    pub from: Phase,
    pub to: Phase,
    pub clock: Timestamp,
}

/// Drives a [`NodeStateMachine`] from a transport and a wall-clock tick.
///
/// Each loop iteration waits for whichever comes first of an inbound batch and
/// the tick deadline. A due tick always runs before the next batch. Every
/// message of a batch is handled in arrival order.
pub struct ProductionRunner<T: Transport> {
    node: NodeStateMachine,
    router: MessageRouter<T>,
    tick_deadline: Option<Instant>,
    started: Instant,
    inbound_open: bool,
    observer: Option<mpsc::UnboundedSender<PhaseEvent>>,
}

impl<T: Transport> std::fmt::Debug for ProductionRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionRunner")
            .field("node", &self.node)
            .field("router", &self.router)
            .field("tick_deadline", &self.tick_deadline)
            .finish()
    }
}

impl<T: Transport> ProductionRunner<T> {
    /// Create a runner for `node` over `router`.
    pub fn new(node: NodeStateMachine, router: MessageRouter<T>) -> Self {
        Self {
            node,
            router,
            tick_deadline: None,
            started: Instant::now(),
            inbound_open: true,
            observer: None,
        }
    }

    /// Report every phase change on `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<PhaseEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the node.
    pub fn node(&self) -> &NodeStateMachine {
        &self.node
    }

    /// Run until the process is interrupted or a fatal error occurs.
    pub async fn run(self) -> Result<NodeStateMachine, RunnerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes or a fatal error occurs.
    ///
    /// Returns the node so callers can inspect its final state.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<NodeStateMachine, RunnerError> {
        let local = self.router.topology().local_process_id();
        info!(
            local = %local,
            num_processes = self.router.topology().num_processes(),
            num_resources = self.router.topology().num_resources(),
            "Starting node"
        );

        self.started = Instant::now();
        let startup = self.node.start();
        if let Err(e) = self.dispatch(startup).await {
            error!(local = %local, error = %e, "Node failed");
            return Err(e);
        }

        tokio::pin!(shutdown);
        loop {
            let deadline = self.tick_deadline;
            let inbound_open = self.inbound_open;

            let step = tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(local = %local, "Shutting down");
                    break;
                }

                // Ahead of inbound traffic so a busy peer cannot postpone ticks.
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.tick_deadline = None;
                    self.handle(Event::Tick).await
                }

                batch = self.router.recv_batch(), if inbound_open => {
                    self.on_batch(batch).await
                }
            };

            if let Err(e) = step {
                error!(local = %local, error = %e, "Node failed");
                return Err(e);
            }
        }

        Ok(self.node)
    }

    async fn on_batch(
        &mut self,
        batch: Result<Vec<citygate_messages::Message>, RouterError>,
    ) -> Result<(), RunnerError> {
        let messages = match batch {
            Ok(messages) => messages,
            Err(RouterError::Transport(TransportError::InboundClosed)) => {
                warn!("Every inbound link is closed, continuing on ticks only");
                self.inbound_open = false;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for message in messages {
            self.handle(Event::from_message(message)).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, event: Event) -> Result<(), RunnerError> {
        self.node.set_time(self.started.elapsed());
        let actions = self.node.handle(event);
        self.dispatch(actions).await
    }

    async fn dispatch(&mut self, actions: Vec<Action>) -> Result<(), RunnerError> {
        for action in actions {
            match action {
                Action::Send { to, message } => self.router.send(to, &message).await?,
                Action::Broadcast { message } => self.router.broadcast(&message).await?,
                Action::SetTimer {
                    id: TimerId::Tick,
                    duration,
                } => {
                    self.tick_deadline = Some(Instant::now() + duration);
                }
                Action::EmitPhaseChange {
                    process,
                    resource,
                    from,
                    to,
                    clock,
                } => {
                    info!(
                        process = %process,
                        resource = ?resource,
                        from = %from,
                        to = %to,
                        clock = %clock,
                        "Phase change"
                    );
                    if let Some(observer) = &self.observer {
                        let event = PhaseEvent {
                            at: Instant::now(),
                            process,
                            resource,
                            from,
                            to,
                            clock,
                        };
                        if observer.send(event).is_err() {
                            debug!("Phase observer dropped");
                            self.observer = None;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
