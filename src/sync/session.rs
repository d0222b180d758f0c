//! Async session driver.
//!
//! One task per open project. Local edits, flush/snapshot requests and remote
//! snapshots all arrive on this task, which owns the [`SyncPolicy`] and the
//! only in-flight write. Hosts talk to it through a cloneable [`SyncSession`]
//! handle, watch the current project on a `watch` channel, and read
//! [`SyncEvent`]s from an unbounded receiver.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::config::SyncConfig;
use super::policy::{DiscardReason, RemoteOutcome, SyncPolicy};
use crate::error::{CreativeError, CreativeResult};
use crate::project::{Project, ProjectId, ProjectManager};
use crate::store::{DocumentStore, StoreError, Subscription};

type ReplicaEdit = Box<dyn FnOnce(&mut ProjectManager) -> CreativeResult<()> + Send>;
type WriteFuture = Pin<Box<dyn Future<Output = (DateTime<Utc>, Result<(), StoreError>)> + Send>>;

/// Receiver for session events.
pub type SyncEvents = mpsc::UnboundedReceiver<SyncEvent>;

/// Something the session did that the host may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A write was acknowledged.
    Persisted { last_edited: DateTime<Utc> },
    /// A write failed after the whole retry schedule; edits stay pending.
    WriteFailed { error: StoreError, attempts: usize },
    RemoteApplied,
    RemoteDiscarded(DiscardReason),
    RemoteRejected { reason: String },
    SubscriptionFailed(StoreError),
    /// The local project could not be encoded for writing; edits stay pending.
    EncodeFailed { reason: String },
}

enum SessionCommand {
    Edit {
        edit: ReplicaEdit,
        reply: oneshot::Sender<CreativeResult<()>>,
    },
    Flush {
        reply: oneshot::Sender<CreativeResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<CreativeResult<Project>>,
    },
    Shutdown {
        reply: oneshot::Sender<CreativeResult<()>>,
    },
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a running sync session.
#[derive(Clone)]
pub struct SyncSession {
    id: ProjectId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<Project>,
}

impl SyncSession {
    /// Reads the project, subscribes to its snapshots and starts the session
    /// task on the current runtime.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        id: ProjectId,
        config: SyncConfig,
    ) -> CreativeResult<(Self, SyncEvents)> {
        let document = store.read_project(&id).await?;
        let policy = SyncPolicy::from_document(&document, &config)?;
        let subscription = store.subscribe_project(&id).await?;
        Self::spawn(store, id, config, policy, subscription)
    }

    /// Stores `project` under a fresh id, then opens a session on it.
    pub async fn create(
        store: Arc<dyn DocumentStore>,
        project: Project,
        config: SyncConfig,
    ) -> CreativeResult<(Self, SyncEvents)> {
        let id = ProjectId::new();
        store
            .write_project(&id, project.to_document(), Utc::now())
            .await?;
        tracing::info!(project_id = %id, "created project");
        Self::open(store, id, config).await
    }

    fn spawn(
        store: Arc<dyn DocumentStore>,
        id: ProjectId,
        config: SyncConfig,
        mut policy: SyncPolicy,
        subscription: Subscription,
    ) -> CreativeResult<(Self, SyncEvents)> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(policy.project()?);

        let session_loop = SessionLoop {
            store,
            id: id.clone(),
            config,
            policy,
            state: state_tx,
            events: events_tx,
            attempts: 0,
            retry_at: None,
            failure: None,
            flush_waiters: Vec::new(),
            shutdown: None,
            closing: false,
        };
        tokio::spawn(session_loop.run(commands_rx, subscription));

        Ok((
            Self {
                id,
                commands: commands_tx,
                state: state_rx,
            },
            events_rx,
        ))
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    /// Receiver that sees every published project state.
    pub fn watch(&self) -> watch::Receiver<Project> {
        self.state.clone()
    }

    /// Last published project state.
    pub fn current(&self) -> Project {
        self.state.borrow().clone()
    }

    /// Edits the project. The write happens on the next persistence tick.
    pub async fn edit<F>(&self, f: F) -> CreativeResult<()>
    where
        F: FnOnce(&mut Project) -> CreativeResult<()> + Send + 'static,
    {
        self.edit_replica(move |replica| replica.try_update_state(f))
            .await
    }

    /// Edits through the replica (targeted field puts).
    pub async fn edit_replica<F>(&self, f: F) -> CreativeResult<()>
    where
        F: FnOnce(&mut ProjectManager) -> CreativeResult<()> + Send + 'static,
    {
        self.request(|reply| SessionCommand::Edit {
            edit: Box::new(f),
            reply,
        })
        .await
    }

    /// Writes pending edits now and waits until they are acknowledged.
    pub async fn flush(&self) -> CreativeResult<()> {
        self.request(|reply| SessionCommand::Flush { reply }).await
    }

    /// Current project, read from the session task.
    pub async fn snapshot(&self) -> CreativeResult<Project> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Persists pending edits, then stops the session task.
    pub async fn shutdown(self) -> CreativeResult<()> {
        self.request(|reply| SessionCommand::Shutdown { reply })
            .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<CreativeResult<T>>) -> SessionCommand,
    ) -> CreativeResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| CreativeError::SessionClosed)?;
        rx.await.map_err(|_| CreativeError::SessionClosed)?
    }
}

// =============================================================================
// SESSION LOOP
// =============================================================================

struct SessionLoop {
    store: Arc<dyn DocumentStore>,
    id: ProjectId,
    config: SyncConfig,
    policy: SyncPolicy,
    state: watch::Sender<Project>,
    events: mpsc::UnboundedSender<SyncEvent>,
    /// Failed attempts of the current write.
    attempts: usize,
    retry_at: Option<Instant>,
    /// Set when retries are exhausted or encoding fails; cleared by the next
    /// edit, flush or ack.
    failure: Option<CreativeError>,
    flush_waiters: Vec<oneshot::Sender<CreativeResult<()>>>,
    shutdown: Option<oneshot::Sender<CreativeResult<()>>>,
    closing: bool,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut subscription: Subscription,
    ) {
        let period = self.config.flush_interval();
        let mut tick = time::interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut write: Option<WriteFuture> = None;
        let mut commands_open = true;
        let mut subscription_open = true;

        tracing::info!(project_id = %self.id, "sync session started");

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command, &mut write),
                    None => {
                        // Every handle dropped: persist what we have, then stop.
                        commands_open = false;
                        self.closing = true;
                        self.start_write(&mut write);
                    }
                },
                (last_edited, result) = async {
                    match write.as_mut() {
                        Some(fut) => fut.await,
                        None => std::future::pending().await,
                    }
                } => {
                    write = None;
                    self.finish_write(last_edited, result, &mut write);
                }
                snapshot = subscription.next(), if subscription_open => match snapshot {
                    Some(Ok(document)) => {
                        let outcome = self.policy.receive_remote(document);
                        self.handle_remote(outcome);
                    }
                    Some(Err(err)) => {
                        tracing::warn!(project_id = %self.id, error = %err, "subscription error");
                        self.emit(SyncEvent::SubscriptionFailed(err));
                    }
                    None => {
                        tracing::warn!(project_id = %self.id, "subscription closed by store");
                        subscription_open = false;
                    }
                },
                _ = tick.tick() => self.start_write(&mut write),
                _ = time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.start_write(&mut write);
                }
            }

            self.resolve_flushes(&write);
            if self.closing && self.is_settled(&write) {
                break;
            }
        }

        let result = match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        if let Some(reply) = self.shutdown.take() {
            let _ = reply.send(result);
        }
        tracing::info!(project_id = %self.id, "sync session closed");
    }

    fn handle_command(&mut self, command: SessionCommand, write: &mut Option<WriteFuture>) {
        match command {
            SessionCommand::Edit { edit, reply } => {
                let result = self.policy.edit_replica(edit);
                if result.is_ok() {
                    self.failure = None;
                    self.publish();
                }
                let _ = reply.send(result);
            }
            SessionCommand::Flush { reply } => {
                self.failure = None;
                self.flush_waiters.push(reply);
                self.start_write(write);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.policy.project());
            }
            SessionCommand::Shutdown { reply } => {
                self.closing = true;
                self.shutdown = Some(reply);
                self.start_write(write);
            }
        }
    }

    /// Sends the current state if the policy has something to write.
    fn start_write(&mut self, write: &mut Option<WriteFuture>) {
        if write.is_some() || self.retry_at.is_some() || self.failure.is_some() {
            return;
        }
        match self.policy.begin_write(Utc::now()) {
            Ok(Some(pending)) => {
                let store = Arc::clone(&self.store);
                let id = self.id.clone();
                let last_edited = pending.last_edited;
                *write = Some(Box::pin(async move {
                    let result = store
                        .write_project(&id, pending.document, last_edited)
                        .await;
                    (last_edited, result)
                }));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(project_id = %self.id, error = %err, "failed to encode project");
                let reason = err.to_string();
                for waiter in self.flush_waiters.drain(..) {
                    let _ = waiter.send(Err(CreativeError::serialization(reason.clone())));
                }
                self.emit(SyncEvent::EncodeFailed { reason });
                self.failure = Some(err);
            }
        }
    }

    fn finish_write(
        &mut self,
        last_edited: DateTime<Utc>,
        result: Result<(), StoreError>,
        write: &mut Option<WriteFuture>,
    ) {
        match result {
            Ok(()) => {
                self.attempts = 0;
                self.failure = None;
                tracing::info!(project_id = %self.id, last_edited = %last_edited, "project persisted");
                let outcome = self.policy.complete_write(Ok(()));
                self.emit(SyncEvent::Persisted { last_edited });
                if let Some(outcome) = outcome {
                    self.handle_remote(outcome);
                }
                if self.closing || !self.flush_waiters.is_empty() {
                    self.start_write(write);
                }
            }
            Err(err) => {
                self.policy.complete_write(Err(err.clone()));
                match self.config.retry_delay(self.attempts) {
                    Some(delay) => {
                        self.attempts += 1;
                        tracing::warn!(
                            project_id = %self.id,
                            error = %err,
                            attempt = self.attempts,
                            delay_ms = delay.as_millis() as u64,
                            "write failed, retrying"
                        );
                        self.retry_at = Some(Instant::now() + delay);
                    }
                    None => {
                        let attempts = self.attempts + 1;
                        self.attempts = 0;
                        tracing::warn!(project_id = %self.id, error = %err, attempts, "write failed, giving up");
                        for waiter in self.flush_waiters.drain(..) {
                            let _ = waiter.send(Err(CreativeError::from(err.clone())));
                        }
                        self.emit(SyncEvent::WriteFailed {
                            error: err.clone(),
                            attempts,
                        });
                        self.failure = Some(CreativeError::from(err));
                    }
                }
            }
        }
    }

    fn handle_remote(&mut self, outcome: RemoteOutcome) {
        match outcome {
            RemoteOutcome::Applied => {
                tracing::info!(project_id = %self.id, "applied remote snapshot");
                self.publish();
                self.emit(SyncEvent::RemoteApplied);
            }
            RemoteOutcome::Queued => {
                tracing::debug!(project_id = %self.id, "queued remote snapshot");
            }
            RemoteOutcome::Discarded(reason) => {
                tracing::debug!(project_id = %self.id, ?reason, "discarded remote snapshot");
                self.emit(SyncEvent::RemoteDiscarded(reason));
            }
            RemoteOutcome::Rejected(err) => {
                self.emit(SyncEvent::RemoteRejected {
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Answers flush requests once nothing is pending or in flight.
    fn resolve_flushes(&mut self, write: &Option<WriteFuture>) {
        if self.flush_waiters.is_empty() || write.is_some() || self.policy.has_pending_changes() {
            return;
        }
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    /// True when closing can finish: nothing in flight, and either everything
    /// is persisted or retries are exhausted.
    fn is_settled(&mut self, write: &Option<WriteFuture>) -> bool {
        write.is_none()
            && self.retry_at.is_none()
            && (self.failure.is_some() || !self.policy.has_pending_changes())
    }

    fn publish(&mut self) {
        match self.policy.project() {
            Ok(project) => {
                self.state.send_replace(project);
            }
            Err(err) => {
                tracing::error!(project_id = %self.id, error = %err, "failed to read replica state");
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
