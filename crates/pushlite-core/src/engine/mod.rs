//! Lifecycle coordinator
//!
//! The LifecycleCoordinator is responsible for:
//! - Turning host lifecycle signals into launch pings and close events
//! - Applying profile mutations and debouncing the registration they need
//! - Persisting close events before sending them and replaying them on launch
//! - Holding a background-execution token while a close event is in flight
//!
//! ## Architecture
//!
//! ```text
//!  PushLite handles ── Command ──┐
//!                                ▼
//!                      ┌────────────────────┐
//!  network tasks ───── │ LifecycleCoordinator│ ──── SyncEvent ──▶ monitoring
//!   (Completion)       └────────────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//! ┌──────────────┐      ┌─────────────────┐      ┌──────────────┐
//! │ Profile store│      │ MutationBatcher │      │ DeliveryQueue│
//! └──────────────┘      └─────────────────┘      └──────────────┘
//! ```
//!
//! ## Serialization
//!
//! All state lives on one task. Network calls are spawned so they never
//! block the task, and their outcomes come back as [`Completion`] messages
//! on a channel the task owns. Nothing outside the task touches the profile
//! or the queue.

mod command;
mod handle;

pub use handle::PushLite;

use chrono::Utc;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::batcher::MutationBatcher;
use crate::config::{AppConfig, PushLiteConfig};
use crate::delivery::DeliveryQueue;
use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use crate::event::CloseEvent;
use crate::profile::DeviceProfileStore;
use crate::push::PushContext;
use crate::registration::RegistrationPayload;
use crate::traits::{BackgroundExecution, BackgroundTaskId, KeyValueStore, SyncClient};

use command::{Command, Completion, Mutation};

/// Name under which the grace token is requested from the host
const GRACE_TASK_NAME: &str = "pushlite.close-event";

/// Process lifecycle transitions reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    /// App is about to enter the foreground
    Foreground,
    /// App finished launching
    Launched,
    /// App moved to the background
    Background,
    /// Process is about to exit
    Terminating,
}

impl FromStr for LifecycleSignal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "foreground" => Ok(Self::Foreground),
            "launched" => Ok(Self::Launched),
            "background" => Ok(Self::Background),
            "terminate" | "terminating" => Ok(Self::Terminating),
            other => Err(Error::invalid_input(format!(
                "unknown lifecycle signal: {}",
                other
            ))),
        }
    }
}

/// Events emitted by the LifecycleCoordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Coordinator started
    Started,

    /// Launch ping finished
    LaunchTracked { delivered: bool },

    /// Close event persisted and handed to the sync client
    CloseQueued { event: CloseEvent },

    /// Pending close event from an earlier session is being resent
    CloseReplayed { event: CloseEvent },

    /// Close event acknowledged by the remote service
    CloseDelivered {
        replay: bool,
        /// Whether the pending slot was cleared (false if superseded)
        cleared: bool,
    },

    /// Close event not delivered; it stays pending
    CloseDeliveryFailed { replay: bool, error: String },

    /// Registration sync started
    RegistrationStarted,

    /// Registration accepted
    RegistrationSucceeded,

    /// Registration failed; dirty flag re-armed
    RegistrationFailed { error: String },

    /// Background-execution token acquired
    GraceStarted,

    /// Background-execution token released
    GraceReleased { expired: bool },

    /// Coordinator stopped
    Stopped { reason: String },
}

/// Background-execution token held while a close event is in flight
#[derive(Debug)]
struct Grace {
    id: BackgroundTaskId,
    deadline: Instant,
    event: CloseEvent,
}

/// The device-side sync coordinator
///
/// ## Lifecycle
///
/// 1. Create with [`LifecycleCoordinator::new()`]
/// 2. Take one or more [`PushLite`] handles with [`handle()`](Self::handle)
/// 3. Drive it with [`run()`](Self::run) (or [`spawn()`](Self::spawn))
/// 4. It stops on [`PushLite::shutdown()`], or once every handle is dropped
///    and no network call is outstanding
///
/// The store is flushed before `run()` returns.
pub struct LifecycleCoordinator {
    actor: Actor,
    commands: mpsc::Sender<Command>,
    grace: watch::Receiver<bool>,
}

impl LifecycleCoordinator {
    /// Create a new coordinator
    ///
    /// # Parameters
    ///
    /// - `config`: validated before anything else
    /// - `store`: durable storage for the device profile
    /// - `client`: the remote API
    /// - `background`: the host's background-execution hook
    ///
    /// # Returns
    ///
    /// A tuple of (coordinator, event_receiver) where event_receiver yields
    /// [`SyncEvent`]s
    pub fn new(
        config: PushLiteConfig,
        store: Arc<dyn KeyValueStore>,
        client: Arc<dyn SyncClient>,
        background: Arc<dyn BackgroundExecution>,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let PushLiteConfig {
            app,
            device,
            engine,
            ..
        } = config;

        let (event_tx, event_rx) = mpsc::channel(engine.event_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(engine.command_channel_capacity);
        let (completion_tx, completion_rx) = mpsc::channel(engine.command_channel_capacity);
        let (grace_tx, grace_rx) = watch::channel(false);

        let profile = DeviceProfileStore::new(store.clone(), engine.namespace.clone());

        let actor = Actor {
            app,
            device,
            grace_period: engine.grace_period(),
            delivery: DeliveryQueue::new(profile.clone()),
            profile,
            store,
            client,
            background,
            batcher: MutationBatcher::new(engine.quiet_period()),
            launched_this_session: false,
            grace: None,
            grace_tx,
            commands: command_rx,
            completion_tx,
            completions: completion_rx,
            outstanding: 0,
            event_tx,
        };

        let coordinator = Self {
            actor,
            commands: command_tx,
            grace: grace_rx,
        };

        Ok((coordinator, event_rx))
    }

    /// A new handle to this coordinator
    pub fn handle(&self) -> PushLite {
        PushLite::new(self.commands.clone(), self.grace.clone())
    }

    /// Run the coordinator until it stops
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean stop, store flushed
    /// - `Err(Error)`: The final store flush failed
    pub async fn run(self) -> Result<()> {
        let Self {
            actor,
            commands,
            grace,
        } = self;
        // The coordinator's own sender must not keep the command channel open
        drop(commands);
        drop(grace);
        actor.run().await
    }

    /// Spawn the coordinator on the current runtime and return a handle to it
    pub fn spawn(self) -> (PushLite, JoinHandle<Result<()>>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }
}

struct Actor {
    app: AppConfig,
    device: DeviceInfo,
    grace_period: Duration,
    profile: DeviceProfileStore,
    store: Arc<dyn KeyValueStore>,
    client: Arc<dyn SyncClient>,
    background: Arc<dyn BackgroundExecution>,
    batcher: MutationBatcher,
    delivery: DeliveryQueue,

    /// Guards against counting one launch twice when the host reports both
    /// `Foreground` and `Launched`
    launched_this_session: bool,

    grace: Option<Grace>,
    grace_tx: watch::Sender<bool>,

    commands: mpsc::Receiver<Command>,
    completion_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,

    /// Network calls spawned and not yet reported back
    outstanding: usize,

    event_tx: mpsc::Sender<SyncEvent>,
}

impl Actor {
    async fn run(mut self) -> Result<()> {
        info!(
            "PushLite coordinator started (client: {})",
            self.client.client_name()
        );
        self.emit_event(SyncEvent::Started);

        let mut handles_open = true;
        let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

        let reason = loop {
            if !handles_open && self.outstanding == 0 {
                break "all handles dropped";
            }

            let debounce = self.batcher.deadline();
            let grace_deadline = self.grace.as_ref().map(|grace| grace.deadline);

            tokio::select! {
                command = self.commands.recv(), if handles_open => match command {
                    Some(command) => {
                        if let Some(reply) = self.handle_command(command).await {
                            shutdown_reply = Some(reply);
                            break "shutdown requested";
                        }
                    }
                    None => {
                        debug!(
                            "All handles dropped, waiting for {} outstanding call(s)",
                            self.outstanding
                        );
                        handles_open = false;
                    }
                },

                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion).await;
                }

                _ = sleep_until_deadline(debounce) => {
                    trace!("Quiet period elapsed");
                    if self.batcher.on_timer() {
                        self.start_registration().await;
                    }
                }

                _ = sleep_until_deadline(grace_deadline) => {
                    warn!("Grace period expired with close event still in flight");
                    self.release_grace(true);
                }
            }
        };

        self.release_grace(false);

        // Flush state before exiting
        let flushed = self.store.flush().await;
        info!("PushLite coordinator stopped: {}", reason);
        self.emit_event(SyncEvent::Stopped {
            reason: reason.to_string(),
        });

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        flushed
    }

    /// Handle one request; returns the reply channel if it was a shutdown
    async fn handle_command(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::Signal { signal, reply } => {
                debug!("Lifecycle signal: {:?}", signal);
                match signal {
                    LifecycleSignal::Foreground | LifecycleSignal::Launched => {
                        self.on_launch().await
                    }
                    LifecycleSignal::Background => self.on_background().await,
                    LifecycleSignal::Terminating => self.on_terminate().await,
                }
                let _ = reply.send(());
            }
            Command::PushReceived { metadata, reply } => {
                debug!("Session attributed to push (request: {:?})", metadata.request_id);
                self.profile
                    .set_push_context(&PushContext::from(metadata))
                    .await;
                let _ = reply.send(());
            }
            Command::Mutate { mutation, reply } => {
                self.apply_mutation(mutation).await;
                let _ = reply.send(());
            }
            Command::DeviceId { reply } => {
                let _ = reply.send(self.profile.device_id().await);
            }
            Command::Attributes { reply } => {
                let _ = reply.send(self.profile.attributes().await);
            }
            Command::Tags { reply } => {
                let _ = reply.send(self.profile.tags().await);
            }
            Command::PendingCloseEvent { reply } => {
                let _ = reply.send(self.delivery.pending().await);
            }
            Command::Shutdown { reply } => return Some(reply),
        }
        None
    }

    async fn apply_mutation(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::SetAttributes(update) => {
                let mut attributes = self.profile.attributes().await;
                attributes.extend(update);
                self.profile.set_attributes(&attributes).await;
            }
            Mutation::SetAttribute { key, value } => {
                let mut attributes = self.profile.attributes().await;
                match value {
                    Some(value) => {
                        attributes.insert(key, value);
                    }
                    None => {
                        attributes.remove(&key);
                    }
                }
                self.profile.set_attributes(&attributes).await;
            }
            Mutation::AddTag(tag) => {
                let mut tags = self.profile.tags().await;
                tags.push(tag);
                self.profile.set_tags(&tags).await;
            }
            Mutation::RemoveTag(tag) => {
                let mut tags = self.profile.tags().await;
                tags.retain(|existing| *existing != tag);
                self.profile.set_tags(&tags).await;
            }
            Mutation::SetDeviceToken(token) => self.profile.set_device_token(&token).await,
            Mutation::SetEnablePush(enabled) => self.profile.set_push_enabled(enabled).await,
        }

        self.batcher.mark_dirty(Instant::now());
    }

    async fn on_launch(&mut self) {
        if self.launched_this_session {
            debug!("Launch already tracked for this session");
            return;
        }
        self.launched_this_session = true;

        self.profile.set_last_launched_at(Some(Utc::now())).await;
        self.profile.set_push_context(&PushContext::default()).await;

        let device_id = self.profile.device_id().await;
        let client = self.client.clone();
        self.spawn_call(async move {
            Completion::Launch {
                result: client.app_launch(&device_id).await,
            }
        });

        if let Some(event) = self.delivery.take_replay().await {
            info!("Replaying undelivered close event from {}", event.event_date);
            self.emit_event(SyncEvent::CloseReplayed {
                event: event.clone(),
            });
            self.send_close(event, true);
        }
    }

    async fn on_background(&mut self) {
        self.launched_this_session = false;
        self.track_close().await;

        if self.batcher.flush() {
            self.start_registration().await;
        }
    }

    /// Terminate skips the registration flush
    async fn on_terminate(&mut self) {
        self.track_close().await;
    }

    async fn track_close(&mut self) {
        let now = Utc::now();
        let device_id = self.profile.device_id().await;
        let seconds = self.profile.seconds_since_last_launch(now).await;
        let push = self.profile.push_context().await;
        let event = CloseEvent::new(&self.app.app_id, &device_id, seconds, &push, now);

        self.begin_grace(&event);
        let event = self.delivery.enqueue(event).await;
        debug!("Close event queued after {}s", event.value);
        self.emit_event(SyncEvent::CloseQueued {
            event: event.clone(),
        });
        self.send_close(event, false);
    }

    fn send_close(&mut self, event: CloseEvent, replay: bool) {
        let client = self.client.clone();
        self.spawn_call(async move {
            let result = client.track_close(&event).await;
            Completion::Close {
                event,
                replay,
                result,
            }
        });
    }

    async fn start_registration(&mut self) {
        let snapshot = self.profile.snapshot().await;
        let payload = RegistrationPayload::build(&self.app, &self.device, &snapshot, Utc::now());

        debug!(
            "Registering {} tag(s), {} attribute(s)",
            payload.tags.len(),
            payload.attributes.len()
        );
        self.emit_event(SyncEvent::RegistrationStarted);

        let client = self.client.clone();
        self.spawn_call(async move {
            Completion::Registration {
                result: client.register(&payload).await,
            }
        });
    }

    /// Run a network call off the coordinator task
    fn spawn_call<F>(&mut self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completions = self.completion_tx.clone();
        self.outstanding += 1;
        tokio::spawn(async move {
            let completion = call.await;
            if completions.send(completion).await.is_err() {
                debug!("Coordinator stopped before call completed");
            }
        });
    }

    async fn handle_completion(&mut self, completion: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);

        match completion {
            Completion::Launch { result } => {
                let delivered = match result {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Launch ping failed: {}", e);
                        false
                    }
                };
                self.emit_event(SyncEvent::LaunchTracked { delivered });
            }

            Completion::Close {
                event,
                replay,
                result,
            } => {
                let delivered = result.is_ok();
                let cleared = self.delivery.acknowledge(&event, delivered).await;
                match result {
                    Ok(()) => {
                        info!("Close event delivered");
                        self.emit_event(SyncEvent::CloseDelivered { replay, cleared });
                    }
                    Err(e) => {
                        warn!("Close event delivery failed, keeping it pending: {}", e);
                        self.emit_event(SyncEvent::CloseDeliveryFailed {
                            replay,
                            error: e.to_string(),
                        });
                    }
                }

                if self
                    .grace
                    .as_ref()
                    .is_some_and(|grace| grace.event == event)
                {
                    self.release_grace(false);
                }
            }

            Completion::Registration { result } => {
                let success = match result {
                    Ok(()) => {
                        info!("Registration succeeded");
                        self.emit_event(SyncEvent::RegistrationSucceeded);
                        true
                    }
                    Err(e) => {
                        warn!("Registration failed, will retry on next change: {}", e);
                        self.emit_event(SyncEvent::RegistrationFailed {
                            error: e.to_string(),
                        });
                        false
                    }
                };

                if self.batcher.on_complete(success) {
                    self.start_registration().await;
                }
            }
        }
    }

    /// Acquire a grace token for `event`, ending any token already held
    fn begin_grace(&mut self, event: &CloseEvent) {
        if let Some(previous) = self.grace.take() {
            debug!("Replacing grace token {:?}", previous.id);
            self.background.end(previous.id);
            self.emit_event(SyncEvent::GraceReleased { expired: false });
        }

        let id = self.background.begin(GRACE_TASK_NAME);
        self.grace = Some(Grace {
            id,
            deadline: Instant::now() + self.grace_period,
            event: event.clone(),
        });
        self.grace_tx.send_replace(true);
        self.emit_event(SyncEvent::GraceStarted);
    }

    /// Release the grace token if one is held
    ///
    /// Expiry does not cancel the send; a late success still clears the
    /// pending event.
    fn release_grace(&mut self, expired: bool) {
        if let Some(grace) = self.grace.take() {
            self.background.end(grace.id);
            self.grace_tx.send_replace(false);
            self.emit_event(SyncEvent::GraceReleased { expired });
        }
    }

    /// Emit a monitoring event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
