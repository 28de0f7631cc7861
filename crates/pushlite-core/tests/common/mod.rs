//! Test doubles and common utilities for behavioral contract tests
//!
//! The doubles record every call and answer from a script, so tests can
//! assert exactly which network calls the coordinator made and when.

#![allow(dead_code)]

use pushlite_core::error::{Error, Result};
use pushlite_core::traits::{BackgroundExecution, BackgroundTaskId, KeyValueStore, SyncClient};
use pushlite_core::{
    AppConfig, CloseEvent, LifecycleCoordinator, PushLite, PushLiteConfig, RegistrationPayload,
    SyncEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Quiet period used by every test configuration
pub const QUIET: Duration = Duration::from_secs(5);

/// Grace period used by every test configuration
pub const GRACE: Duration = Duration::from_secs(25);

/// A SyncClient that records calls and replays scripted outcomes
///
/// Outcomes are popped per call; once a script runs dry every call succeeds.
/// Gated calls block until the test releases a permit. Clones share state.
#[derive(Clone, Default)]
pub struct MockSyncClient {
    launch_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
    register_calls: Arc<AtomicUsize>,
    close_outcomes: Arc<Mutex<VecDeque<bool>>>,
    register_outcomes: Arc<Mutex<VecDeque<bool>>>,
    closes: Arc<Mutex<Vec<CloseEvent>>>,
    registrations: Arc<Mutex<Vec<RegistrationPayload>>>,
    close_gate: Option<Arc<Semaphore>>,
    register_gate: Option<Arc<Semaphore>>,
}

impl MockSyncClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close deliveries block until [`release_closes`](Self::release_closes)
    pub fn with_gated_closes(mut self) -> Self {
        self.close_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Registrations block until [`release_registrations`](Self::release_registrations)
    pub fn with_gated_registrations(mut self) -> Self {
        self.register_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Script the next close deliveries (`false` = failure)
    pub fn script_closes(&self, outcomes: &[bool]) {
        self.close_outcomes.lock().unwrap().extend(outcomes);
    }

    /// Script the next registrations (`false` = failure)
    pub fn script_registrations(&self, outcomes: &[bool]) {
        self.register_outcomes.lock().unwrap().extend(outcomes);
    }

    pub fn release_closes(&self, count: usize) {
        if let Some(gate) = &self.close_gate {
            gate.add_permits(count);
        }
    }

    pub fn release_registrations(&self, count: usize) {
        if let Some(gate) = &self.register_gate {
            gate.add_permits(count);
        }
    }

    pub fn launch_calls(&self) -> usize {
        self.launch_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Every close event sent, in call order
    pub fn closes(&self) -> Vec<CloseEvent> {
        self.closes.lock().unwrap().clone()
    }

    /// Every registration payload sent, in call order
    pub fn registrations(&self) -> Vec<RegistrationPayload> {
        self.registrations.lock().unwrap().clone()
    }

    async fn pass(gate: &Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate open").forget();
        }
    }

    fn next_outcome(script: &Mutex<VecDeque<bool>>) -> bool {
        script.lock().unwrap().pop_front().unwrap_or(true)
    }
}

#[async_trait::async_trait]
impl SyncClient for MockSyncClient {
    async fn app_launch(&self, _device_id: &str) -> Result<()> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn track_close(&self, event: &CloseEvent) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closes.lock().unwrap().push(event.clone());
        Self::pass(&self.close_gate).await;

        if Self::next_outcome(&self.close_outcomes) {
            Ok(())
        } else {
            Err(Error::status("track_close", 503))
        }
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.registrations.lock().unwrap().push(payload.clone());
        Self::pass(&self.register_gate).await;

        if Self::next_outcome(&self.register_outcomes) {
            Ok(())
        } else {
            Err(Error::status("register", 500))
        }
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A BackgroundExecution host that records token begin/end calls
#[derive(Clone, Default)]
pub struct RecordingBackground {
    next_id: Arc<AtomicU64>,
    begun: Arc<Mutex<Vec<BackgroundTaskId>>>,
    ended: Arc<Mutex<Vec<BackgroundTaskId>>>,
}

impl RecordingBackground {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begun(&self) -> Vec<BackgroundTaskId> {
        self.begun.lock().unwrap().clone()
    }

    pub fn ended(&self) -> Vec<BackgroundTaskId> {
        self.ended.lock().unwrap().clone()
    }

    /// Tokens begun and not yet ended
    pub fn active(&self) -> usize {
        self.begun().len() - self.ended().len()
    }
}

impl BackgroundExecution for RecordingBackground {
    fn begin(&self, _name: &str) -> BackgroundTaskId {
        let id = BackgroundTaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.begun.lock().unwrap().push(id);
        id
    }

    fn end(&self, id: BackgroundTaskId) {
        self.ended.lock().unwrap().push(id);
    }
}

/// Configuration with the test quiet and grace periods
pub fn test_config() -> PushLiteConfig {
    let mut config = PushLiteConfig::new(AppConfig::new(
        "test-app",
        "test-token",
        "https://device.example.com",
    ));
    config.engine.quiet_period_ms = QUIET.as_millis() as u64;
    config.engine.grace_period_secs = GRACE.as_secs();
    config.engine.namespace = "test".to_string();
    config
}

/// A running coordinator plus the channels a test needs to observe it
pub struct Harness {
    pub handle: PushLite,
    pub events: mpsc::Receiver<SyncEvent>,
    pub task: JoinHandle<Result<()>>,
}

impl Harness {
    pub fn start(
        store: Arc<dyn KeyValueStore>,
        client: &MockSyncClient,
        background: &RecordingBackground,
    ) -> Self {
        let (coordinator, events) = LifecycleCoordinator::new(
            test_config(),
            store,
            Arc::new(client.clone()),
            Arc::new(background.clone()),
        )
        .expect("coordinator construction succeeds");

        let (handle, task) = coordinator.spawn();
        Self {
            handle,
            events,
            task,
        }
    }

    /// Receive events until one matches `predicate`
    ///
    /// Under a paused clock the runtime auto-advances while this waits, so
    /// pending debounce and grace deadlines fire in order.
    pub async fn wait_for(&mut self, predicate: impl Fn(&SyncEvent) -> bool) -> SyncEvent {
        wait_for_event(&mut self.events, predicate).await
    }

    /// Shut down and wait for the task to finish
    pub async fn stop(self) {
        self.handle.shutdown().await.expect("shutdown succeeds");
        self.task
            .await
            .expect("coordinator task completes")
            .expect("coordinator stops cleanly");
    }
}

/// Receive events until one matches `predicate`
pub async fn wait_for_event(
    events: &mut mpsc::Receiver<SyncEvent>,
    predicate: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
