//! Messages into the coordinator task

use std::collections::BTreeMap;
use tokio::sync::oneshot;

use crate::event::CloseEvent;
use crate::push::PushMetadata;

use super::LifecycleSignal;

/// Local profile change that schedules a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mutation {
    /// Merge into the stored attributes
    SetAttributes(BTreeMap<String, String>),
    /// Set one attribute, or remove it when `value` is `None`
    SetAttribute { key: String, value: Option<String> },
    AddTag(String),
    /// Remove every occurrence of the tag
    RemoveTag(String),
    /// Hex-encoded push token
    SetDeviceToken(String),
    SetEnablePush(bool),
}

/// Requests from [`PushLite`](super::PushLite) handles
///
/// Every request carries a reply channel. The coordinator answers only after
/// the request's durable writes are committed.
#[derive(Debug)]
pub(crate) enum Command {
    Signal {
        signal: LifecycleSignal,
        reply: oneshot::Sender<()>,
    },
    PushReceived {
        metadata: PushMetadata,
        reply: oneshot::Sender<()>,
    },
    Mutate {
        mutation: Mutation,
        reply: oneshot::Sender<()>,
    },
    DeviceId {
        reply: oneshot::Sender<String>,
    },
    Attributes {
        reply: oneshot::Sender<BTreeMap<String, String>>,
    },
    Tags {
        reply: oneshot::Sender<Vec<String>>,
    },
    PendingCloseEvent {
        reply: oneshot::Sender<Option<CloseEvent>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Result of a network call, sent back from the task that made it
#[derive(Debug)]
pub(crate) enum Completion {
    Launch {
        result: crate::Result<()>,
    },
    Close {
        event: CloseEvent,
        replay: bool,
        result: crate::Result<()>,
    },
    Registration {
        result: crate::Result<()>,
    },
}
