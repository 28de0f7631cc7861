//! Host-facing handle to a running coordinator

use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot, watch};

use crate::device::device_token_hex;
use crate::error::{Error, Result};
use crate::event::CloseEvent;
use crate::push::PushMetadata;

use super::LifecycleSignal;
use super::command::{Command, Mutation};

/// Cloneable handle to a [`LifecycleCoordinator`](super::LifecycleCoordinator)
///
/// Every call is a message to the coordinator task, so calls from any number
/// of clones are serialized. Mutations and signals return once their durable
/// writes are committed; the network calls they trigger run in the
/// background.
///
/// The only error is [`Error::EngineStopped`], returned when the coordinator
/// task is gone.
#[derive(Debug, Clone)]
pub struct PushLite {
    commands: mpsc::Sender<Command>,
    grace: watch::Receiver<bool>,
}

impl PushLite {
    pub(crate) fn new(commands: mpsc::Sender<Command>, grace: watch::Receiver<bool>) -> Self {
        Self { commands, grace }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::EngineStopped)?;
        response.await.map_err(|_| Error::EngineStopped)
    }

    async fn mutate(&self, mutation: Mutation) -> Result<()> {
        self.request(|reply| Command::Mutate { mutation, reply }).await
    }

    /// Stable identifier of this installation
    ///
    /// Generated on first call and returned unchanged afterwards.
    pub async fn device_identifier(&self) -> Result<String> {
        self.request(|reply| Command::DeviceId { reply }).await
    }

    pub async fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.request(|reply| Command::Attributes { reply }).await
    }

    /// Merge `attributes` into the stored ones
    pub async fn set_attributes(&self, attributes: BTreeMap<String, String>) -> Result<()> {
        self.mutate(Mutation::SetAttributes(attributes)).await
    }

    /// Set one attribute; `None` removes it
    pub async fn set_attribute(&self, key: impl Into<String>, value: Option<String>) -> Result<()> {
        self.mutate(Mutation::SetAttribute {
            key: key.into(),
            value,
        })
        .await
    }

    pub async fn tags(&self) -> Result<Vec<String>> {
        self.request(|reply| Command::Tags { reply }).await
    }

    /// Append a tag; duplicates are kept
    pub async fn add_tag(&self, tag: impl Into<String>) -> Result<()> {
        self.mutate(Mutation::AddTag(tag.into())).await
    }

    /// Remove every occurrence of `tag`
    pub async fn remove_tag(&self, tag: impl Into<String>) -> Result<()> {
        self.mutate(Mutation::RemoveTag(tag.into())).await
    }

    /// Store the raw push token handed out by the platform
    pub async fn set_device_token(&self, token: &[u8]) -> Result<()> {
        self.mutate(Mutation::SetDeviceToken(device_token_hex(token)))
            .await
    }

    pub async fn set_enable_push(&self, enabled: bool) -> Result<()> {
        self.mutate(Mutation::SetEnablePush(enabled)).await
    }

    /// Attribute the current session to a push notification
    pub async fn on_push_notification_received(&self, metadata: PushMetadata) -> Result<()> {
        self.request(|reply| Command::PushReceived { metadata, reply })
            .await
    }

    /// Deliver a lifecycle transition observed by the host
    pub async fn signal(&self, signal: LifecycleSignal) -> Result<()> {
        self.request(|reply| Command::Signal { signal, reply }).await
    }

    /// The close event awaiting delivery, if any
    pub async fn pending_close_event(&self) -> Result<Option<CloseEvent>> {
        self.request(|reply| Command::PendingCloseEvent { reply })
            .await
    }

    /// Wait until no background-execution token is held
    ///
    /// Returns immediately if none is held. A stopped coordinator holds no
    /// token.
    pub async fn wait_for_grace_release(&self) -> Result<()> {
        let mut grace = self.grace.clone();
        // Err means the coordinator is gone, which also releases the token
        let _ = grace.wait_for(|active| !*active).await;
        Ok(())
    }

    /// Stop the coordinator
    ///
    /// Returns after the store has been flushed. Calls that have not been
    /// acknowledged by the remote service stay pending and are replayed on
    /// the next launch. Stopping an already stopped coordinator is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(Error::EngineStopped) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
