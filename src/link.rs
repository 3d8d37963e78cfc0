//! Session-side halves of the two duplex links.
//!
//! Each link is a pair of channels. Whatever drives the socket (a transport task or a
//! test) holds the matching endpoint, and a single task owns each socket's write half,
//! so the session never writes to a socket directly.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{BridgeError, Result};
use crate::types::{OutboundMessage, UpstreamCommand, UpstreamEvent};

/// A frame received from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Binary(Bytes),
}

/// A frame queued for the client.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Message(OutboundMessage),
    Audio(Bytes),
    Close,
}

#[derive(Debug)]
pub struct ClientLink {
    inbound: mpsc::Receiver<InboundFrame>,
    outbound: mpsc::Sender<OutboundFrame>,
    closed: bool,
}

/// Transport side of a [`ClientLink`].
pub struct ClientEndpoint {
    pub inbound: mpsc::Sender<InboundFrame>,
    pub outbound: mpsc::Receiver<OutboundFrame>,
}

impl ClientLink {
    pub fn channel(capacity: usize) -> (ClientLink, ClientEndpoint) {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (
            ClientLink {
                inbound: in_rx,
                outbound: out_tx,
                closed: false,
            },
            ClientEndpoint {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    /// Next frame from the client; `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<InboundFrame> {
        self.inbound.recv().await
    }

    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        if self.closed {
            return Err(BridgeError::LinkClosed("client"));
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| BridgeError::LinkClosed("client"))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queues a close frame. Returns `false` if the link was already closed.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.inbound.close();
        // The writer may already be gone with the socket; nothing left to tell it then.
        let _ = self.outbound.send(OutboundFrame::Close).await;
        true
    }
}

#[derive(Debug)]
pub struct UpstreamLink {
    commands: mpsc::Sender<UpstreamCommand>,
    events: mpsc::Receiver<UpstreamEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Transport side of an [`UpstreamLink`].
pub struct UpstreamEndpoint {
    pub commands: mpsc::Receiver<UpstreamCommand>,
    pub events: mpsc::Sender<UpstreamEvent>,
    /// Fires once when the session closes the link.
    pub shutdown: oneshot::Receiver<()>,
}

impl UpstreamLink {
    pub fn channel(capacity: usize) -> (UpstreamLink, UpstreamEndpoint) {
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (evt_tx, evt_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            UpstreamLink {
                commands: cmd_tx,
                events: evt_rx,
                shutdown: Some(shutdown_tx),
                tasks: Vec::new(),
            },
            UpstreamEndpoint {
                commands: cmd_rx,
                events: evt_tx,
                shutdown: shutdown_rx,
            },
        )
    }

    /// Ties a transport task to the link so that `close` can wait for it.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub async fn send(&self, command: UpstreamCommand) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::LinkClosed("upstream"));
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| BridgeError::LinkClosed("upstream"))
    }

    /// Next event from the service; `None` once the transport is gone.
    pub async fn next_event(&mut self) -> Option<UpstreamEvent> {
        self.events.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }

    /// Asks the transport to close and waits up to `grace` for its tasks before
    /// aborting them. Returns `false` if the link was already closed.
    pub async fn close(&mut self, grace: Duration) -> bool {
        let Some(shutdown) = self.shutdown.take() else {
            return false;
        };
        let _ = shutdown.send(());
        self.events.close();

        let deadline = tokio::time::Instant::now() + grace;
        for task in self.tasks.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout_at(deadline, task).await.is_err() {
                tracing::warn!("upstream transport did not finish within {:?}, aborting", grace);
                abort.abort();
            }
        }
        true
    }
}

impl Drop for UpstreamLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
