//! Uniform peer-connection capability shared by both link types.
//!
//! A link task owns the socket; the session holds a `PeerHandle` carrying
//! the link's command channel and a shared open flag. Sends to a vanished
//! peer fail softly — callers log and drop, they never tear the process
//! down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::mpsc;

pub struct PeerHandle<C> {
    tx: mpsc::Sender<C>,
    open: Arc<AtomicBool>,
}

impl<C> Clone for PeerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            open: self.open.clone(),
        }
    }
}

impl<C> PeerHandle<C> {
    pub fn new(tx: mpsc::Sender<C>, open: Arc<AtomicBool>) -> Self {
        Self { tx, open }
    }

    /// Whether the underlying connection is currently established.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Mark the peer closed; forwarding gates on `is_open` stop immediately.
    pub fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Queue an outbound command for the link task.
    pub async fn send(&self, command: C) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("peer connection is gone"))
    }
}

/// Build a command channel plus the open flag shared with the link task.
pub fn peer_channel<C>(
    capacity: usize,
    open_initially: bool,
) -> (PeerHandle<C>, mpsc::Receiver<C>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel(capacity);
    let open = Arc::new(AtomicBool::new(open_initially));
    (
        PeerHandle {
            tx,
            open: open.clone(),
        },
        rx,
        open,
    )
}
