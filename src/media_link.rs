//! The telephony peer: an accepted media-stream WebSocket.
//!
//! Inbound text frames parse into typed `StreamEvent`s for the session;
//! malformed frames are logged and dropped, the call continues. When the
//! socket closes, dropping the event sender tears the session down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, tungstenite::protocol::Message};

use crate::protocol::StreamEvent;

pub struct MediaLink {
    ws: WebSocketStream<TcpStream>,
    tx: mpsc::Sender<StreamEvent>,
    rx_cmd: mpsc::Receiver<StreamEvent>,
    open: Arc<AtomicBool>,
}

impl MediaLink {
    pub fn new(
        ws: WebSocketStream<TcpStream>,
        tx: mpsc::Sender<StreamEvent>,
        rx_cmd: mpsc::Receiver<StreamEvent>,
        open: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ws,
            tx,
            rx_cmd,
            open,
        }
    }

    pub async fn run(self) {
        let MediaLink {
            ws,
            tx,
            rx_cmd,
            open,
        } = self;
        let (write, read) = ws.split();

        if let Err(e) = pump(write, read, tx, rx_cmd).await {
            log::debug!("Media stream ended: {}", e);
        }
        open.store(false, Ordering::Relaxed);
    }
}

async fn pump(
    mut write: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut read: SplitStream<WebSocketStream<TcpStream>>,
    tx: mpsc::Sender<StreamEvent>,
    mut rx_cmd: mpsc::Receiver<StreamEvent>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<StreamEvent>(&text) {
                            Ok(event) => tx.send(event).await?,
                            Err(e) => log::debug!("Dropping unparseable stream event: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("Telephony peer closed the stream: {:?}", frame);
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
            cmd = rx_cmd.recv() => {
                match cmd {
                    Some(event) => {
                        let text = serde_json::to_string(&event)?;
                        write.send(Message::Text(text.into())).await?;
                    }
                    None => {
                        // 会话已结束，主动关闭连接
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}
