//! The speech-model peer: one outbound realtime WebSocket per call.
//!
//! Connection failure is reported to the session as `ModelEvent::Closed`,
//! never as a process fault. There is no reconnect: the link lives and dies
//! with its call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::config::Config;
use crate::realtime::{ClientEvent, ServerEvent};

#[derive(Debug)]
pub enum ModelEvent {
    Connected,
    Event(ServerEvent),
    Closed,
}

pub struct ModelLink {
    config: Arc<Config>,
    tx: mpsc::Sender<ModelEvent>,
    rx_cmd: mpsc::Receiver<ClientEvent>,
    open: Arc<AtomicBool>,
}

impl ModelLink {
    pub fn new(
        config: Arc<Config>,
        tx: mpsc::Sender<ModelEvent>,
        rx_cmd: mpsc::Receiver<ClientEvent>,
        open: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            tx,
            rx_cmd,
            open,
        }
    }

    /// Connect, then pump events both ways until either side goes away.
    pub async fn run(mut self) {
        if let Err(e) = self.connect_and_loop().await {
            log::warn!("Model connection ended: {}", e);
        }
        self.open.store(false, Ordering::Relaxed);
        let _ = self.tx.send(ModelEvent::Closed).await;
    }

    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        let ws_url = self.config.realtime_url();
        let url = Url::parse(&ws_url)?;
        let host = url.host_str().unwrap_or("api.openai.com");

        // 根据配置构建WebSocket请求，带Bearer认证
        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&ws_url)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header(
                "Authorization",
                format!("Bearer {}", self.config.openai_api_key),
            )
            .body(())?;

        log::info!("Connecting to realtime endpoint at {}...", host);
        let (ws_stream, _) = connect_async(request).await?;
        log::info!("Connected to the realtime API");

        self.open.store(true, Ordering::Relaxed);
        self.tx.send(ModelEvent::Connected).await?;

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(event) => self.tx.send(ModelEvent::Event(event)).await?,
                                Err(e) => log::warn!("Dropping malformed model event: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("Model closed the connection: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    }
                }
                cmd = self.rx_cmd.recv() => {
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
}
