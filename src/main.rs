use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;

use callbridge_rs::config::Config;
use callbridge_rs::hangup::TwilioClient;
use callbridge_rs::media_link::MediaLink;
use callbridge_rs::model_link::ModelLink;
use callbridge_rs::peer::peer_channel;
use callbridge_rs::session::CallSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // 初始化日志
    env_logger::init();

    // 加载配置，凭证缺失时直接退出
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // 电话控制面客户端，进程级共享
    let twilio = Arc::new(TwilioClient::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_api_base.clone(),
    ));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    println!("Media stream relay listening on port {}", config.port);

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                println!("Received Ctrl+C, shutting down...");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        log::info!("Client connected from {}", addr);
                        let config = config.clone();
                        let twilio = twilio.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_call(stream, config, twilio).await {
                                log::warn!("Call ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => log::warn!("Accept failed: {}", e),
                }
            }
        }
    }
    Ok(())
}

/// Wire up one call: accept the telephony socket, dial the model, and run
/// the session until either side goes away.
async fn handle_call(
    stream: TcpStream,
    config: Arc<Config>,
    twilio: Arc<TwilioClient>,
) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;

    // 事件通道
    let (tx_stream_event, rx_stream_event) = mpsc::channel(100);
    let (tx_model_event, rx_model_event) = mpsc::channel(100);

    // 命令通道，附带open标志
    let (telephony, rx_stream_cmd, stream_open) = peer_channel(100, true);
    let (model, rx_model_cmd, model_open) = peer_channel(100, false);

    let media_link = MediaLink::new(ws, tx_stream_event, rx_stream_cmd, stream_open);
    tokio::spawn(media_link.run());

    let model_link = ModelLink::new(config.clone(), tx_model_event, rx_model_cmd, model_open);
    tokio::spawn(model_link.run());

    let session = CallSession::new(config, telephony, model, twilio);
    session.run(rx_stream_event, rx_model_event).await;
    Ok(())
}
