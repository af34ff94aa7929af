use crate::error::{PluginError, Result};
use crate::event::{HostCommand, HostEvent, Registration};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Live link to the host application.
pub struct HostConnection {
    /// Decoded inbound events; closes when the host goes away.
    pub events: mpsc::Receiver<HostEvent>,
    /// Outbound commands.
    pub commands: mpsc::UnboundedSender<HostCommand>,
    writer: JoinHandle<()>,
}

impl HostConnection {
    /// Close the command channel and wait until everything queued is written.
    ///
    /// Other clones of `commands` must be dropped first or this waits for
    /// cancellation.
    pub async fn close(self) {
        let Self {
            commands, writer, ..
        } = self;
        drop(commands);
        let _ = writer.await;
    }
}

/// Connect to the host on `127.0.0.1:<port>` and register the plugin.
///
/// # Errors
/// Returns `PluginError::WebSocket` if the host is unreachable, or
/// `PluginError::Registration` if the registration frame cannot be sent.
pub async fn connect(
    port: u16,
    registration: &Registration,
    cancel: &CancellationToken,
) -> Result<HostConnection> {
    let url = format!("ws://127.0.0.1:{port}");
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let frame = serde_json::to_string(registration)?;
    sink.send(Message::Text(frame.into()))
        .await
        .map_err(|e| PluginError::Registration(e.to_string()))?;
    info!("registered with host at {url} as {}", registration.uuid);

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<HostCommand>();

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            // Queued commands are written before cancellation is honored.
            let command = tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(c) => c,
                    None => break,
                },
                () = writer_cancel.cancelled() => break,
            };
            let frame = match serde_json::to_string(&command) {
                Ok(f) => f,
                Err(e) => {
                    warn!("cannot encode host command: {e}");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                warn!("host send failed: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                () = reader_cancel.cancelled() => break,
                msg = stream.next() => msg,
            };
            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    info!("host closed the connection");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("host connection error: {e}");
                    break;
                }
            };
            match HostEvent::decode(&text) {
                Ok(event) => {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => debug!("ignoring undecodable host message: {e}"),
            }
        }
    });

    Ok(HostConnection {
        events: event_rx,
        commands: command_tx,
        writer,
    })
}

/// Rewrite the host's single-dash long flags (`-port 1234`) to `--port 1234`.
///
/// Single-letter flags and values are left alone.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut expect_value = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let is_long_single_dash = i > 0
                && !expect_value
                && arg.len() > 2
                && arg.starts_with('-')
                && !arg.starts_with("--")
                && arg[1..].chars().all(|c| c.is_ascii_alphabetic());
            expect_value = is_long_single_dash;
            if is_long_single_dash {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}
