use super::protocol::{
    auth_string, CurrentProgramScene, Envelope, Hello, Identify, Outgoing, Request,
    RequestResponse, SceneItemList, OP_HELLO, OP_IDENTIFIED, OP_IDENTIFY, OP_REQUEST,
    OP_REQUEST_RESPONSE, RPC_VERSION,
};
use super::{SceneItem, SceneRemote};
use crate::config::schema::ObsConfig;
use crate::error::{PluginError, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<RequestResponse>>>>;

/// Request/response client for the OBS websocket server.
///
/// One connection, established once. Responses are matched to requests by
/// `requestId`; a closed connection fails every outstanding and later request
/// with `NotConnected`.
pub struct ObsClient {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    request_timeout: Duration,
    closed: CancellationToken,
}

impl ObsClient {
    /// Connect, identify, and start the reader/writer tasks.
    ///
    /// The connect and the handshake together are bounded by the request
    /// timeout.
    ///
    /// # Errors
    /// Returns `PluginError::WebSocket` if the server is unreachable and
    /// `PluginError::Handshake` if identification is rejected or does not
    /// finish in time.
    pub async fn connect(config: &ObsConfig, cancel: &CancellationToken) -> Result<Self> {
        let url = config.url();
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let handshake = async {
            let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
            identify(&mut ws, config.password()).await?;
            Ok::<_, PluginError>(ws)
        };
        let ws = tokio::time::timeout(request_timeout, handshake)
            .await
            .map_err(|_| {
                PluginError::Handshake(format!("no handshake within {request_timeout:?}"))
            })??;
        info!("connected to OBS at {url}");

        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Pending::default();
        let closed = cancel.child_token();

        tokio::spawn(write_loop(sink, rx, closed.clone()));
        tokio::spawn(read_loop(stream, Arc::clone(&pending), closed.clone()));

        Ok(Self {
            outbound: tx,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            closed,
        })
    }

    /// Send one request and wait for its response data.
    async fn request(&self, request_type: &str, request_data: Value) -> Result<Value> {
        if self.closed.is_cancelled() {
            return Err(PluginError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let frame = serde_json::to_string(&Outgoing {
            op: OP_REQUEST,
            d: Request {
                request_type,
                request_id: id.clone(),
                request_data,
            },
        })?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);

        if self.outbound.send(Message::Text(frame.into())).is_err() {
            lock(&self.pending).remove(&id);
            return Err(PluginError::NotConnected);
        }
        debug!("OBS request {request_type} (#{id})");

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(PluginError::NotConnected),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(PluginError::Timeout(request_type.to_string()));
            }
        };

        let status = response.request_status;
        if status.result {
            Ok(response.response_data)
        } else {
            Err(PluginError::Request {
                request: response.request_type,
                code: status.code,
                comment: status.comment.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl SceneRemote for ObsClient {
    async fn current_scene(&self) -> Result<String> {
        let data = self.request("GetCurrentProgramScene", json!({})).await?;
        let scene: CurrentProgramScene = serde_json::from_value(data)?;
        Ok(scene.current_program_scene_name)
    }

    async fn scene_items(&self, scene: &str) -> Result<Vec<SceneItem>> {
        let data = self
            .request("GetSceneItemList", json!({ "sceneName": scene }))
            .await?;
        let list: SceneItemList = serde_json::from_value(data)?;
        Ok(list
            .scene_items
            .into_iter()
            .map(|item| SceneItem {
                id: item.scene_item_id.to_string(),
                name: item.source_name,
            })
            .collect())
    }

    async fn set_item_enabled(&self, scene: &str, item: &str, enabled: bool) -> Result<()> {
        let item_id: i64 = item
            .parse()
            .map_err(|_| PluginError::InvalidItemId(item.to_string()))?;
        self.request(
            "SetSceneItemEnabled",
            json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": enabled,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_current_scene(&self, scene: &str) -> Result<()> {
        self.request("SetCurrentProgramScene", json!({ "sceneName": scene }))
            .await?;
        Ok(())
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<String, oneshot::Sender<RequestResponse>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hello → Identify → Identified.
async fn identify(ws: &mut WsStream, password: Option<&str>) -> Result<()> {
    let hello = next_envelope(ws).await?;
    if hello.op != OP_HELLO {
        return Err(PluginError::Handshake(format!(
            "expected Hello, got op {}",
            hello.op
        )));
    }
    let hello: Hello = serde_json::from_value(hello.d)?;
    debug!(
        "OBS websocket {} (rpc {})",
        hello.obs_web_socket_version, hello.rpc_version
    );

    let authentication = match (hello.authentication, password) {
        (Some(auth), Some(password)) => Some(auth_string(password, &auth.salt, &auth.challenge)),
        (Some(_), None) => {
            return Err(PluginError::Handshake(
                "server requires a password".to_string(),
            ));
        }
        (None, _) => None,
    };

    let frame = serde_json::to_string(&Outgoing {
        op: OP_IDENTIFY,
        d: Identify {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        },
    })?;
    ws.send(Message::Text(frame.into())).await?;

    let reply = next_envelope(ws).await?;
    if reply.op != OP_IDENTIFIED {
        return Err(PluginError::Handshake(format!(
            "expected Identified, got op {}",
            reply.op
        )));
    }
    Ok(())
}

async fn next_envelope(ws: &mut WsStream) -> Result<Envelope> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(frame) => {
                let reason = frame.map_or_else(
                    || "connection closed".to_string(),
                    |f| {
                        let reason: &str = &f.reason;
                        format!("closed ({}): {reason}", u16::from(f.code))
                    },
                );
                return Err(PluginError::Handshake(reason));
            }
            _ => {}
        }
    }
    Err(PluginError::Handshake("connection closed".to_string()))
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    closed: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = closed.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
        };
        if let Err(e) = sink.send(msg).await {
            warn!("OBS send failed: {e}");
            closed.cancel();
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(mut stream: SplitStream<WsStream>, pending: Pending, closed: CancellationToken) {
    loop {
        let msg = tokio::select! {
            () = closed.cancelled() => break,
            msg = stream.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => dispatch_response(&pending, &text),
            Some(Ok(Message::Close(_))) | None => {
                warn!("OBS connection closed");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("OBS connection error: {e}");
                break;
            }
        }
    }
    closed.cancel();
    lock(&pending).clear();
}

fn dispatch_response(pending: &Pending, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            warn!("undecodable OBS message: {e}");
            return;
        }
    };
    if envelope.op != OP_REQUEST_RESPONSE {
        return;
    }
    match serde_json::from_value::<RequestResponse>(envelope.d) {
        Ok(response) => match lock(pending).remove(&response.request_id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!("dropping response for unknown request {}", response.request_id),
        },
        Err(e) => warn!("malformed OBS response: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Minimal OBS stand-in: Hello/Identify, then answers requests via `respond`.
    async fn fake_obs<F>(auth: Option<(&'static str, &'static str)>, respond: F) -> ObsConfig
    where
        F: Fn(&str, &Value) -> Value + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut hello = json!({"obsWebSocketVersion": "5.5.0", "rpcVersion": 1});
            if let Some((challenge, salt)) = auth {
                hello["authentication"] = json!({"challenge": challenge, "salt": salt});
            }
            let frame = json!({"op": 0, "d": hello}).to_string();
            ws.send(Message::Text(frame.into())).await.unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let env: Value = serde_json::from_str(&text).unwrap();
                let reply = match env["op"].as_u64() {
                    Some(1) => {
                        if let Some((challenge, salt)) = auth {
                            let expected = auth_string("secret", salt, challenge);
                            if env["d"]["authentication"] != json!(expected) {
                                let _ = ws.close(None).await;
                                return;
                            }
                        }
                        json!({"op": 2, "d": {"negotiatedRpcVersion": 1}})
                    }
                    Some(6) => {
                        let d = &env["d"];
                        let request_type = d["requestType"].as_str().unwrap_or_default();
                        let mut body = respond(request_type, &d["requestData"]);
                        body["requestType"] = json!(request_type);
                        body["requestId"] = d["requestId"].clone();
                        json!({"op": 7, "d": body})
                    }
                    _ => continue,
                };
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
            }
        });

        ObsConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: Some("secret".to_string()),
            request_timeout_ms: 1000,
        }
    }

    fn ok(data: Value) -> Value {
        json!({"requestStatus": {"result": true, "code": 100}, "responseData": data})
    }

    #[tokio::test]
    async fn requests_round_trip() {
        let config = fake_obs(None, |request_type, data| match request_type {
            "GetCurrentProgramScene" => ok(json!({"currentProgramSceneName": "Live"})),
            "GetSceneItemList" => {
                assert_eq!(data["sceneName"], "Gaming");
                ok(json!({"sceneItems": [
                    {"sceneItemId": 42, "sourceName": "Overlay", "sceneItemEnabled": false},
                    {"sceneItemId": 3, "sourceName": "Camera", "sceneItemEnabled": true}
                ]}))
            }
            "SetSceneItemEnabled" => {
                assert_eq!(data["sceneItemId"], 42);
                ok(Value::Null)
            }
            _ => json!({"requestStatus": {"result": false, "code": 600, "comment": "No scene"}}),
        })
        .await;

        let cancel = CancellationToken::new();
        let client = ObsClient::connect(&config, &cancel).await.unwrap();

        assert_eq!(client.current_scene().await.unwrap(), "Live");
        let items = client.scene_items("Gaming").await.unwrap();
        assert_eq!(
            items[0],
            SceneItem {
                id: "42".to_string(),
                name: "Overlay".to_string()
            }
        );
        client.set_item_enabled("Gaming", "42", true).await.unwrap();

        let err = client.set_current_scene("Nope").await.unwrap_err();
        assert!(matches!(err, PluginError::Request { code: 600, .. }));

        cancel.cancel();
    }

    #[tokio::test]
    async fn authenticates_with_password() {
        let config = fake_obs(Some(("challenge-1", "salt-1")), |_, _| {
            ok(json!({"currentProgramSceneName": "Live"}))
        })
        .await;

        let cancel = CancellationToken::new();
        let client = ObsClient::connect(&config, &cancel).await.unwrap();
        assert_eq!(client.current_scene().await.unwrap(), "Live");
        cancel.cancel();
    }

    #[tokio::test]
    async fn missing_password_fails_handshake() {
        let mut config = fake_obs(Some(("c", "s")), |_, _| ok(Value::Null)).await;
        config.password = None;

        let cancel = CancellationToken::new();
        let err = ObsClient::connect(&config, &cancel).await.err().unwrap();
        assert!(matches!(err, PluginError::Handshake(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Never send Hello; hold the socket until the client gives up.
            while ws.next().await.is_some() {}
        });

        let config = ObsConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: None,
            request_timeout_ms: 200,
        };
        let cancel = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            ObsClient::connect(&config, &cancel),
        )
        .await
        .expect("connect must give up on its own");
        assert!(matches!(result, Err(PluginError::Handshake(_))));
        server.abort();
    }

    #[tokio::test]
    async fn non_numeric_item_id_is_rejected_locally() {
        let config = fake_obs(None, |_, _| ok(Value::Null)).await;
        let cancel = CancellationToken::new();
        let client = ObsClient::connect(&config, &cancel).await.unwrap();

        let err = client
            .set_item_enabled("Gaming", "item-42", true)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidItemId(_)));

        cancel.cancel();
        assert!(matches!(
            client.current_scene().await,
            Err(PluginError::NotConnected)
        ));
    }
}
