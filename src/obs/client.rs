//! WebSocket client for the OBS v5 protocol
//!
//! Requests are strictly sequential: each call writes one request frame and
//! reads until the matching response arrives.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use super::protocol::{
    self, op, CurrentProgramScene, Frame, Hello, Identify, OutFrame, Request, RequestResponse,
    SceneItemEnabled, SceneItemList, SceneList,
};
use super::{ObsError, Scene, SceneClient, SceneItem};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connected and identified OBS WebSocket session
pub struct ObsClient {
    socket: Socket,
    next_request_id: u64,
}

impl ObsClient {
    /// Connect to `url` and complete the Hello/Identify handshake
    pub async fn connect(url: &str, password: Option<&str>) -> Result<Self, ObsError> {
        info!(%url, "connecting to OBS WebSocket");
        let (socket, _response) = connect_async(url).await?;

        let mut client = Self {
            socket,
            next_request_id: 0,
        };
        client.identify(password).await?;

        Ok(client)
    }

    /// Answer the server's Hello and wait for Identified
    async fn identify(&mut self, password: Option<&str>) -> Result<(), ObsError> {
        let frame = self.read_frame().await?;
        if frame.op != op::HELLO {
            return Err(ObsError::Handshake(format!(
                "expected Hello (op {}), got op {}",
                op::HELLO,
                frame.op
            )));
        }
        let hello: Hello = serde_json::from_value(frame.d)?;
        info!(
            server_version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
            rpc_version = hello.rpc_version,
            "received Hello"
        );

        let authentication = match (&hello.authentication, password) {
            (Some(challenge), Some(password)) => {
                Some(protocol::auth_response(password, challenge))
            }
            (Some(_), None) => return Err(ObsError::AuthRequired),
            (None, _) => None,
        };

        self.send(
            op::IDENTIFY,
            Identify {
                rpc_version: protocol::RPC_VERSION,
                authentication,
                event_subscriptions: 0,
            },
        )
        .await?;

        let frame = self.read_frame().await?;
        if frame.op != op::IDENTIFIED {
            return Err(ObsError::Handshake(format!(
                "expected Identified (op {}), got op {}",
                op::IDENTIFIED,
                frame.op
            )));
        }

        info!("identified with OBS");
        Ok(())
    }

    /// Serialize and send one frame
    async fn send<T: Serialize>(&mut self, opcode: u8, payload: T) -> Result<(), ObsError> {
        let text = serde_json::to_string(&OutFrame { op: opcode, d: payload })?;
        trace!(%text, "sending frame");
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Read the next JSON frame, answering pings and skipping binary data
    async fn read_frame(&mut self) -> Result<Frame, ObsError> {
        loop {
            let msg = self.socket.next().await.ok_or(ObsError::Closed)??;
            match msg {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Ping(payload) => self.socket.send(Message::Pong(payload)).await?,
                Message::Close(reason) => {
                    debug!(?reason, "server closed connection");
                    return Err(ObsError::Closed);
                }
                _ => {}
            }
        }
    }

    /// Send a request and wait for its response data
    async fn request<T: DeserializeOwned>(
        &mut self,
        request_type: &str,
        data: Option<Value>,
    ) -> Result<T, ObsError> {
        let value = self.request_raw(request_type, data).await?;
        let value = value.ok_or_else(|| ObsError::MissingResponseData(request_type.to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a request; `None` if the server returned no response data
    async fn request_raw(
        &mut self,
        request_type: &str,
        data: Option<Value>,
    ) -> Result<Option<Value>, ObsError> {
        self.next_request_id += 1;
        let request_id = self.next_request_id.to_string();

        self.send(
            op::REQUEST,
            Request {
                request_type,
                request_id: request_id.clone(),
                request_data: data,
            },
        )
        .await?;

        loop {
            let frame = self.read_frame().await?;
            if frame.op != op::REQUEST_RESPONSE {
                trace!(op = frame.op, "ignoring frame");
                continue;
            }

            let response: RequestResponse = serde_json::from_value(frame.d)?;
            if response.request_id != request_id {
                debug!(
                    request_id = %response.request_id,
                    "ignoring response to stale request"
                );
                continue;
            }

            if !response.request_status.result {
                return Err(ObsError::Request {
                    request: response.request_type,
                    code: response.request_status.code,
                    comment: response.request_status.comment.unwrap_or_default(),
                });
            }
            return Ok(response.response_data);
        }
    }
}

#[async_trait]
impl SceneClient for ObsClient {
    async fn list_scenes(&mut self) -> Result<Vec<Scene>, ObsError> {
        let list: SceneList = self.request("GetSceneList", None).await?;
        Ok(list
            .scenes
            .into_iter()
            .map(|s| Scene {
                name: s.scene_name,
                index: s.scene_index,
            })
            .collect())
    }

    async fn current_scene(&mut self) -> Result<Option<String>, ObsError> {
        let current: CurrentProgramScene = self.request("GetCurrentProgramScene", None).await?;
        Ok(current
            .current_program_scene_name
            .filter(|name| !name.is_empty()))
    }

    async fn list_scene_items(&mut self, scene: &str) -> Result<Vec<SceneItem>, ObsError> {
        let list: SceneItemList = self
            .request("GetSceneItemList", Some(json!({ "sceneName": scene })))
            .await?;
        Ok(list
            .scene_items
            .into_iter()
            .map(|item| SceneItem {
                scene: scene.to_string(),
                id: item.scene_item_id,
                source: item.source_name,
                enabled: item.scene_item_enabled,
            })
            .collect())
    }

    async fn item_enabled(&mut self, scene: &str, item_id: i64) -> Result<bool, ObsError> {
        let resp: SceneItemEnabled = self
            .request(
                "GetSceneItemEnabled",
                Some(json!({ "sceneName": scene, "sceneItemId": item_id })),
            )
            .await?;
        Ok(resp.scene_item_enabled)
    }

    async fn set_item_enabled(
        &mut self,
        scene: &str,
        item_id: i64,
        enabled: bool,
    ) -> Result<(), ObsError> {
        self.request_raw(
            "SetSceneItemEnabled",
            Some(json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": enabled,
            })),
        )
        .await?;
        Ok(())
    }
}
