//! OBS remote control
//!
//! The core only talks to OBS through [`SceneClient`]; [`ObsClient`] is the
//! WebSocket v5 implementation used by the daemon.

mod client;
mod protocol;

use async_trait::async_trait;

pub use client::ObsClient;

/// A scene as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub name: String,
    pub index: i64,
}

/// The placement of a source within a scene.
///
/// Only valid for the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    pub scene: String,
    /// Unique within `scene`
    pub id: i64,
    pub source: String,
    pub enabled: bool,
}

/// Errors returned by the remote client
#[derive(Debug, thiserror::Error)]
pub enum ObsError {
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("server requires authentication but no password is configured")]
    AuthRequired,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("request {request} failed with code {code}: {comment}")]
    Request {
        request: String,
        code: u16,
        comment: String,
    },

    #[error("request {0} returned no response data")]
    MissingResponseData(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ObsError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ObsError::WebSocket(Box::new(e))
    }
}

/// Capabilities the core needs from the scene-composition server
#[async_trait]
pub trait SceneClient: Send {
    /// All scenes, in server order
    async fn list_scenes(&mut self) -> Result<Vec<Scene>, ObsError>;

    /// Name of the current program scene, if any
    async fn current_scene(&mut self) -> Result<Option<String>, ObsError>;

    /// Items of a single scene
    async fn list_scene_items(&mut self, scene: &str) -> Result<Vec<SceneItem>, ObsError>;

    async fn item_enabled(&mut self, scene: &str, item_id: i64) -> Result<bool, ObsError>;

    async fn set_item_enabled(
        &mut self,
        scene: &str,
        item_id: i64,
        enabled: bool,
    ) -> Result<(), ObsError>;
}
