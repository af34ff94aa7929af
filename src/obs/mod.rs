pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod protocol;

use crate::error::{PluginError, Result};
use async_trait::async_trait;

pub use client::ObsClient;

/// An item inside a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    /// Scene-local item id.
    pub id: String,
    /// Name of the source the item shows.
    pub name: String,
}

/// The remote calls the fade sequence needs.
#[async_trait]
pub trait SceneRemote: Send + Sync {
    /// Name of the scene currently on program.
    async fn current_scene(&self) -> Result<String>;

    /// Items of `scene`, in the server's order.
    async fn scene_items(&self, scene: &str) -> Result<Vec<SceneItem>>;

    async fn set_item_enabled(&self, scene: &str, item: &str, enabled: bool) -> Result<()>;

    async fn set_current_scene(&self, scene: &str) -> Result<()>;
}

/// Stand-in used when the initial OBS connection failed.
pub struct Offline;

#[async_trait]
impl SceneRemote for Offline {
    async fn current_scene(&self) -> Result<String> {
        Err(PluginError::NotConnected)
    }

    async fn scene_items(&self, _scene: &str) -> Result<Vec<SceneItem>> {
        Err(PluginError::NotConnected)
    }

    async fn set_item_enabled(&self, _scene: &str, _item: &str, _enabled: bool) -> Result<()> {
        Err(PluginError::NotConnected)
    }

    async fn set_current_scene(&self, _scene: &str) -> Result<()> {
        Err(PluginError::NotConnected)
    }
}
