//! Recording in-memory remote for tests.

use super::{SceneItem, SceneRemote};
use crate::error::{PluginError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    CurrentScene,
    SceneItems(String),
    SetEnabled {
        scene: String,
        item: String,
        enabled: bool,
    },
    SetScene(String),
}

impl Call {
    pub fn enable(scene: &str, item: &str) -> Self {
        Self::SetEnabled {
            scene: scene.to_string(),
            item: item.to_string(),
            enabled: true,
        }
    }

    pub fn disable(scene: &str, item: &str) -> Self {
        Self::SetEnabled {
            scene: scene.to_string(),
            item: item.to_string(),
            enabled: false,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::SetEnabled { .. } | Self::SetScene(_))
    }
}

struct State {
    current: String,
    scenes: HashMap<String, Vec<SceneItem>>,
    failing: HashSet<Call>,
    calls: Vec<(Duration, Call)>,
}

pub struct MockRemote {
    start: Instant,
    state: Mutex<State>,
}

impl MockRemote {
    pub fn new(current: &str) -> Self {
        Self {
            start: Instant::now(),
            state: Mutex::new(State {
                current: current.to_string(),
                scenes: HashMap::new(),
                failing: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_item(self, scene: &str, id: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .scenes
            .entry(scene.to_string())
            .or_default()
            .push(SceneItem {
                id: id.to_string(),
                name: name.to_string(),
            });
        self
    }

    /// Make a mutating call fail whenever it is issued.
    pub fn failing(self, call: Call) -> Self {
        self.state.lock().unwrap().failing.insert(call);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Calls with their offset from construction, on the tokio clock.
    pub fn timed_calls(&self) -> Vec<(Duration, Call)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((self.start.elapsed(), call.clone()));
        if state.failing.contains(&call) {
            return Err(PluginError::Request {
                request: format!("{call:?}"),
                code: 600,
                comment: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SceneRemote for MockRemote {
    async fn current_scene(&self) -> Result<String> {
        self.record(Call::CurrentScene)?;
        Ok(self.current())
    }

    async fn scene_items(&self, scene: &str) -> Result<Vec<SceneItem>> {
        self.record(Call::SceneItems(scene.to_string()))?;
        let state = self.state.lock().unwrap();
        state
            .scenes
            .get(scene)
            .cloned()
            .ok_or_else(|| PluginError::Request {
                request: "GetSceneItemList".to_string(),
                code: 600,
                comment: format!("no scene {scene}"),
            })
    }

    async fn set_item_enabled(&self, scene: &str, item: &str, enabled: bool) -> Result<()> {
        self.record(Call::SetEnabled {
            scene: scene.to_string(),
            item: item.to_string(),
            enabled,
        })
    }

    async fn set_current_scene(&self, scene: &str) -> Result<()> {
        self.record(Call::SetScene(scene.to_string()))?;
        self.state.lock().unwrap().current = scene.to_string();
        Ok(())
    }
}
