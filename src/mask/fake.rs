//! In-memory [`SceneClient`] for tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::obs::{ObsError, Scene, SceneClient, SceneItem};

/// A remote call, as observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListScenes,
    CurrentScene,
    ListSceneItems(String),
    ItemEnabled(String, i64),
    SetItemEnabled(String, i64, bool),
}

#[derive(Debug, Default)]
struct Inner {
    scenes: Vec<(String, Vec<SceneItem>)>,
    current: Option<String>,
    failing: HashSet<&'static str>,
    calls: Vec<Call>,
    in_flight: usize,
    interleaved: bool,
}

/// Scene graph plus call log; clones share state
#[derive(Debug, Clone, Default)]
pub struct FakeObs {
    inner: Arc<Mutex<Inner>>,
}

impl FakeObs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene holding `(source, item id, enabled)` items
    pub fn scene(self, name: &str, items: &[(&str, i64, bool)]) -> Self {
        self.add_scene(name, items);
        self
    }

    /// Like [`FakeObs::scene`], on a fake that is already in use
    pub fn add_scene(&self, name: &str, items: &[(&str, i64, bool)]) {
        let items = items
            .iter()
            .map(|&(source, id, enabled)| SceneItem {
                scene: name.to_string(),
                id,
                source: source.to_string(),
                enabled,
            })
            .collect();
        self.inner.lock().unwrap().scenes.push((name.to_string(), items));
    }

    pub fn current(self, name: &str) -> Self {
        self.inner.lock().unwrap().current = Some(name.to_string());
        self
    }

    /// Make every call to the named method fail
    pub fn fail(self, method: &'static str) -> Self {
        self.start_failing(method);
        self
    }

    /// Make later calls to the named method fail
    pub fn start_failing(&self, method: &'static str) {
        self.inner.lock().unwrap().failing.insert(method);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Only the `set_item_enabled` calls, in order
    pub fn set_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SetItemEnabled(..)))
            .collect()
    }

    /// Whether two `set_item_enabled` calls ever overlapped
    pub fn saw_interleaving(&self) -> bool {
        self.inner.lock().unwrap().interleaved
    }

    /// Current remote enabled flag of an item
    pub fn enabled(&self, scene: &str, item_id: i64) -> Option<bool> {
        let inner = self.inner.lock().unwrap();
        inner
            .scenes
            .iter()
            .find(|(name, _)| name == scene)
            .and_then(|(_, items)| items.iter().find(|i| i.id == item_id))
            .map(|i| i.enabled)
    }

    fn record(&self, call: Call, method: &'static str) -> Result<(), ObsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.failing.contains(method) {
            return Err(ObsError::Request {
                request: method.to_string(),
                code: 600,
                comment: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn items(&self, scene: &str) -> Result<Vec<SceneItem>, ObsError> {
        let inner = self.inner.lock().unwrap();
        inner
            .scenes
            .iter()
            .find(|(name, _)| name == scene)
            .map(|(_, items)| items.clone())
            .ok_or_else(|| ObsError::Request {
                request: "GetSceneItemList".to_string(),
                code: 600,
                comment: format!("no scene named {scene}"),
            })
    }
}

#[async_trait]
impl SceneClient for FakeObs {
    async fn list_scenes(&mut self) -> Result<Vec<Scene>, ObsError> {
        self.record(Call::ListScenes, "list_scenes")?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .scenes
            .iter()
            .enumerate()
            .map(|(index, (name, _))| Scene {
                name: name.clone(),
                index: index as i64,
            })
            .collect())
    }

    async fn current_scene(&mut self) -> Result<Option<String>, ObsError> {
        self.record(Call::CurrentScene, "current_scene")?;
        Ok(self.inner.lock().unwrap().current.clone())
    }

    async fn list_scene_items(&mut self, scene: &str) -> Result<Vec<SceneItem>, ObsError> {
        self.record(Call::ListSceneItems(scene.to_string()), "list_scene_items")?;
        self.items(scene)
    }

    async fn item_enabled(&mut self, scene: &str, item_id: i64) -> Result<bool, ObsError> {
        self.record(Call::ItemEnabled(scene.to_string(), item_id), "item_enabled")?;
        self.enabled(scene, item_id).ok_or_else(|| ObsError::Request {
            request: "GetSceneItemEnabled".to_string(),
            code: 600,
            comment: "no such item".to_string(),
        })
    }

    async fn set_item_enabled(
        &mut self,
        scene: &str,
        item_id: i64,
        enabled: bool,
    ) -> Result<(), ObsError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.in_flight > 0 {
                inner.interleaved = true;
            }
            inner.in_flight += 1;
        }

        // Give other tasks a chance to interleave
        tokio::task::yield_now().await;

        let result = self.record(
            Call::SetItemEnabled(scene.to_string(), item_id, enabled),
            "set_item_enabled",
        );

        let mut inner = self.inner.lock().unwrap();
        inner.in_flight -= 1;
        result?;
        if let Some(item) = inner
            .scenes
            .iter_mut()
            .find(|(name, _)| name == scene)
            .and_then(|(_, items)| items.iter_mut().find(|i| i.id == item_id))
        {
            item.enabled = enabled;
        }
        Ok(())
    }
}
