//! Mask toggling and startup synchronisation
//!
//! All remote calls and all state mutation go through one session lock, so
//! at most one toggle runs at a time across every mask.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::locator::locate;
use super::resolver::{find_item, Resolver};
use super::store::{MaskState, MaskStore};
use crate::config::MaskConfig;
use crate::obs::{ObsError, SceneClient};

/// Everything guarded by the session lock
pub struct Session<C> {
    pub client: C,
    pub store: MaskStore,
}

/// What a single toggle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// OBS accepted the new value
    Applied {
        scene: String,
        item_id: i64,
        enabled: bool,
    },
    /// No activated mask has this name
    UnknownMask,
    /// No scene could be found; the local flag stays flipped
    SceneUnresolved,
    /// The scene has no item for the source; the local flag stays flipped
    ItemNotFound { scene: String },
    /// A remote call failed; the local flag stays flipped
    RemoteFailed { scene: String },
}

/// Scene a toggle without a known scene acts on
enum ToggleTarget {
    /// The source was found here; remembered for later toggles
    Resolved(String),
    /// Current program scene, used for this attempt only
    Fallback(String),
}

/// Shared handle to the session; clones refer to the same lock
pub struct Controller<C> {
    session: Arc<Mutex<Session<C>>>,
    resolver: Resolver,
}

impl<C> Clone for Controller<C> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            resolver: self.resolver,
        }
    }
}

impl<C: SceneClient> Controller<C> {
    pub fn new(client: C, resolver: Resolver) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                client,
                store: MaskStore::new(),
            })),
            resolver,
        }
    }

    /// Log the server's scene list
    pub async fn log_scenes(&self) {
        let mut session = self.session.lock().await;
        match session.client.list_scenes().await {
            Ok(scenes) if scenes.is_empty() => warn!("no scenes found in OBS"),
            Ok(scenes) => {
                for scene in scenes {
                    info!(index = scene.index, scene = %scene.name, "available scene");
                }
            }
            Err(e) => warn!(error = %e, "failed to get scene list"),
        }
    }

    /// Build the store from OBS, one mask at a time in the given order.
    ///
    /// Every mask gets a state. Masks whose item can't be read are stored
    /// as hidden.
    pub async fn sync_masks(&self, masks: &[&MaskConfig]) {
        let mut guard = self.session.lock().await;
        let Session { client, store } = &mut *guard;

        for mask in masks {
            let mut state = MaskState::new(&mask.name, &mask.source);
            state.scene = self
                .resolver
                .resolve(client, &mask.source, mask.scene_hint())
                .await;

            match &state.scene {
                None => warn!(
                    mask = %mask.name,
                    source = %mask.source,
                    "no scene found containing mask, assuming hidden"
                ),
                Some(scene) => match observe_enabled(client, scene, &mask.source).await {
                    Ok(Some(enabled)) => {
                        state.enabled = enabled;
                        info!(mask = %mask.name, scene = %scene, enabled, "synced initial state");
                    }
                    Ok(None) => warn!(
                        mask = %mask.name,
                        source = %mask.source,
                        scene = %scene,
                        "scene item not found, assuming hidden"
                    ),
                    Err(e) => warn!(
                        mask = %mask.name,
                        scene = %scene,
                        error = %e,
                        "failed to read enabled status, assuming hidden"
                    ),
                },
            }

            store.put(state);
        }

        if store.is_empty() {
            warn!("no masks to sync");
        } else {
            info!(masks = store.len(), "mask states synced");
        }
    }

    /// Flip a mask and push the new value to OBS
    pub async fn toggle(&self, name: &str) -> ToggleOutcome {
        let mut guard = self.session.lock().await;
        let Session { client, store } = &mut *guard;

        let Some(state) = store.get_mut(name) else {
            warn!(mask = name, "no state for mask, cannot toggle");
            return ToggleOutcome::UnknownMask;
        };

        state.enabled = !state.enabled;
        let enabled = state.enabled;
        info!(mask = name, enabled, "toggling mask");

        let scene = match state.scene.clone() {
            Some(scene) => scene,
            None => match self.resolve_for_toggle(client, state).await {
                Some(ToggleTarget::Resolved(scene)) => {
                    state.scene = Some(scene.clone());
                    scene
                }
                Some(ToggleTarget::Fallback(scene)) => scene,
                None => {
                    warn!(mask = name, source = %state.source, "no scene to toggle mask in");
                    return ToggleOutcome::SceneUnresolved;
                }
            },
        };

        let items = match client.list_scene_items(&scene).await {
            Ok(items) => items,
            Err(e) => {
                warn!(mask = name, scene = %scene, error = %e, "failed to get scene items");
                return ToggleOutcome::RemoteFailed { scene };
            }
        };

        let Some(item_id) = locate(&items, &state.source) else {
            warn!(
                mask = name,
                source = %state.source,
                scene = %scene,
                "failed to toggle mask: scene item not found"
            );
            return ToggleOutcome::ItemNotFound { scene };
        };

        match client.set_item_enabled(&scene, item_id, enabled).await {
            Ok(()) => {
                info!(mask = name, scene = %scene, item_id, enabled, "mask toggled");
                ToggleOutcome::Applied {
                    scene,
                    item_id,
                    enabled,
                }
            }
            Err(e) => {
                warn!(mask = name, scene = %scene, item_id, error = %e, "failed to toggle mask");
                ToggleOutcome::RemoteFailed { scene }
            }
        }
    }

    /// Snapshot of a mask's state
    #[cfg(test)]
    pub async fn mask(&self, name: &str) -> Option<MaskState> {
        self.session.lock().await.store.get(name).cloned()
    }

    /// Names of all masks in the store
    pub async fn mask_names(&self) -> Vec<String> {
        let session = self.session.lock().await;
        session.store.iter().map(|s| s.name.clone()).collect()
    }

    /// Full resolution, falling back to the current program scene
    async fn resolve_for_toggle(&self, client: &mut C, state: &MaskState) -> Option<ToggleTarget> {
        if let Some(scene) = self.resolver.resolve(client, &state.source, None).await {
            return Some(ToggleTarget::Resolved(scene));
        }

        match client.current_scene().await {
            Ok(Some(current)) => {
                info!(mask = %state.name, scene = %current, "using current scene for mask");
                Some(ToggleTarget::Fallback(current))
            }
            Ok(None) => {
                warn!(mask = %state.name, "current scene name is empty");
                None
            }
            Err(e) => {
                warn!(mask = %state.name, error = %e, "failed to get current scene");
                None
            }
        }
    }
}

/// Enabled flag of `source`'s item in `scene`; `None` if there is no item
async fn observe_enabled<C>(client: &mut C, scene: &str, source: &str) -> Result<Option<bool>, ObsError>
where
    C: SceneClient + ?Sized,
{
    match find_item(client, scene, source).await? {
        Some(item_id) => Ok(Some(client.item_enabled(scene, item_id).await?)),
        None => Ok(None),
    }
}
