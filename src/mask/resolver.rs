//! Source-to-scene resolution
//!
//! Order: usable scene hint, then the current program scene, then every
//! scene in server order. The first match wins.

use tracing::{debug, info, warn};

use super::locator::locate;
use crate::obs::{ObsError, SceneClient};

/// Scene hint shipped in the sample configuration, meaning "no hint"
pub const PLACEHOLDER_SCENE: &str = "场景";

/// The hint itself, unless it is blank or the placeholder
pub fn usable_scene_hint(hint: &str) -> Option<&str> {
    if hint.trim().is_empty() || hint == PLACEHOLDER_SCENE {
        None
    } else {
        Some(hint)
    }
}

/// Id of `source`'s item in `scene`, from a fresh item listing
pub async fn find_item<C>(client: &mut C, scene: &str, source: &str) -> Result<Option<i64>, ObsError>
where
    C: SceneClient + ?Sized,
{
    let items = client.list_scene_items(scene).await?;
    Ok(locate(&items, source))
}

/// Determines which scene contains a source
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    /// Check that a hinted scene really contains the source before using it.
    /// Off by default: a stale hint is trusted and "resolves" anyway.
    verify_hints: bool,
}

impl Resolver {
    pub fn new(verify_hints: bool) -> Self {
        Self { verify_hints }
    }

    /// Scene containing `source`, or `None` if no scene does.
    ///
    /// Remote failures are logged and treated as "not in that scene".
    pub async fn resolve<C>(&self, client: &mut C, source: &str, hint: Option<&str>) -> Option<String>
    where
        C: SceneClient + ?Sized,
    {
        if let Some(hint) = hint.and_then(usable_scene_hint) {
            if !self.verify_hints {
                debug!(source, scene = hint, "using configured scene");
                return Some(hint.to_string());
            }
            match find_item(client, hint, source).await {
                Ok(Some(_)) => return Some(hint.to_string()),
                Ok(None) => {
                    warn!(source, scene = hint, "source not in configured scene, searching")
                }
                Err(e) => {
                    warn!(source, scene = hint, error = %e, "failed to check configured scene")
                }
            }
        }

        let mut searched = None;
        match client.current_scene().await {
            Ok(Some(current)) => {
                let found = find_item(client, &current, source).await;
                match found {
                    Ok(Some(_)) => {
                        info!(source, scene = %current, "found source in current scene");
                        return Some(current);
                    }
                    Ok(None) => searched = Some(current),
                    Err(e) => {
                        warn!(source, scene = %current, error = %e, "failed to get scene items")
                    }
                }
            }
            Ok(None) => debug!(source, "no current program scene"),
            Err(e) => warn!(source, error = %e, "failed to get current scene"),
        }

        let scenes = match client.list_scenes().await {
            Ok(scenes) => scenes,
            Err(e) => {
                warn!(source, error = %e, "failed to get scene list");
                return None;
            }
        };

        for scene in scenes {
            if scene.name.is_empty() {
                debug!(source, index = scene.index, "skipping unnamed scene");
                continue;
            }
            if searched.as_deref() == Some(scene.name.as_str()) {
                continue;
            }
            let found = find_item(client, &scene.name, source).await;
            match found {
                Ok(Some(_)) => {
                    info!(source, scene = %scene.name, "found source in scene");
                    return Some(scene.name);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source, scene = %scene.name, error = %e, "failed to get scene items")
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::fake::{Call, FakeObs};

    #[tokio::test]
    async fn test_active_scene_match() {
        let mut obs = FakeObs::new()
            .scene("Intro", &[("Logo", 1, true)])
            .scene("Main", &[("BlurFilter", 2, false)])
            .current("Main");

        let scene = Resolver::default().resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(scene.as_deref(), Some("Main"));
        assert!(!obs.calls().contains(&Call::ListScenes));
    }

    #[tokio::test]
    async fn test_hint_short_circuits_remote() {
        let mut obs = FakeObs::new()
            .scene("Main", &[("LogoPNG", 1, true)])
            .current("Main");

        // Trusted without checking that Intro holds the source
        let scene = Resolver::default().resolve(&mut obs, "LogoPNG", Some("Intro")).await;
        assert_eq!(scene.as_deref(), Some("Intro"));
        assert!(obs.calls().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_hint_falls_through() {
        let mut obs = FakeObs::new()
            .scene("Main", &[("LogoPNG", 1, true)])
            .current("Main");

        let resolver = Resolver::default();
        for hint in [PLACEHOLDER_SCENE, "", "   "] {
            let scene = resolver.resolve(&mut obs, "LogoPNG", Some(hint)).await;
            assert_eq!(scene.as_deref(), Some("Main"));
        }
    }

    #[tokio::test]
    async fn test_verified_hint_rejected_when_missing() {
        let mut obs = FakeObs::new()
            .scene("Intro", &[("Title", 1, true)])
            .scene("Main", &[("LogoPNG", 2, true)])
            .current("Main");

        let scene = Resolver::new(true).resolve(&mut obs, "LogoPNG", Some("Intro")).await;
        assert_eq!(scene.as_deref(), Some("Main"));
        assert_eq!(obs.calls()[0], Call::ListSceneItems("Intro".to_string()));
    }

    #[tokio::test]
    async fn test_verified_hint_accepted() {
        let mut obs = FakeObs::new()
            .scene("Intro", &[("LogoPNG", 1, true)])
            .scene("Main", &[("LogoPNG", 2, true)])
            .current("Main");

        let scene = Resolver::new(true).resolve(&mut obs, "LogoPNG", Some("Intro")).await;
        assert_eq!(scene.as_deref(), Some("Intro"));
    }

    #[tokio::test]
    async fn test_active_scene_preferred_over_scan() {
        let mut obs = FakeObs::new()
            .scene("Alpha", &[("BlurFilter", 1, true)])
            .scene("Main", &[("BlurFilter", 2, true)])
            .current("Main");

        let scene = Resolver::default().resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(scene.as_deref(), Some("Main"));
    }

    #[tokio::test]
    async fn test_scan_in_server_order_skips_unnamed() {
        let mut obs = FakeObs::new()
            .scene("", &[("BlurFilter", 9, true)])
            .scene("Alpha", &[("Camera", 1, true)])
            .scene("Beta", &[("BlurFilter", 2, true)])
            .scene("Gamma", &[("BlurFilter", 3, true)])
            .current("Alpha");

        let scene = Resolver::default().resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(scene.as_deref(), Some("Beta"));

        let listed: Vec<_> = obs
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListSceneItems(scene) => Some(scene),
                _ => None,
            })
            .collect();
        // Alpha once as the current scene, not again during the scan
        assert_eq!(listed, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_not_found_anywhere() {
        let mut obs = FakeObs::new()
            .scene("Main", &[("Camera", 1, true)])
            .current("Main");

        let scene = Resolver::default().resolve(&mut obs, "Missing", None).await;
        assert_eq!(scene, None);
    }

    #[tokio::test]
    async fn test_current_scene_failure_falls_back_to_scan() {
        let mut obs = FakeObs::new()
            .scene("Main", &[("BlurFilter", 1, true)])
            .current("Main")
            .fail("current_scene");

        let scene = Resolver::default().resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(scene.as_deref(), Some("Main"));
    }

    #[tokio::test]
    async fn test_scene_list_failure_is_not_found() {
        let mut obs = FakeObs::new()
            .scene("Main", &[("BlurFilter", 1, true)])
            .fail("list_scenes");

        let scene = Resolver::default().resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(scene, None);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let mut obs = FakeObs::new()
            .scene("Alpha", &[("Camera", 1, true)])
            .scene("Beta", &[("BlurFilter", 2, true)]);

        let resolver = Resolver::default();
        let first = resolver.resolve(&mut obs, "BlurFilter", None).await;
        let second = resolver.resolve(&mut obs, "BlurFilter", None).await;
        assert_eq!(first.as_deref(), Some("Beta"));
        assert_eq!(first, second);
    }
}
