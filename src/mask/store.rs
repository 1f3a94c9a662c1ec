//! In-memory mask state, rebuilt from OBS on every start

use std::collections::BTreeMap;

/// Last-known state of an activated mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskState {
    pub name: String,
    pub source: String,
    /// `None` until a scene containing the source is found
    pub scene: Option<String>,
    /// The value this process last set or observed; may drift from OBS
    /// after a failed toggle
    pub enabled: bool,
}

impl MaskState {
    /// A hidden mask with no known scene
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            scene: None,
            enabled: false,
        }
    }
}

/// Mask states keyed by mask name.
///
/// Has no locking of its own; callers hold the session lock.
#[derive(Debug, Default)]
pub struct MaskStore {
    masks: BTreeMap<String, MaskState>,
}

impl MaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MaskState> {
        self.masks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut MaskState> {
        self.masks.get_mut(name)
    }

    /// Insert or replace the state for `state.name`
    pub fn put(&mut self, state: MaskState) {
        self.masks.insert(state.name.clone(), state);
    }

    /// States in name order
    pub fn iter(&self) -> impl Iterator<Item = &MaskState> {
        self.masks.values()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}
