//! Mask resolution, state and toggling
//!
//! - `locator`: find a source's item in one scene's item list
//! - `resolver`: find the scene that holds a source
//! - `store`: last-known state per mask
//! - `controller`: startup sync and serialized toggles

mod controller;
mod locator;
mod resolver;
mod store;

#[cfg(test)]
mod fake;

pub use controller::{Controller, ToggleOutcome};
pub use resolver::{usable_scene_hint, Resolver};
