//! Find a source's scene item within one scene's item list

use crate::obs::SceneItem;

/// Id of the first item whose source name matches exactly (case-sensitive)
pub fn locate(items: &[SceneItem], source: &str) -> Option<i64> {
    items
        .iter()
        .find(|item| item.source == source)
        .map(|item| item.id)
}
