//! Client-side change set for delta sync.
//!
//! Two disjoint name sets, `dirty` and `deleted`.  Marking a name in one
//! removes it from the other.  Marks are dropped entirely while tracking
//! is disabled, which is how bulk loads avoid flagging every block; those
//! changes are not queued and will not be synced later.

use std::collections::HashSet;

/// Block name used for the bot preset list.
pub const PRESET_BLOCK: &str = "preset";
/// Block name used for the module list.
pub const MODULES_BLOCK: &str = "modules";

/// Starts disabled; call [`DirtyTracker::enable`] once the initial load
/// has finished.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty:   HashSet<String>,
    deleted: HashSet<String>,
    enabled: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, name: &str) {
        if self.enabled {
            self.deleted.remove(name);
            self.dirty.insert(name.to_owned());
        }
    }

    pub fn mark_deleted(&mut self, name: &str) {
        if self.enabled {
            self.dirty.remove(name);
            self.deleted.insert(name.to_owned());
        }
    }

    pub fn mark_character_dirty(&mut self, character_id: &str) {
        self.mark_dirty(character_id);
    }

    pub fn mark_character_deleted(&mut self, character_id: &str) {
        self.mark_deleted(character_id);
    }

    pub fn mark_preset_dirty(&mut self) {
        self.mark_dirty(PRESET_BLOCK);
    }

    pub fn mark_modules_dirty(&mut self) {
        self.mark_dirty(MODULES_BLOCK);
    }

    /// Snapshot of the dirty set, unordered.
    pub fn list_dirty(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    /// Snapshot of the deleted set, unordered.
    pub fn list_deleted(&self) -> Vec<String> {
        self.deleted.iter().cloned().collect()
    }

    /// Forget everything pending.  Only call once the remote side has
    /// durably applied the delta.
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.deleted.clear();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop recording.  Pending sets are kept.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || !self.deleted.is_empty()
    }
}
