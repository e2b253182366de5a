use crate::storage::autosave_key;
use crate::util::relative_time_text;
use leptos::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Local persistence failed (quota, privacy mode, missing storage).
///
/// Non-fatal: the draft stays dirty and the next change or explicit
/// save retries the write.
#[derive(Clone, Debug)]
pub(crate) struct PersistenceError {
    pub message: String,
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "draft write failed: {}", self.message)
    }
}

impl PersistenceError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The key-value persistence collaborator the controller writes drafts
/// through. Production uses localStorage; tests use an in-memory map.
pub(crate) trait DraftStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str);
}

#[derive(Clone, Copy, Default)]
pub(crate) struct LocalDraftStore;

impl DraftStore for LocalDraftStore {
    fn get(&self, key: &str) -> Option<String> {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten())?;
        storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten())
        else {
            return Err(PersistenceError::new("localStorage unavailable"));
        };
        storage
            .set_item(key, value)
            .map_err(|e| PersistenceError::new(format!("{e:?}")))
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.remove_item(key);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct SeoMeta {
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
}

/// Everything the editor form edits, compared by value: the watched
/// struct is rebuilt on every input event, so reference identity means
/// nothing here.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct DraftFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seo: SeoMeta,
}

/// Debounced local autosave for one logical draft.
///
/// One controller instance owns one `autosave_<key>` slot. Edits are
/// reported via `observe`; a write happens only after input pauses for
/// `debounce_ms`, and always persists the latest observed value at the
/// moment the timer fires. The stored value is the fields mapping only;
/// `saved_ms` is session state and is never persisted, so writing the
/// same fields twice leaves the stored snapshot byte-identical.
#[derive(Clone)]
pub(crate) struct AutosaveController<S: DraftStore> {
    store: S,
    key: String,
    debounce_ms: i32,

    last_observed: RwSignal<Option<DraftFields>>,
    last_persisted: RwSignal<Option<DraftFields>>,
    saved_ms: RwSignal<Option<i64>>,
    dirty: RwSignal<bool>,
    saving: RwSignal<bool>,
    torn_down: RwSignal<bool>,

    /// Pending debounce timer handle; shared across clones so a reset
    /// from any closure cancels the same timer.
    timer_id: Arc<Mutex<Option<i32>>>,
}

impl<S: DraftStore + Clone + 'static> AutosaveController<S> {
    pub fn new(store: S, key: &str, debounce_ms: i32) -> Self {
        Self {
            store,
            key: autosave_key(key),
            debounce_ms: debounce_ms.max(1),
            last_observed: RwSignal::new(None),
            last_persisted: RwSignal::new(None),
            saved_ms: RwSignal::new(None),
            dirty: RwSignal::new(false),
            saving: RwSignal::new(false),
            torn_down: RwSignal::new(false),
            timer_id: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.get()
    }

    pub fn last_saved_text(&self, now_ms: i64) -> String {
        relative_time_text(self.saved_ms.get(), now_ms)
    }

    /// Report the current editor value. A changed value (by deep
    /// comparison against the last observed one) marks the draft dirty
    /// and resets the debounce countdown; an unchanged value is a no-op.
    pub fn observe(&self, value: &DraftFields) {
        if self.torn_down.get_untracked() {
            return;
        }

        if self.last_observed.get_untracked().as_ref() == Some(value) {
            return;
        }

        self.last_observed.set(Some(value.clone()));
        self.dirty.set(true);
        self.schedule_flush();
    }

    /// Cancel any pending timer and write immediately.
    pub fn save_now_at(&self, now_ms: i64) -> Result<(), PersistenceError> {
        self.cancel_timer();
        self.write_latest(now_ms)
    }

    pub fn save_now(&self) -> Result<(), PersistenceError> {
        self.save_now_at(crate::util::now_ms())
    }

    /// Timer-path write: skipped when nothing changed since the last
    /// successful write, so a stray timer cannot dirty the state line.
    pub fn flush_at(&self, now_ms: i64) -> Result<(), PersistenceError> {
        if !self.dirty.get_untracked() {
            return Ok(());
        }
        self.write_latest(now_ms)
    }

    /// Delete the persisted snapshot and reset to clean. Used after a
    /// successful publish so a stale draft cannot resurrect.
    pub fn discard(&self) {
        self.cancel_timer();
        self.store.remove(&self.key);
        self.last_persisted.set(None);
        self.saved_ms.set(None);
        self.dirty.set(false);
    }

    pub fn load_persisted(&self) -> Option<DraftFields> {
        let json = self.store.get(&self.key)?;
        serde_json::from_str(&json).ok()
    }

    /// Stop scheduling timers. An already-flushed write completing
    /// after this point is harmless; new observations are ignored.
    pub fn teardown(&self) {
        self.torn_down.set(true);
        self.cancel_timer();
    }

    fn write_latest(&self, now_ms: i64) -> Result<(), PersistenceError> {
        let Some(fields) = self.last_observed.get_untracked() else {
            return Ok(());
        };

        let json = serde_json::to_string(&fields)
            .map_err(|e| PersistenceError::new(e.to_string()))?;

        self.saving.set(true);
        let result = self.store.set(&self.key, &json);
        self.saving.set(false);

        match result {
            Ok(()) => {
                self.last_persisted.set(Some(fields));
                self.saved_ms.set(Some(now_ms));
                self.dirty.set(false);
                Ok(())
            }
            // Keep dirty=true so the next change or explicit save retries.
            Err(e) => Err(e),
        }
    }

    fn schedule_flush(&self) {
        self.cancel_timer();

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;

            let Some(win) = web_sys::window() else {
                return;
            };

            let s2 = self.clone();
            let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
                if s2.torn_down.get_untracked() {
                    return;
                }
                if let Err(e) = s2.flush_at(crate::util::now_ms()) {
                    leptos::logging::warn!("autosave: {}", e);
                }
            });

            let tid = win
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    cb.as_ref().unchecked_ref(),
                    self.debounce_ms,
                )
                .unwrap_or(0);

            if let Ok(mut slot) = self.timer_id.lock() {
                *slot = Some(tid);
            }
        }
    }

    fn cancel_timer(&self) {
        let Ok(mut slot) = self.timer_id.lock() else {
            return;
        };
        let taken = slot.take();

        #[cfg(target_arch = "wasm32")]
        if let (Some(tid), Some(win)) = (taken, web_sys::window()) {
            win.clear_timeout_with_handle(tid);
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _ = taken;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStore {
        map: Rc<RefCell<HashMap<String, String>>>,
        writes: Rc<RefCell<u32>>,
    }

    impl DraftStore for MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.map.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            *self.writes.borrow_mut() += 1;
            self.map.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) {
            self.map.borrow_mut().remove(key);
        }
    }

    #[derive(Clone, Copy)]
    struct FailingStore;

    impl DraftStore for FailingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::new("quota exceeded"))
        }

        fn remove(&self, _key: &str) {}
    }

    fn fields(title: &str, content: &str) -> DraftFields {
        DraftFields {
            title: title.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_observe_marks_dirty_and_flush_persists() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_new", 300);

        assert!(!c.is_dirty());
        c.observe(&fields("A", ""));
        assert!(c.is_dirty());

        c.flush_at(1_000).expect("flush should succeed");
        assert!(!c.is_dirty());
        assert_eq!(c.load_persisted(), Some(fields("A", "")));
    }

    #[test]
    fn test_rapid_edits_yield_one_write_with_final_value() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_new", 300);

        // Edits faster than the debounce window; only the eventual
        // flush writes, and it reflects the last value.
        c.observe(&fields("A", ""));
        c.observe(&fields("AB", ""));
        c.observe(&fields("ABC", "body"));

        c.flush_at(1_000).expect("flush should succeed");
        assert_eq!(*store.writes.borrow(), 1);
        assert_eq!(c.load_persisted(), Some(fields("ABC", "body")));
    }

    #[test]
    fn test_unchanged_value_is_not_a_change() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_new", 300);

        c.observe(&fields("A", ""));
        c.flush_at(1_000).expect("flush should succeed");

        // Same value, fresh allocation: deep comparison must say clean.
        c.observe(&fields("A", ""));
        assert!(!c.is_dirty());

        // Timer-path flush with nothing dirty writes nothing.
        c.flush_at(2_000).expect("flush should succeed");
        assert_eq!(*store.writes.borrow(), 1);
    }

    #[test]
    fn test_save_is_idempotent() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_new", 300);

        c.observe(&fields("A", "body"));
        c.save_now_at(1_000).expect("first save");
        let stored_first = store.get(&autosave_key("post_new")).expect("stored");

        c.save_now_at(2_000).expect("second save");
        let stored_second = store.get(&autosave_key("post_new")).expect("stored");

        assert_eq!(stored_first, stored_second);
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_failed_write_leaves_dirty() {
        let c = AutosaveController::new(FailingStore, "post_new", 300);

        c.observe(&fields("A", ""));
        assert!(c.save_now_at(1_000).is_err());
        assert!(c.is_dirty());
        assert_eq!(c.last_saved_text(60_000), "Never saved");

        // The next explicit save retries the same value.
        assert!(c.save_now_at(2_000).is_err());
        assert!(c.is_dirty());
    }

    #[test]
    fn test_discard_clears_persisted_snapshot() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_42", 300);

        c.observe(&fields("A", ""));
        c.save_now_at(1_000).expect("save");
        assert!(c.load_persisted().is_some());

        c.discard();
        assert!(c.load_persisted().is_none());
        assert!(!c.is_dirty());
        assert_eq!(c.last_saved_text(2_000), "Never saved");
    }

    #[test]
    fn test_last_saved_text_tracks_saved_ms() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store, "post_new", 300);

        assert_eq!(c.last_saved_text(0), "Never saved");
        c.observe(&fields("A", ""));
        c.save_now_at(10_000).expect("save");
        assert_eq!(c.last_saved_text(10_500), "Just now");
        assert_eq!(c.last_saved_text(10_000 + 5 * 60_000), "5 minutes ago");
    }

    #[test]
    fn test_teardown_stops_observing() {
        let store = MemoryStore::default();
        let c = AutosaveController::new(store.clone(), "post_new", 300);

        c.teardown();
        c.observe(&fields("A", ""));
        assert!(!c.is_dirty());

        c.flush_at(1_000).expect("flush is a no-op");
        assert_eq!(*store.writes.borrow(), 0);
    }

    #[test]
    fn test_restore_cycle_between_sessions() {
        let store = MemoryStore::default();

        // Session one edits and saves.
        {
            let c = AutosaveController::new(store.clone(), "post_new", 300);
            c.observe(&fields("A", ""));
            c.flush_at(1_000).expect("save");
        }

        // Session two restores the same key.
        let c = AutosaveController::new(store.clone(), "post_new", 300);
        assert_eq!(c.load_persisted(), Some(fields("A", "")));

        c.discard();
        assert_eq!(c.load_persisted(), None);
    }

    #[test]
    fn test_keys_are_isolated() {
        let store = MemoryStore::default();
        let a = AutosaveController::new(store.clone(), "post_1", 300);
        let b = AutosaveController::new(store.clone(), "post_2", 300);

        a.observe(&fields("one", ""));
        a.save_now_at(1_000).expect("save");
        b.observe(&fields("two", ""));
        b.save_now_at(1_000).expect("save");

        assert_eq!(a.load_persisted(), Some(fields("one", "")));
        assert_eq!(b.load_persisted(), Some(fields("two", "")));

        a.discard();
        assert_eq!(b.load_persisted(), Some(fields("two", "")));
    }
}
