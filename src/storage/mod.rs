use crate::models::AccountInfo;

pub(crate) const TOKEN_KEY: &str = "opendraft_token";
pub(crate) const USER_KEY: &str = "opendraft_user";

/// Draft autosave snapshots live under `autosave_<key>`, where `key` is
/// the caller-supplied stable identifier for one logical draft.
pub(crate) fn autosave_key(key: &str) -> String {
    format!("autosave_{key}")
}

pub(crate) fn save_user_to_storage(user: &AccountInfo) {
    if let Ok(json) = serde_json::to_string(user) {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.set_item(USER_KEY, &json);
        }
    }
}

pub(crate) fn load_user_from_storage() -> Option<AccountInfo> {
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        if let Ok(Some(json)) = storage.get_item(USER_KEY) {
            return serde_json::from_str(&json).ok();
        }
    }
    None
}
