mod api;
mod app;
mod comments;
mod drafts;
mod models;
mod pages;
mod state;
mod storage;
mod util;

use crate::app::App;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use crate::api::ApiClient;
    use crate::drafts::{DraftStore, LocalDraftStore};
    use crate::models::AccountInfo;
    use crate::storage::{load_user_from_storage, save_user_to_storage};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_api_client_storage_roundtrip_token() {
        ApiClient::clear_storage();

        let mut c = ApiClient::load_from_storage();
        assert!(!c.is_authenticated());

        c.set_token("t1".to_string());
        c.save_to_storage();

        let c2 = ApiClient::load_from_storage();
        assert_eq!(c2.get_auth_token().as_deref(), Some("t1"));

        ApiClient::clear_storage();
        let c3 = ApiClient::load_from_storage();
        assert!(c3.get_auth_token().is_none());
    }

    #[wasm_bindgen_test]
    fn test_user_storage_roundtrip() {
        let user = AccountInfo {
            extra: serde_json::json!({"_id": "u1", "name": "Ada"}),
        };
        save_user_to_storage(&user);
        let loaded = load_user_from_storage().expect("should load user from localStorage");
        assert_eq!(loaded.extra["name"], "Ada");
    }

    #[wasm_bindgen_test]
    fn test_editor_unmount_releases_global_hooks() {
        use crate::pages::EditorPage;
        use crate::state::{AppContext, AppState};
        use leptos::prelude::*;
        use leptos_router::components::Router;
        use wasm_bindgen::JsCast;

        let document = web_sys::window()
            .expect("window")
            .document()
            .expect("document");
        let host = document.create_element("div").expect("host element");
        document
            .body()
            .expect("body")
            .append_child(&host)
            .expect("attach host");

        // Mounting registers the keydown listener and the status-line
        // interval; dropping the handle unmounts and must release both
        // through on_cleanup (a leaked interval would keep writing a
        // disposed signal).
        let handle = leptos::mount::mount_to(host.clone().unchecked_into(), || {
            provide_context(AppContext(AppState::new()));
            view! {
                <Router>
                    <EditorPage />
                </Router>
            }
        });
        drop(handle);
        host.remove();
    }

    #[wasm_bindgen_test]
    fn test_local_draft_store_roundtrip() {
        let store = LocalDraftStore;
        store.remove("autosave_wasm_test");

        assert!(store.get("autosave_wasm_test").is_none());
        store
            .set("autosave_wasm_test", r#"{"title":"t"}"#)
            .expect("localStorage write should succeed");
        assert_eq!(
            store.get("autosave_wasm_test").as_deref(),
            Some(r#"{"title":"t"}"#)
        );

        store.remove("autosave_wasm_test");
        assert!(store.get("autosave_wasm_test").is_none());
    }
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}
