use crate::models::{AccountInfo, CommentRecord, Post, ReactionLedger};
use crate::storage::{TOKEN_KEY, USER_KEY};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_api_url = "http://localhost:5001/api".to_string();

        // We support BOTH `window.ENV.API_URL` and `window.ENV.api_url`
        // (legacy/implementation detail) for compatibility.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    // 1) Prefer API_URL
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }

                    // 2) Fallback: api_url
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"api_url".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }
                }
            }
        }

        Self {
            api_url: default_api_url,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn get_api_url() -> String {
    EnvConfig::new().api_url
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub user: AccountInfo,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CreateCommentRequest {
    pub content: String,

    /// Parent comment id; omitted for a top-level comment.
    #[serde(rename = "parentComment", skip_serializing_if = "Option::is_none")]
    pub parent_comment: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct ReactionRequest {
    pub emoji: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct PublishPostRequest {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "metaTitle", skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(rename = "metaDescription", skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
}

/// Reaction target kinds the backend distinguishes by route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReactionTarget {
    Post(String),
    Comment(String),
}

impl ReactionTarget {
    pub fn id(&self) -> &str {
        match self {
            ReactionTarget::Post(id) | ReactionTarget::Comment(id) => id,
        }
    }

    fn reaction_path(&self) -> String {
        match self {
            ReactionTarget::Post(id) => format!("/posts/{}/reaction", urlencoding::encode(id)),
            ReactionTarget::Comment(id) => {
                format!("/comments/{}/reaction", urlencoding::encode(id))
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    #[allow(dead_code)]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn load_from_storage() -> Self {
        let base_url = get_api_url();
        let token = leptos::web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .and_then(|s| s.get_item(TOKEN_KEY).ok().flatten());

        Self { base_url, token }
    }

    pub fn save_to_storage(&self) {
        if let Some(storage) =
            leptos::web_sys::window().and_then(|w| w.local_storage().ok().flatten())
        {
            if let Some(token) = &self.token {
                let _ = storage.set_item(TOKEN_KEY, token);
            }
        }
    }

    pub fn clear_storage() {
        if let Some(storage) =
            leptos::web_sys::window().and_then(|w| w.local_storage().ok().flatten())
        {
            let _ = storage.remove_item(TOKEN_KEY);
            let _ = storage.remove_item(USER_KEY);
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub(crate) fn get_auth_token(&self) -> Option<String> {
        self.token.clone()
    }

    pub fn logout(&mut self) {
        self.token = None;
        Self::clear_storage();
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn request_api<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&impl serde::Serialize>,
    ) -> ApiResult<T> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.request(method, url);
        req = Self::with_auth_headers(req, self.get_auth_token());

        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(ApiError::parse)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Request failed"))
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        self.request_api(
            reqwest::Method::POST,
            "/auth/login",
            Some(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }),
        )
        .await
    }

    /// The backend wraps payloads as `{"success": ..., "data": ...}`;
    /// some older routes return the payload bare. Accept both.
    pub(crate) fn unwrap_data_field(data: serde_json::Value) -> serde_json::Value {
        match data {
            serde_json::Value::Object(mut map) => map
                .remove("data")
                .unwrap_or(serde_json::Value::Object(map)),
            other => other,
        }
    }

    pub(crate) fn parse_comment_list_response(data: serde_json::Value) -> Vec<CommentRecord> {
        let list = match Self::unwrap_data_field(data) {
            serde_json::Value::Array(items) => items,
            other => other
                .get("comments")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
        };

        // Drop records the client cannot place in a thread rather than
        // failing the whole page on one malformed entry.
        list.into_iter()
            .filter_map(|item| serde_json::from_value::<CommentRecord>(item).ok())
            .filter(|c| !c.id.trim().is_empty())
            .collect()
    }

    pub(crate) fn parse_reaction_ledger_response(data: serde_json::Value) -> ReactionLedger {
        let inner = Self::unwrap_data_field(data);
        let raw = inner.get("reactions").cloned().unwrap_or(inner);
        serde_json::from_value(raw).unwrap_or_default()
    }

    pub(crate) fn parse_post_list_response(data: serde_json::Value) -> Vec<Post> {
        let list = match Self::unwrap_data_field(data) {
            serde_json::Value::Array(items) => items,
            other => other
                .get("posts")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
        };

        list.into_iter()
            .filter_map(|item| serde_json::from_value::<Post>(item).ok())
            .filter(|p| !p.id.trim().is_empty())
            .collect()
    }

    pub async fn get_posts(&self) -> ApiResult<Vec<Post>> {
        let data: serde_json::Value = self
            .request_api(reqwest::Method::GET, "/posts", None::<&()>)
            .await?;
        Ok(Self::parse_post_list_response(data))
    }

    pub async fn get_post(&self, slug: &str) -> ApiResult<Post> {
        let data: serde_json::Value = self
            .request_api(
                reqwest::Method::GET,
                &format!("/posts/{}", urlencoding::encode(slug)),
                None::<&()>,
            )
            .await?;
        serde_json::from_value(Self::unwrap_data_field(data)).map_err(ApiError::parse)
    }

    pub async fn get_comments_by_post(&self, post_id: &str) -> ApiResult<Vec<CommentRecord>> {
        let data: serde_json::Value = self
            .request_api(
                reqwest::Method::GET,
                &format!("/comments/post/{}", urlencoding::encode(post_id)),
                None::<&()>,
            )
            .await?;
        Ok(Self::parse_comment_list_response(data))
    }

    pub async fn create_comment(
        &self,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> ApiResult<CommentRecord> {
        let data: serde_json::Value = self
            .request_api(
                reqwest::Method::POST,
                &format!("/comments/{}", urlencoding::encode(post_id)),
                Some(&CreateCommentRequest {
                    content: content.to_string(),
                    parent_comment: parent_id.map(|s| s.to_string()),
                }),
            )
            .await?;
        serde_json::from_value(Self::unwrap_data_field(data)).map_err(ApiError::parse)
    }

    /// Add or remove one reaction and return the authoritative ledger
    /// for the target.
    pub async fn set_reaction(
        &self,
        target: &ReactionTarget,
        symbol: &str,
        add: bool,
    ) -> ApiResult<ReactionLedger> {
        let method = if add {
            reqwest::Method::POST
        } else {
            reqwest::Method::DELETE
        };

        let data: serde_json::Value = self
            .request_api(
                method,
                &target.reaction_path(),
                Some(&ReactionRequest {
                    emoji: symbol.to_string(),
                }),
            )
            .await?;
        Ok(Self::parse_reaction_ledger_response(data))
    }

    pub async fn publish_post(&self, req_body: PublishPostRequest) -> ApiResult<Post> {
        let data: serde_json::Value = self
            .request_api(reqwest::Method::POST, "/posts", Some(&req_body))
            .await?;
        serde_json::from_value(Self::unwrap_data_field(data)).map_err(ApiError::parse)
    }
}
