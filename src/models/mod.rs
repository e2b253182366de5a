use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Backend account info object.
///
/// The API returns this under the `user` field on login.
/// We keep it flexible to avoid breaking when backend fields evolve.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct AccountInfo {
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl AccountInfo {
    pub fn id(&self) -> Option<String> {
        self.extra
            .get("_id")
            .or_else(|| self.extra.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn name(&self) -> Option<String> {
        self.extra
            .get("name")
            .or_else(|| self.extra.get("username"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct AuthorRef {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// One reaction entry on a post or comment, keyed by symbol.
///
/// The backend serves two shapes for the same field: a list of reactor
/// user ids (when identity matters) or a bare count. Both must render.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub(crate) enum ReactionValue {
    Reactors(Vec<String>),
    Count(u64),
}

impl ReactionValue {
    pub fn count(&self) -> u64 {
        match self {
            ReactionValue::Reactors(ids) => ids.len() as u64,
            ReactionValue::Count(n) => *n,
        }
    }
}

pub(crate) type ReactionLedger = BTreeMap<String, ReactionValue>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: AuthorRef,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(default)]
    pub reactions: ReactionLedger,
}

/// A single comment as served by the API, or created locally while an
/// optimistic submission is in flight.
///
/// Comments form a forest via `parent_id`; `created_at` is an ISO-8601
/// string, so lexicographic order is chronological order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct CommentRecord {
    /// Server-assigned id, or a `tmp-` local id while pending.
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "parentComment", default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub author: AuthorRef,

    pub content: String,

    #[serde(rename = "createdAt", default)]
    pub created_at: String,

    #[serde(default)]
    pub reactions: ReactionLedger,

    /// True while an optimistic write has not been confirmed.
    /// Never serialized to the backend.
    #[serde(default, skip_serializing)]
    pub pending: bool,
}
