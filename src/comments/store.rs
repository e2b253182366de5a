use crate::api::{ApiClient, ApiError, ReactionTarget};
use crate::comments::tree::user_reacted;
use crate::models::{AuthorRef, CommentRecord, ReactionLedger, ReactionValue};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A discussion mutation failed.
///
/// `SubmissionFailed`/`ReactionFailed` wrap a collaborator error after
/// the optimistic change was rolled back; `UnknownTarget` is a local
/// validation failure that never reaches the network.
#[derive(Clone, Debug)]
pub(crate) enum CommentError {
    SubmissionFailed(ApiError),
    ReactionFailed(ApiError),
    UnknownTarget { target_id: String },
}

impl std::fmt::Display for CommentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentError::SubmissionFailed(e) => write!(f, "comment submission failed: {e}"),
            CommentError::ReactionFailed(e) => write!(f, "reaction update failed: {e}"),
            CommentError::UnknownTarget { target_id } => {
                write!(f, "no such comment or post: {target_id}")
            }
        }
    }
}

/// Handed back to the caller when a submission rolls back, so the UI
/// can restore the typed content instead of losing it.
#[derive(Clone, Debug)]
pub(crate) struct SubmitFailure {
    pub error: CommentError,
    pub content: String,
    pub parent_id: Option<String>,
}

/// Local ids for optimistic records. Must never be sent to the backend
/// as real ids.
pub(crate) fn make_tmp_comment_id(now_ms: u64, rand: u64) -> String {
    format!("tmp-{now_ms}-{rand}")
}

pub(crate) fn is_tmp_comment_id(id: &str) -> bool {
    id.starts_with("tmp-")
}

/// Append an optimistic record to the visible collection.
pub(crate) fn insert_optimistic(records: &mut Vec<CommentRecord>, record: CommentRecord) {
    records.push(record);
}

/// Replace the optimistic record with the authoritative one, in place,
/// and repoint any reply that referenced the local id. Returns false
/// when the local id is no longer present (already rolled back).
pub(crate) fn confirm_optimistic(
    records: &mut [CommentRecord],
    local_id: &str,
    mut authoritative: CommentRecord,
) -> bool {
    let Some(pos) = records.iter().position(|r| r.id == local_id) else {
        return false;
    };

    authoritative.pending = false;
    let real_id = authoritative.id.clone();
    records[pos] = authoritative;

    for r in records.iter_mut() {
        if r.parent_id.as_deref() == Some(local_id) {
            r.parent_id = Some(real_id.clone());
        }
    }

    true
}

/// Remove the optimistic record by local id. The insert appended one
/// record, so this restores the pre-submission collection exactly.
pub(crate) fn rollback_optimistic(records: &mut Vec<CommentRecord>, local_id: &str) {
    records.retain(|r| r.id != local_id);
}

/// Flip one user's reaction in a ledger, tolerating both shapes.
pub(crate) fn apply_reaction_flip(
    ledger: &mut ReactionLedger,
    symbol: &str,
    user_id: &str,
    add: bool,
) {
    let entry = ledger
        .entry(symbol.to_string())
        .or_insert_with(|| ReactionValue::Reactors(vec![]));

    match entry {
        ReactionValue::Reactors(ids) => {
            if add {
                if !ids.iter().any(|id| id == user_id) {
                    ids.push(user_id.to_string());
                }
            } else {
                ids.retain(|id| id != user_id);
            }
        }
        ReactionValue::Count(n) => {
            if add {
                *n += 1;
            } else {
                *n = n.saturating_sub(1);
            }
        }
    }
}

/// Serialization state for one (target id, symbol) pair: while a toggle
/// is in flight, later toggles queue and apply only after it resolves.
#[derive(Default)]
struct ToggleLane {
    busy: bool,
    queued: u32,
}

/// Admit a toggle into the lane. Returns true when it may start now.
fn lane_admit(lane: &mut ToggleLane) -> bool {
    if lane.busy {
        lane.queued += 1;
        false
    } else {
        lane.busy = true;
        true
    }
}

/// Release the lane after a toggle resolved. Returns true when a queued
/// toggle should start (the lane stays busy for it).
fn lane_release(lane: &mut ToggleLane) -> bool {
    if lane.queued > 0 {
        lane.queued -= 1;
        true
    } else {
        lane.busy = false;
        false
    }
}

/// Owns the comment collection for one post and applies optimistic
/// mutations against it.
///
/// Every mutation is `applied locally -> {confirmed | rolled back}`;
/// the renderer only ever sees the applied state, and a rollback
/// restores the prior collection exactly. No automatic retries: the
/// caller decides what to offer the user.
#[derive(Clone)]
pub(crate) struct CommentStore {
    post_id: String,
    pub comments: RwSignal<Vec<CommentRecord>>,
    pub post_reactions: RwSignal<ReactionLedger>,
    toggle_lanes: Arc<Mutex<HashMap<(String, String), ToggleLane>>>,
}

impl CommentStore {
    pub fn new(post_id: &str, post_reactions: ReactionLedger) -> Self {
        Self {
            post_id: post_id.to_string(),
            comments: RwSignal::new(vec![]),
            post_reactions: RwSignal::new(post_reactions),
            toggle_lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set_comments(&self, records: Vec<CommentRecord>) {
        self.comments.set(records);
    }

    /// Insert a pending record immediately, then submit. On success the
    /// record is confirmed in place; on failure it is removed and the
    /// typed content is handed back through `on_error`.
    pub fn submit_comment(
        &self,
        api: ApiClient,
        author: AuthorRef,
        content: String,
        parent_id: Option<String>,
        on_error: Callback<SubmitFailure>,
    ) -> Result<(), CommentError> {
        if content.trim().is_empty() {
            return Ok(());
        }

        if let Some(parent) = &parent_id {
            // A pending parent has no server id yet; replying to it
            // would send a tmp id to the network as `parentComment`.
            let known = !is_tmp_comment_id(parent)
                && self
                    .comments
                    .get_untracked()
                    .iter()
                    .any(|r| &r.id == parent);
            if !known {
                return Err(CommentError::UnknownTarget {
                    target_id: parent.clone(),
                });
            }
        }

        let local_id = make_tmp_comment_id(
            crate::util::now_ms() as u64,
            (js_sys::Math::random() * 1e9) as u64,
        );

        let pending = CommentRecord {
            id: local_id.clone(),
            parent_id: parent_id.clone(),
            author,
            content: content.clone(),
            created_at: js_sys::Date::new_0()
                .to_iso_string()
                .as_string()
                .unwrap_or_default(),
            reactions: ReactionLedger::new(),
            pending: true,
        };

        self.comments.update(|xs| insert_optimistic(xs, pending));

        let post_id = self.post_id.clone();
        let s2 = self.clone();
        spawn_local(async move {
            match api
                .create_comment(&post_id, &content, parent_id.as_deref())
                .await
            {
                Ok(record) => {
                    s2.comments.update(|xs| {
                        confirm_optimistic(xs, &local_id, record);
                    });
                }
                Err(e) => {
                    s2.comments.update(|xs| rollback_optimistic(xs, &local_id));
                    on_error.run(SubmitFailure {
                        error: CommentError::SubmissionFailed(e),
                        content,
                        parent_id,
                    });
                }
            }
        });

        Ok(())
    }

    /// Flip the acting user's reaction on a post or comment, then sync
    /// with the backend. Toggles on the same (target, symbol) pair are
    /// serialized: one in flight at a time, later ones queued.
    pub fn toggle_reaction(
        &self,
        api: ApiClient,
        user_id: &str,
        target: ReactionTarget,
        symbol: &str,
        on_error: Callback<CommentError>,
    ) -> Result<(), CommentError> {
        self.validate_target(&target)?;

        let key = (target.id().to_string(), symbol.to_string());
        let admitted = {
            let Ok(mut lanes) = self.toggle_lanes.lock() else {
                return Ok(());
            };
            lane_admit(lanes.entry(key).or_default())
        };

        if admitted {
            self.start_toggle(api, user_id.to_string(), target, symbol.to_string(), on_error);
        }
        Ok(())
    }

    fn validate_target(&self, target: &ReactionTarget) -> Result<(), CommentError> {
        let known = match target {
            ReactionTarget::Post(id) => id == &self.post_id,
            ReactionTarget::Comment(id) => {
                // A pending comment has no server id yet; reacting to it
                // would send a tmp id to the network.
                !is_tmp_comment_id(id)
                    && self.comments.get_untracked().iter().any(|r| &r.id == id)
            }
        };

        if known {
            Ok(())
        } else {
            Err(CommentError::UnknownTarget {
                target_id: target.id().to_string(),
            })
        }
    }

    fn start_toggle(
        &self,
        api: ApiClient,
        user_id: String,
        target: ReactionTarget,
        symbol: String,
        on_error: Callback<CommentError>,
    ) {
        let add = !self.currently_reacted(&target, &symbol, &user_id);
        self.apply_flip(&target, &symbol, &user_id, add);

        let s2 = self.clone();
        spawn_local(async move {
            match api.set_reaction(&target, &symbol, add).await {
                Ok(ledger) => s2.set_target_ledger(&target, ledger),
                Err(e) => {
                    s2.apply_flip(&target, &symbol, &user_id, !add);
                    on_error.run(CommentError::ReactionFailed(e));
                }
            }

            let key = (target.id().to_string(), symbol.clone());
            let start_next = {
                let Ok(mut lanes) = s2.toggle_lanes.lock() else {
                    return;
                };
                lanes.get_mut(&key).map(lane_release).unwrap_or(false)
            };

            if start_next {
                s2.start_toggle(api, user_id, target, symbol, on_error);
            }
        });
    }

    fn currently_reacted(&self, target: &ReactionTarget, symbol: &str, user_id: &str) -> bool {
        match target {
            ReactionTarget::Post(_) => {
                match self.post_reactions.get_untracked().get(symbol) {
                    Some(ReactionValue::Reactors(ids)) => ids.iter().any(|id| id == user_id),
                    _ => false,
                }
            }
            ReactionTarget::Comment(id) => self
                .comments
                .get_untracked()
                .iter()
                .find(|r| &r.id == id)
                .map(|r| user_reacted(r, symbol, user_id))
                .unwrap_or(false),
        }
    }

    fn apply_flip(&self, target: &ReactionTarget, symbol: &str, user_id: &str, add: bool) {
        match target {
            ReactionTarget::Post(_) => {
                self.post_reactions
                    .update(|ledger| apply_reaction_flip(ledger, symbol, user_id, add));
            }
            ReactionTarget::Comment(id) => {
                self.comments.update(|xs| {
                    if let Some(r) = xs.iter_mut().find(|r| &r.id == id) {
                        apply_reaction_flip(&mut r.reactions, symbol, user_id, add);
                    }
                });
            }
        }
    }

    /// Overwrite the target's ledger with the authoritative one the
    /// backend returned for a confirmed toggle.
    fn set_target_ledger(&self, target: &ReactionTarget, ledger: ReactionLedger) {
        match target {
            ReactionTarget::Post(_) => self.post_reactions.set(ledger),
            ReactionTarget::Comment(id) => {
                self.comments.update(|xs| {
                    if let Some(r) = xs.iter_mut().find(|r| &r.id == id) {
                        r.reactions = ledger;
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, parent: Option<&str>) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            parent_id: parent.map(|s| s.to_string()),
            author: AuthorRef::default(),
            content: format!("comment {id}"),
            created_at: "2026-08-01T10:00:00.000Z".to_string(),
            reactions: ReactionLedger::new(),
            pending: false,
        }
    }

    fn pending_record(local_id: &str, content: &str) -> CommentRecord {
        CommentRecord {
            id: local_id.to_string(),
            parent_id: None,
            author: AuthorRef::default(),
            content: content.to_string(),
            created_at: "2026-08-01T12:00:00.000Z".to_string(),
            reactions: ReactionLedger::new(),
            pending: true,
        }
    }

    #[test]
    fn test_tmp_ids() {
        let id = make_tmp_comment_id(123, 456);
        assert_eq!(id, "tmp-123-456");
        assert!(is_tmp_comment_id(&id));
        assert!(!is_tmp_comment_id("c1"));
    }

    #[test]
    fn test_confirm_keeps_position_and_clears_pending() {
        let mut records = vec![record("c1", None), pending_record("tmp-1-1", "hi")];
        records.push(record("c2", None));

        let mut authoritative = record("c99", None);
        authoritative.content = "hi".to_string();
        authoritative.pending = true; // server shape never carries this; must be cleared

        assert!(confirm_optimistic(&mut records, "tmp-1-1", authoritative));
        assert_eq!(records[1].id, "c99");
        assert!(!records[1].pending);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_confirm_repoints_replies_to_real_id() {
        let mut records = vec![
            pending_record("tmp-1-1", "root"),
            record("r1", Some("tmp-1-1")),
        ];
        assert!(confirm_optimistic(&mut records, "tmp-1-1", record("c9", None)));
        assert_eq!(records[1].parent_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_confirm_after_rollback_is_a_no_op() {
        let mut records = vec![record("c1", None)];
        assert!(!confirm_optimistic(&mut records, "tmp-1-1", record("c9", None)));
        assert_eq!(records, vec![record("c1", None)]);
    }

    #[test]
    fn test_rollback_restores_collection_exactly() {
        let before = vec![record("c1", None), record("c2", Some("c1"))];

        let mut records = before.clone();
        insert_optimistic(&mut records, pending_record("tmp-1-1", "oops"));
        assert_eq!(records.len(), 3);

        rollback_optimistic(&mut records, "tmp-1-1");
        assert_eq!(records, before);
    }

    #[test]
    fn test_apply_flip_reactor_list() {
        let mut ledger = ReactionLedger::new();

        apply_reaction_flip(&mut ledger, "👍", "u1", true);
        apply_reaction_flip(&mut ledger, "👍", "u1", true); // no double add
        assert_eq!(ledger.get("👍").map(|v| v.count()), Some(1));

        apply_reaction_flip(&mut ledger, "👍", "u2", true);
        assert_eq!(ledger.get("👍").map(|v| v.count()), Some(2));

        apply_reaction_flip(&mut ledger, "👍", "u1", false);
        assert_eq!(ledger.get("👍").map(|v| v.count()), Some(1));

        // Removing an id that is not there changes nothing.
        apply_reaction_flip(&mut ledger, "👍", "u9", false);
        assert_eq!(ledger.get("👍").map(|v| v.count()), Some(1));
    }

    #[test]
    fn test_apply_flip_count_shape() {
        let mut ledger = ReactionLedger::new();
        ledger.insert("🔥".to_string(), ReactionValue::Count(1));

        apply_reaction_flip(&mut ledger, "🔥", "u1", true);
        assert_eq!(ledger.get("🔥").map(|v| v.count()), Some(2));

        apply_reaction_flip(&mut ledger, "🔥", "u1", false);
        apply_reaction_flip(&mut ledger, "🔥", "u1", false);
        apply_reaction_flip(&mut ledger, "🔥", "u1", false); // saturates at zero
        assert_eq!(ledger.get("🔥").map(|v| v.count()), Some(0));
    }

    #[test]
    fn test_lane_admits_one_and_queues_the_rest() {
        let mut lane = ToggleLane::default();

        assert!(lane_admit(&mut lane));
        assert!(!lane_admit(&mut lane));
        assert!(!lane_admit(&mut lane));
        assert_eq!(lane.queued, 2);

        // First resolution starts one queued toggle; lane stays busy.
        assert!(lane_release(&mut lane));
        assert!(lane.busy);
        assert!(lane_release(&mut lane));
        assert!(!lane_release(&mut lane));
        assert!(!lane.busy);
    }

    #[test]
    fn test_serialized_toggles_end_not_reacted() {
        // Two rapid toggles on the same (target, symbol): the first
        // adds, the second must wait and then remove. Emulates the
        // lane-driven sequence with both requests resolving in order.
        let mut ledger = ReactionLedger::new();
        let mut lane = ToggleLane::default();

        let reacted =
            |l: &ReactionLedger| matches!(l.get("👍"), Some(ReactionValue::Reactors(ids)) if ids.iter().any(|i| i == "u1"));

        // Toggle 1 admitted: flips add, request goes out.
        assert!(lane_admit(&mut lane));
        let add1 = !reacted(&ledger);
        apply_reaction_flip(&mut ledger, "👍", "u1", add1);
        assert!(reacted(&ledger));

        // Toggle 2 arrives while in flight: queued, no local change yet.
        assert!(!lane_admit(&mut lane));
        assert!(reacted(&ledger));

        // Request 1 confirms; authoritative ledger matches the flip.
        // Release starts the queued toggle, which now sees "reacted"
        // and removes.
        assert!(lane_release(&mut lane));
        let add2 = !reacted(&ledger);
        assert!(!add2);
        apply_reaction_flip(&mut ledger, "👍", "u1", add2);

        // Request 2 confirms; nothing queued.
        assert!(!lane_release(&mut lane));
        assert!(!reacted(&ledger));
    }

    #[test]
    fn test_toggle_rollback_restores_prior_state() {
        let mut ledger = ReactionLedger::new();
        ledger.insert(
            "👍".to_string(),
            ReactionValue::Reactors(vec!["u2".to_string()]),
        );
        let before = ledger.clone();

        // Optimistic add, then the request fails: inverse flip.
        apply_reaction_flip(&mut ledger, "👍", "u1", true);
        apply_reaction_flip(&mut ledger, "👍", "u1", false);
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_reply_to_pending_parent_is_rejected() {
        // A pending record is visible in the collection, but its id is
        // local; a reply to it must not go out with that id as parent.
        let store = CommentStore::new("p1", ReactionLedger::new());
        store.set_comments(vec![record("c1", None), pending_record("tmp-1-1", "hi")]);

        let api = ApiClient::new("http://localhost:5001/api".to_string());
        let result = store.submit_comment(
            api,
            AuthorRef::default(),
            "reply".to_string(),
            Some("tmp-1-1".to_string()),
            Callback::new(|_| {}),
        );

        assert!(matches!(
            result,
            Err(CommentError::UnknownTarget { target_id }) if target_id == "tmp-1-1"
        ));
        // Nothing was inserted optimistically.
        assert_eq!(store.comments.get_untracked().len(), 2);
    }
}
