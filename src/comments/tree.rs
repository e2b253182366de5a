use crate::models::{CommentRecord, ReactionValue};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One comment with its direct replies, ready for nested rendering.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CommentNode {
    pub record: CommentRecord,
    pub children: Vec<CommentNode>,
}

/// Assemble the flat comment collection into an ordered forest.
///
/// One bucketing pass groups records by parent id; assembly then walks
/// the buckets from the roots. Siblings (and roots) are ordered by
/// `created_at` ascending, with arrival order as the tie-break (the
/// bucket sort is stable). A record whose parent id does not resolve is
/// promoted to root: comment fetches can be partial or arrive out of
/// order, and an orphan must still render somewhere.
pub(crate) fn build_tree(records: &[CommentRecord]) -> Vec<CommentNode> {
    if records.is_empty() {
        return vec![];
    }

    let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();

    let mut by_parent: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        let parent = match &r.parent_id {
            Some(p) if ids.contains(p.as_str()) => Some(p.clone()),
            Some(p) => {
                leptos::logging::warn!(
                    "comment {} references missing parent {}; promoting to root",
                    r.id,
                    p
                );
                None
            }
            None => None,
        };
        by_parent.entry(parent).or_default().push(i);
    }

    for bucket in by_parent.values_mut() {
        bucket.sort_by(|&a, &b| records[a].created_at.cmp(&records[b].created_at));
    }

    let mut visited = vec![false; records.len()];
    let mut roots: Vec<CommentNode> = vec![];

    if let Some(root_idxs) = by_parent.get(&None) {
        for &i in root_idxs.clone().iter() {
            roots.push(assemble(i, records, &by_parent, &mut visited));
        }
    }

    // Records only reachable through a parent cycle never get visited
    // from a root. Promote them too instead of dropping user content.
    for i in 0..records.len() {
        if !visited[i] {
            leptos::logging::warn!(
                "comment {} is part of a parent cycle; promoting to root",
                records[i].id
            );
            roots.push(assemble(i, records, &by_parent, &mut visited));
        }
    }
    roots.sort_by(|a, b| a.record.created_at.cmp(&b.record.created_at));

    roots
}

fn assemble(
    i: usize,
    records: &[CommentRecord],
    by_parent: &HashMap<Option<String>, Vec<usize>>,
    visited: &mut Vec<bool>,
) -> CommentNode {
    visited[i] = true;
    let record = records[i].clone();

    let mut children = vec![];
    if let Some(kids) = by_parent.get(&Some(record.id.clone())) {
        for &j in kids {
            if !visited[j] {
                children.push(assemble(j, records, by_parent, visited));
            }
        }
    }

    CommentNode { record, children }
}

/// Symbol -> count, collapsing both ledger shapes (reactor-id list and
/// raw count) into the number the UI renders.
pub(crate) fn count_reactions_by_symbol(record: &CommentRecord) -> BTreeMap<String, u64> {
    record
        .reactions
        .iter()
        .map(|(symbol, value)| (symbol.clone(), value.count()))
        .collect()
}

/// Whether `user_id` reacted with `symbol`. A count-only ledger carries
/// no identity, so it never reports the acting user as reacted.
pub(crate) fn user_reacted(record: &CommentRecord, symbol: &str, user_id: &str) -> bool {
    match record.reactions.get(symbol) {
        Some(ReactionValue::Reactors(ids)) => ids.iter().any(|id| id == user_id),
        Some(ReactionValue::Count(_)) | None => false,
    }
}
