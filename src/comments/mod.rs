mod store;
mod tree;

pub(crate) use store::{CommentError, CommentStore, SubmitFailure};
pub(crate) use tree::{build_tree, count_reactions_by_symbol, user_reacted, CommentNode};
