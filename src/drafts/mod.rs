mod autosave;

pub(crate) use autosave::{
    AutosaveController,
    DraftFields,
    DraftStore,
    LocalDraftStore,
    PersistenceError,
    SeoMeta,
};
