mod sync;
mod tab;

pub use sync::{SyncReport, TabSyncState, TransitionOutcome};
pub use tab::{
    IndexSnapshot, TabDescriptor, TabEntry, TabId, TabStatus, TabUpdateChange, is_eligible_url,
};
