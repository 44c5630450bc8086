use serde::{Deserialize, Serialize};

/// Per-tab synchronizer state. Removal returns a tab to `Untracked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabSyncState {
    #[default]
    Untracked,
    Indexing,
    Indexed,
}

/// Result of one lifecycle transition for a single tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TransitionOutcome {
    /// Entry written; `with_text` is false when extraction was denied.
    Indexed { with_text: bool },
    /// Entry deleted.
    Removed,
    /// Ineligible url; no entry is kept.
    Skipped,
    /// The tab closed or moved on while extraction ran; the result was dropped.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub enumerated: usize,
    pub indexed: usize,
    pub indexed_without_text: usize,
    pub skipped_ineligible: usize,
    pub discarded: usize,
    /// Stored entries dropped because their tab is no longer open.
    pub pruned: usize,
    pub started_at: String,
    pub finished_at: String,
}

impl SyncReport {
    pub(crate) fn record(&mut self, outcome: TransitionOutcome) {
        match outcome {
            TransitionOutcome::Indexed { with_text } => {
                self.indexed += 1;
                if !with_text {
                    self.indexed_without_text += 1;
                }
            }
            TransitionOutcome::Skipped => self.skipped_ineligible += 1,
            TransitionOutcome::Discarded => self.discarded += 1,
            TransitionOutcome::Removed => {}
        }
    }
}
