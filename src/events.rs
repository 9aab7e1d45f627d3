//! Selection change notifications.
//!
//! Consumers (the poller, the session view) never observe staged edits; they
//! receive committed selections over a watch channel and re-read the latest
//! value on their own schedule. The channel is latest-wins, matching the
//! pull model: a consumer that wakes up late sees only the current selection.

use std::collections::BTreeSet;

use tokio::sync::watch;

use crate::selection::SelectionContext;

/// Emitted when a staged selection is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged {
    /// Which selection context was committed.
    pub context: SelectionContext,
    /// The full committed server set for that context.
    pub servers: BTreeSet<String>,
}

impl Default for SelectionChanged {
    fn default() -> Self {
        Self {
            context: SelectionContext::Monitoring,
            servers: BTreeSet::new(),
        }
    }
}

/// Receiving end of the committed-selection feed.
pub type SelectionFeed = watch::Receiver<SelectionChanged>;

/// Create a sender/receiver pair for selection notifications.
///
/// The initial value is an empty monitoring selection; `has_changed` is not
/// set until the first commit.
pub fn selection_channel() -> (watch::Sender<SelectionChanged>, SelectionFeed) {
    watch::channel(SelectionChanged::default())
}
