use std::sync::atomic::{AtomicU64, Ordering};

/// Issues increasing tickets to fetches so a late, older response cannot
/// overwrite a newer one that was already applied.
#[derive(Debug, Default)]
pub struct RefreshSequencer {
    issued: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshSequencer {
    pub fn issue(&self) -> RefreshTicket {
        RefreshTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Highest ticket applied to one collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppliedMark(u64);

impl AppliedMark {
    /// Records `ticket` and returns true when it is newer than anything
    /// applied so far.
    pub fn admit(&mut self, ticket: RefreshTicket) -> bool {
        if ticket.0 > self.0 {
            self.0 = ticket.0;
            true
        } else {
            false
        }
    }
}
