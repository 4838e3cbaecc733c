use crate::models::request::{AcceptedRef, DeliveryRequest};

/// A channel event that touched the request list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JournalEntry {
    Pushed(DeliveryRequest),
    Accepted(AcceptedRef),
}

/// Position in the journal when a fetch started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JournalMark(u64);

/// Request-list events seen while at least one fetch is in flight, so a
/// snapshot that left the server before them can be brought up to date.
#[derive(Debug, Default)]
pub(crate) struct EventJournal {
    entries: Vec<JournalEntry>,
    base: u64,
    open: usize,
}

impl EventJournal {
    pub fn open(&mut self) -> JournalMark {
        self.open += 1;
        JournalMark(self.base + self.entries.len() as u64)
    }

    /// No-op unless a fetch is in flight.
    pub fn record(&mut self, entry: JournalEntry) {
        if self.open > 0 {
            self.entries.push(entry);
        }
    }

    /// Entries recorded since `mark`. The journal empties once the last
    /// open fetch closes.
    pub fn close(&mut self, mark: JournalMark) -> Vec<JournalEntry> {
        let start = mark.0.saturating_sub(self.base) as usize;
        let since = self
            .entries
            .get(start..)
            .map(<[JournalEntry]>::to_vec)
            .unwrap_or_default();

        self.open = self.open.saturating_sub(1);
        if self.open == 0 {
            self.base += self.entries.len() as u64;
            self.entries.clear();
        }
        since
    }
}

/// Applies missed events on top of a fetched snapshot. Pushed requests
/// replace any copy already in the snapshot.
pub(crate) fn replay(requests: &mut Vec<DeliveryRequest>, entries: Vec<JournalEntry>) {
    for entry in entries {
        match entry {
            JournalEntry::Pushed(request) => {
                requests.retain(|existing| existing.id != request.id);
                requests.insert(0, request);
            }
            JournalEntry::Accepted(accepted) => {
                requests.retain(|existing| !accepted.matches(existing));
            }
        }
    }
}
