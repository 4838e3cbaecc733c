//! Availability toggle as an explicit transition table.
//!
//! The flag shown to the runner flips before the server answers. Each
//! request in flight is settled by a `Confirmed` or `Rejected` event; once
//! nothing is in flight the state returns to `Idle` holding the last value
//! the server confirmed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Idle {
        online: bool,
    },
    Pending {
        confirmed: bool,
        optimistic: bool,
        in_flight: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityEvent {
    Toggle,
    Confirmed(bool),
    Rejected,
}

impl Availability {
    pub fn new(online: bool) -> Self {
        Availability::Idle { online }
    }

    /// What the runner sees right now.
    pub fn displayed(self) -> bool {
        match self {
            Availability::Idle { online } => online,
            Availability::Pending { optimistic, .. } => optimistic,
        }
    }

    pub fn confirmed(self) -> bool {
        match self {
            Availability::Idle { online } => online,
            Availability::Pending { confirmed, .. } => confirmed,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Availability::Pending { .. })
    }

    pub fn apply(self, event: AvailabilityEvent) -> Self {
        use Availability::{Idle, Pending};
        use AvailabilityEvent::{Confirmed, Rejected, Toggle};

        match (self, event) {
            (Idle { online }, Toggle) => Pending {
                confirmed: online,
                optimistic: !online,
                in_flight: 1,
            },
            (
                Pending {
                    confirmed,
                    optimistic,
                    in_flight,
                },
                Toggle,
            ) => Pending {
                confirmed,
                optimistic: !optimistic,
                in_flight: in_flight + 1,
            },

            (Pending { in_flight, .. }, Confirmed(online)) if in_flight <= 1 => Idle { online },
            (
                Pending {
                    optimistic,
                    in_flight,
                    ..
                },
                Confirmed(online),
            ) => Pending {
                confirmed: online,
                optimistic,
                in_flight: in_flight - 1,
            },

            // Later requests still carry the runner's latest intent, so only
            // the last rejection falls back to the confirmed value.
            (Pending { confirmed, in_flight, .. }, Rejected) if in_flight <= 1 => Idle {
                online: confirmed,
            },
            (
                Pending {
                    confirmed,
                    optimistic,
                    in_flight,
                },
                Rejected,
            ) => Pending {
                confirmed,
                optimistic,
                in_flight: in_flight - 1,
            },

            (Idle { .. }, Confirmed(online)) => Idle { online },
            (idle @ Idle { .. }, Rejected) => idle,
        }
    }
}
