use crate::{ItemIdentity, ItemReference, MalformedReferenceError, OutcomeKind};

/// One freshly discovered reference, annotated by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub reference: ItemReference,
    pub identity: Result<ItemIdentity, MalformedReferenceError>,
    /// Whether the ledger already holds `identity`.
    pub in_ledger: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the session.
    Start,
    /// Result of a `discover()` pass, in rendered order.
    Discovered(Vec<Candidate>),
    /// The in-flight fetch returned.
    FetchCompleted {
        outcome: OutcomeKind,
        /// The secondary context could not be closed cleanly.
        teardown_failed: bool,
    },
    /// The ledger write for the last successful fetch returned.
    Recorded { durable: bool },
    /// Result of an `advance()` call.
    Advanced { more: bool },
    /// A stop was requested between effects.
    StopRequested,
}
