use std::fmt;

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The cursor stopped advancing: attempt budget spent or no new items.
    ContentExhausted,
    /// `target_count` downloads were reached.
    TargetReached,
    /// A cooperative stop was honored at a transition boundary.
    StopRequested,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::ContentExhausted => write!(f, "end of gallery"),
            EndReason::TargetReached => write!(f, "target count reached"),
            EndReason::StopRequested => write!(f, "stop requested"),
        }
    }
}

/// Per-attempt result of a fetch, without the error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    AlreadyAbsent,
    TransientFailure,
    PermanentFailure,
}

/// Running counters of a harvest session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressReport {
    pub discovered: u64,
    pub downloaded: u64,
    pub skipped_already_present: u64,
    pub already_absent: u64,
    pub malformed: u64,
    pub transient_failures: u64,
    pub permanent_failures: u64,
    /// Downloads whose ledger entry could not be made durable.
    pub record_failures: u64,
    pub teardown_failures: u64,
    pub scroll_advances: u64,
    pub end_reason: Option<EndReason>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered={} downloaded={} skipped={} absent={} malformed={} transient={} permanent={}",
            self.discovered,
            self.downloaded,
            self.skipped_already_present,
            self.already_absent,
            self.malformed,
            self.transient_failures,
            self.permanent_failures,
        )?;
        if self.record_failures > 0 {
            write!(f, " unrecorded={}", self.record_failures)?;
        }
        if self.teardown_failures > 0 {
            write!(f, " teardown_failures={}", self.teardown_failures)?;
        }
        Ok(())
    }
}
