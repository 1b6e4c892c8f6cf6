use std::collections::{HashSet, VecDeque};

use crate::{EndReason, Effect, ItemIdentity, ItemReference, ProgressReport, SessionLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarvestState {
    #[default]
    Idle,
    Discovering,
    PerItemFetch,
    Recording,
    Scrolling,
    Done,
}

/// A reference that survived ledger and session filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub reference: ItemReference,
    pub identity: ItemIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestSession {
    pub(crate) state: HarvestState,
    pub(crate) limits: SessionLimits,
    pub(crate) queue: VecDeque<PendingItem>,
    pub(crate) in_flight: Option<(PendingItem, u32)>,
    pub(crate) seen_references: HashSet<ItemReference>,
    pub(crate) seen_identities: HashSet<ItemIdentity>,
    pub(crate) report: ProgressReport,
    pub(crate) stop_requested: bool,
}

impl HarvestSession {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn state(&self) -> HarvestState {
        self.state
    }

    pub fn report(&self) -> &ProgressReport {
        &self.report
    }

    pub fn is_done(&self) -> bool {
        self.state == HarvestState::Done
    }

    /// References seen this lifetime are not re-resolved.
    pub fn has_seen(&self, reference: &ItemReference) -> bool {
        self.seen_references.contains(reference)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn target_reached(&self) -> bool {
        self.limits
            .target_count
            .is_some_and(|target| self.report.downloaded >= target)
    }

    /// Pick the next queued item, or go back to scrolling.
    pub(crate) fn next_step(&mut self) -> Vec<Effect> {
        if self.stop_requested {
            return self.finish(EndReason::StopRequested);
        }
        if self.target_reached() {
            return self.finish(EndReason::TargetReached);
        }
        match self.queue.pop_front() {
            Some(item) => {
                self.state = HarvestState::PerItemFetch;
                self.in_flight = Some((item.clone(), 1));
                vec![Effect::Fetch { item, attempt: 1 }]
            }
            None => {
                self.state = HarvestState::Scrolling;
                vec![Effect::Advance]
            }
        }
    }

    pub(crate) fn finish(&mut self, reason: EndReason) -> Vec<Effect> {
        self.state = HarvestState::Done;
        self.in_flight = None;
        self.queue.clear();
        self.report.end_reason = Some(reason);
        vec![Effect::Finish {
            report: self.report.clone(),
        }]
    }
}
