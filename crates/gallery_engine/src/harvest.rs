//! Sequential effect runner around the pure `gallery_core::update` machine.
//!
//! The runner owns the IO components and turns every effect into exactly one
//! message. Cancellation is only observed between effects, and never between
//! a successful fetch and its ledger record.

use std::collections::VecDeque;
use std::sync::Arc;

use gallery_core::{
    update, Candidate, Effect, HarvestSession, IdentityResolver, Msg, OutcomeKind, PendingItem,
    ProgressReport, SessionLimits,
};
use gallery_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn};
use tokio_util::sync::CancellationToken;

use crate::context::ContextError;
use crate::cursor::GalleryCursor;
use crate::executor::FetchExecutor;
use crate::ledger::Ledger;
use crate::sink::MediaSink;
use crate::types::FetchOutcome;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The gallery context went away; `report` holds what was done before.
    #[error("primary viewing context lost: {source}")]
    PrimaryContextLost {
        source: ContextError,
        report: Box<ProgressReport>,
    },
}

impl HarvestError {
    pub fn report(&self) -> &ProgressReport {
        match self {
            HarvestError::PrimaryContextLost { report, .. } => report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    Progress(ProgressReport),
    Finished(ProgressReport),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Writes progress to the log; the default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::Progress(report) => harvest_debug!("Progress: {}", report),
            HarvestEvent::Finished(report) => harvest_info!("Finished: {}", report),
        }
    }
}

pub struct HarvestLoop {
    cursor: GalleryCursor,
    executor: FetchExecutor,
    resolver: IdentityResolver,
    limits: SessionLimits,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl HarvestLoop {
    pub fn new(
        cursor: GalleryCursor,
        executor: FetchExecutor,
        resolver: IdentityResolver,
        limits: SessionLimits,
    ) -> Self {
        Self {
            cursor,
            executor,
            resolver,
            limits,
            progress: Arc::new(LogProgressSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cursor(&self) -> &GalleryCursor {
        &self.cursor
    }

    /// Runs one session to completion. Per-item failures are counted in the
    /// report; only losing the primary context ends the run with an error.
    /// Timeouts and failed commands on the gallery are absorbed by the cursor.
    pub async fn run(
        &mut self,
        ledger: &mut dyn Ledger,
        sink: &dyn MediaSink,
    ) -> Result<ProgressReport, HarvestError> {
        let (mut session, effects) = update(HarvestSession::new(self.limits), Msg::Start);
        let mut pending: VecDeque<Effect> = effects.into();
        let mut stop_sent = false;

        while let Some(effect) = pending.pop_front() {
            let interruptible = !matches!(effect, Effect::Record { .. } | Effect::Finish { .. });
            if interruptible && !stop_sent && self.cancel.is_cancelled() {
                harvest_info!("Stop requested; ending session");
                stop_sent = true;
                let (next, effects) = update(session, Msg::StopRequested);
                session = next;
                pending = effects.into();
                continue;
            }

            let Some(msg) = self.execute(effect, &session, ledger, sink).await? else {
                continue;
            };
            // A successful fetch is reported once its record lands.
            let emit_progress = match &msg {
                Msg::Recorded { .. } => true,
                Msg::FetchCompleted { outcome, .. } => *outcome != OutcomeKind::Success,
                _ => false,
            };
            let (next, effects) = update(session, msg);
            session = next;
            if emit_progress {
                self.progress
                    .emit(HarvestEvent::Progress(session.report().clone()));
            }
            pending.extend(effects);
        }

        Ok(session.report().clone())
    }

    async fn execute(
        &mut self,
        effect: Effect,
        session: &HarvestSession,
        ledger: &mut dyn Ledger,
        sink: &dyn MediaSink,
    ) -> Result<Option<Msg>, HarvestError> {
        let lost = |source: ContextError| {
            harvest_error!("Lost the gallery context: {}", source);
            HarvestError::PrimaryContextLost {
                source,
                report: Box::new(session.report().clone()),
            }
        };

        match effect {
            Effect::Discover => {
                let references = self.cursor.discover().await.map_err(lost)?;
                let candidates: Vec<Candidate> = references
                    .into_iter()
                    .filter(|reference| !session.has_seen(reference))
                    .map(|reference| {
                        let identity = self.resolver.identity_of(&reference);
                        if let Err(err) = &identity {
                            harvest_warn!("Skipping {}", err);
                        }
                        let in_ledger = identity.as_ref().is_ok_and(|id| ledger.contains(id));
                        Candidate {
                            reference,
                            identity,
                            in_ledger,
                        }
                    })
                    .collect();
                harvest_debug!("Discovered {} new reference(s)", candidates.len());
                Ok(Some(Msg::Discovered(candidates)))
            }
            Effect::Fetch { item, attempt } => {
                let report = self.executor.fetch(&item, sink).await;
                log_outcome(&item, attempt, &report.outcome);
                Ok(Some(Msg::FetchCompleted {
                    outcome: report.outcome.kind(),
                    teardown_failed: report.teardown_error.is_some(),
                }))
            }
            Effect::Record { item } => {
                let durable = match ledger.record(&item.identity) {
                    Ok(_) => true,
                    Err(err) => {
                        harvest_error!(
                            "Downloaded {} but could not record it: {}",
                            item.identity,
                            err
                        );
                        false
                    }
                };
                Ok(Some(Msg::Recorded { durable }))
            }
            Effect::Advance => {
                let more = self.cursor.advance().await.map_err(lost)?;
                if more {
                    match self.cursor.position().await {
                        Ok(position) => harvest_debug!("Gallery scrolled to offset {}", position),
                        Err(err) if err.is_lost() => return Err(lost(err)),
                        Err(err) => harvest_warn!("Could not read gallery offset: {}", err),
                    }
                }
                Ok(Some(Msg::Advanced { more }))
            }
            Effect::Finish { report } => {
                harvest_info!(
                    "Session ended ({}) after {} advance(s): {}",
                    report
                        .end_reason
                        .map(|reason| reason.to_string())
                        .unwrap_or_default(),
                    self.cursor.attempts(),
                    report
                );
                self.progress.emit(HarvestEvent::Finished(report));
                Ok(None)
            }
        }
    }
}

fn log_outcome(item: &PendingItem, attempt: u32, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success(stored) => harvest_info!(
            "Saved {} ({} bytes) to {:?}",
            item.identity,
            stored.bytes_written,
            stored.path
        ),
        FetchOutcome::AlreadyAbsent(err) => {
            harvest_info!("{} is gone from the source: {}", item.identity, err)
        }
        FetchOutcome::TransientFailure(err) => harvest_warn!(
            "Attempt {} for {} failed: {}",
            attempt,
            item.identity,
            err
        ),
        FetchOutcome::PermanentFailure(err) => {
            harvest_warn!("Giving up on {}: {}", item.identity, err)
        }
    }
}
