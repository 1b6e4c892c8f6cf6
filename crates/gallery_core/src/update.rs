use crate::{
    Candidate, Effect, EndReason, HarvestSession, HarvestState, Msg, OutcomeKind, PendingItem,
};

/// Pure update function: applies a message to the session and returns the
/// effects the runner must execute next, in order.
pub fn update(mut session: HarvestSession, msg: Msg) -> (HarvestSession, Vec<Effect>) {
    if session.state == HarvestState::Done {
        return (session, Vec::new());
    }

    let effects = match msg {
        Msg::Start => {
            if session.state != HarvestState::Idle {
                return (session, Vec::new());
            }
            if session.target_reached() {
                session.finish(EndReason::TargetReached)
            } else {
                session.state = HarvestState::Discovering;
                vec![Effect::Discover]
            }
        }
        Msg::Discovered(candidates) => {
            if session.state != HarvestState::Discovering {
                return (session, Vec::new());
            }
            absorb_candidates(&mut session, candidates);
            session.next_step()
        }
        Msg::FetchCompleted {
            outcome,
            teardown_failed,
        } => {
            let Some((item, attempt)) = session.in_flight.take() else {
                return (session, Vec::new());
            };
            if teardown_failed {
                session.report.teardown_failures += 1;
            }
            match outcome {
                OutcomeKind::Success => {
                    // The ledger is written before the cursor is touched again.
                    session.state = HarvestState::Recording;
                    vec![Effect::Record { item }]
                }
                OutcomeKind::AlreadyAbsent => {
                    session.report.already_absent += 1;
                    session.next_step()
                }
                OutcomeKind::TransientFailure => {
                    session.report.transient_failures += 1;
                    if attempt < session.limits.max_fetch_attempts && !session.stop_requested {
                        retry(&mut session, item, attempt + 1)
                    } else {
                        session.report.permanent_failures += 1;
                        session.next_step()
                    }
                }
                OutcomeKind::PermanentFailure => {
                    session.report.permanent_failures += 1;
                    session.next_step()
                }
            }
        }
        Msg::Recorded { durable } => {
            if session.state != HarvestState::Recording {
                return (session, Vec::new());
            }
            session.report.downloaded += 1;
            if !durable {
                session.report.record_failures += 1;
            }
            session.next_step()
        }
        Msg::Advanced { more } => {
            if session.state != HarvestState::Scrolling {
                return (session, Vec::new());
            }
            session.report.scroll_advances += 1;
            if session.stop_requested {
                session.finish(EndReason::StopRequested)
            } else if more {
                session.state = HarvestState::Discovering;
                vec![Effect::Discover]
            } else {
                session.finish(EndReason::ContentExhausted)
            }
        }
        Msg::StopRequested => {
            session.stop_requested = true;
            if session.state == HarvestState::Recording {
                // Finishing the current item first; `Recorded` will end the session.
                Vec::new()
            } else {
                session.finish(EndReason::StopRequested)
            }
        }
    };

    (session, effects)
}

fn absorb_candidates(session: &mut HarvestSession, candidates: Vec<Candidate>) {
    for candidate in candidates {
        if !session.seen_references.insert(candidate.reference.clone()) {
            continue;
        }
        session.report.discovered += 1;
        match candidate.identity {
            Err(_) => session.report.malformed += 1,
            Ok(identity) => {
                if candidate.in_ledger || !session.seen_identities.insert(identity.clone()) {
                    session.report.skipped_already_present += 1;
                } else {
                    session.queue.push_back(PendingItem {
                        reference: candidate.reference,
                        identity,
                    });
                }
            }
        }
    }
}

fn retry(session: &mut HarvestSession, item: PendingItem, attempt: u32) -> Vec<Effect> {
    session.state = HarvestState::PerItemFetch;
    session.in_flight = Some((item.clone(), attempt));
    vec![Effect::Fetch { item, attempt }]
}
