//! Gallery core: identity resolution, session configuration and the pure
//! harvest state machine.
mod config;
mod effect;
mod identity;
mod msg;
mod report;
mod state;
mod update;

pub use config::{ConfigError, MarkupRules, SessionConfig, SessionLimits, MAX_FETCH_ATTEMPTS};
pub use effect::Effect;
pub use identity::{
    identity_of, IdentityResolver, ItemIdentity, ItemReference, MalformedReferenceError,
};
pub use msg::{Candidate, Msg};
pub use report::{EndReason, OutcomeKind, ProgressReport};
pub use state::{HarvestSession, HarvestState, PendingItem};
pub use update::update;
