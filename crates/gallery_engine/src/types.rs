use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use gallery_core::OutcomeKind;

use crate::context::ContextError;

/// One downloaded media resource, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub final_url: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FetchedResource {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where the sink put an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub path: PathBuf,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    TooSmall { min_bytes: u64, actual: u64 },
    UnsupportedContentType { content_type: String },
    Network,
    /// The secondary context could not be opened or read.
    Context,
    Navigation,
    /// No media address appeared before the resolve timeout.
    ResolveTimeout,
    MalformedMarkup,
    Sink,
}

/// How the harvest loop treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Absent,
    Permanent,
}

impl FailureKind {
    pub fn class(&self) -> FailureClass {
        match self {
            FailureKind::Timeout
            | FailureKind::Network
            | FailureKind::Context
            | FailureKind::Navigation
            | FailureKind::ResolveTimeout => FailureClass::Transient,
            FailureKind::HttpStatus(404 | 410) => FailureClass::Absent,
            FailureKind::HttpStatus(408 | 429 | 500..=599) => FailureClass::Transient,
            FailureKind::HttpStatus(_)
            | FailureKind::InvalidUrl
            | FailureKind::RedirectLimitExceeded
            | FailureKind::TooLarge { .. }
            | FailureKind::TooSmall { .. }
            | FailureKind::UnsupportedContentType { .. }
            | FailureKind::MalformedMarkup
            | FailureKind::Sink => FailureClass::Permanent,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::TooSmall { min_bytes, actual } => {
                write!(f, "response too small (min {min_bytes}, actual {actual})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Context => write!(f, "secondary context error"),
            FailureKind::Navigation => write!(f, "navigation failed"),
            FailureKind::ResolveTimeout => write!(f, "media address did not resolve"),
            FailureKind::MalformedMarkup => write!(f, "unexpected markup"),
            FailureKind::Sink => write!(f, "sink write failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(StoredMedia),
    AlreadyAbsent(FetchError),
    TransientFailure(FetchError),
    PermanentFailure(FetchError),
}

impl FetchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            FetchOutcome::Success(_) => OutcomeKind::Success,
            FetchOutcome::AlreadyAbsent(_) => OutcomeKind::AlreadyAbsent,
            FetchOutcome::TransientFailure(_) => OutcomeKind::TransientFailure,
            FetchOutcome::PermanentFailure(_) => OutcomeKind::PermanentFailure,
        }
    }
}

impl From<Result<StoredMedia, FetchError>> for FetchOutcome {
    fn from(result: Result<StoredMedia, FetchError>) -> Self {
        match result {
            Ok(stored) => FetchOutcome::Success(stored),
            Err(err) => match err.kind.class() {
                FailureClass::Transient => FetchOutcome::TransientFailure(err),
                FailureClass::Absent => FetchOutcome::AlreadyAbsent(err),
                FailureClass::Permanent => FetchOutcome::PermanentFailure(err),
            },
        }
    }
}

/// Result of one `fetch` call, including how the secondary context went away.
#[derive(Debug)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub teardown_error: Option<ContextError>,
}
