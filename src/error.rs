// Error taxonomy for the sampling core. Wiring code (main, config, journal) uses anyhow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("attribute path must have 2 or 3 segments, got {0}")]
    SegmentCount(usize),
    #[error("attribute path has an empty or dotted segment: {0:?}")]
    EmptySegment(String),
}

/// Rejected query input. Never fatal to the engine.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown attribute {attr:?}")]
    BadAttribute { attr: String },
    #[error("bad range: t1 ({t1}) is after t2 ({t2})")]
    BadRange { t1: String, t2: String },
    #[error("invalid time parameter {0:?}, expected YYYY-MM-DD HH:MM:SS or RFC 3339")]
    BadTimestamp(String),
}

/// Transient snapshot capture failure. The sampler logs it and skips the tick.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("status endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("status document could not be decoded: {0}")]
    Decode(String),
    #[error("monitored process not found: {0}")]
    ProcessNotFound(String),
    #[error("capture task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store capacity must be > 0 bytes")]
    InvalidCapacity,
}
