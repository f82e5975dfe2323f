//! Worth Profile Library
//!
//! Turns worth-bin records into per-timestep worth arrays keyed by
//! `(user, resource)`:
//!
//! ```text
//! 2024-001 ISS REQ-17 KUSSAR 1000.0 TDRS-E    <- header (> 2 tokens)
//! 30 120.0                                    <- bin: seconds, worth
//! 60 60.0
//! ```
//!
//! Each bin's worth is spread over the timesteps its seconds overlap, in
//! proportion to the overlap, so the total is conserved. `ANY` is the
//! resource every lookup falls back to.

use thiserror::Error;

pub mod parser;
pub mod profile;

pub use parser::{WorthConfig, WorthParseReport, WorthParser};
pub use profile::WorthProfiles;

/// Resource key of the fallback profile
pub const ANY_RESOURCE: &str = "ANY";

#[derive(Error, Debug)]
pub enum WorthError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profiles cover {profiles} timesteps but the timeline has {timeline}")]
    HorizonMismatch { profiles: usize, timeline: usize },
}

pub type Result<T> = std::result::Result<T, WorthError>;
