//! Relay Topology Library
//!
//! Relay satellites, their antennas, and the run-scoped [`Constellation`]
//! that owns both and the link arena between them.
//!
//! ```text
//!   user vehicle ──► [user-pointing] RELAY A [relay-pointing] ──► RELAY B
//!                                                                   │
//!                                              [ground-pointing] ◄──┘
//!                                                    │
//!                                                    ▼
//!                                              ground station
//! ```
//!
//! Antennas reference links by [`LinkId`]; exactly one of a link's two
//! antennas owns it for deletion.

use link_model::{ContextError, LinkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod antenna;
pub mod constellation;
pub mod relay;

pub use antenna::{Antenna, AntennaKind, Capability, LinkRef};
pub use constellation::{Constellation, LinkDescriptor};
pub use relay::{ChannelRate, RelaySatellite};

/// Index of a link in the constellation arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("relay {0} is not part of the constellation")]
    UnknownRelay(String),
    #[error("{0} is not a registered relay satellite")]
    NotARelay(String),
    #[error("relay {0} already added")]
    DuplicateRelay(String),
    #[error("antenna {antenna} already exists on {owner}")]
    DuplicateAntenna { owner: String, antenna: String },
    #[error("antenna {antenna} not found on {owner}")]
    UnknownAntenna { owner: String, antenna: String },
    #[error("antenna {antenna} cannot {required}")]
    CapabilityMismatch {
        antenna: String,
        required: &'static str,
    },
    #[error("{kind} antenna {antenna} has a fixed role; {capability:?} not allowed")]
    FixedCapability {
        antenna: String,
        kind: AntennaKind,
        capability: Capability,
    },
    #[error("link {transmit} -> {receive} has no relay endpoint")]
    NoRelayEndpoint { transmit: String, receive: String },
    #[error("inview history has {actual} time steps, expected {expected}")]
    InviewLength { expected: usize, actual: usize },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
