//! Link Model Library
//!
//! Per-timestep inview and allocation state for the communication links of
//! a relay constellation, plus the configuration those links are
//! interpreted against:
//!
//! - `InviewStatus` / `AllocationStatus` codes
//! - `OverheadData` and `LinkCriteria` (overhead timing, conjunction angles)
//! - `ConstellationContext` run-scoped identity registry
//! - `Timeline` index/epoch/OF-time conversions
//! - `BasicLink` geometric queries and the `Link` allocation state machine
//!
//! # Layering
//!
//! ```text
//! InviewStatus == Link | StateOfHealthTimeStep
//!     └── AllocationStatus may be anything but NoAllocation
//! InviewStatus == anything else
//!     └── AllocationStatus == NoAllocation
//! ```

use thiserror::Error;

pub mod basic_link;
pub mod context;
pub mod criteria;
pub mod endpoint;
pub mod link;
pub mod overhead;
pub mod status;
pub mod timeline;

pub use basic_link::{BasicLink, Ephemeris, Inview};
pub use context::{ConstellationContext, ContextError, EndpointKind};
pub use criteria::{AngleThreshold, Band, CriteriaError, LinkCriteria, LinkCriteriaConfig};
pub use endpoint::{AntennaEndpoint, LinkKind};
pub use link::{AntennaPrep, ContactRequest, ContactWindow, Link, WidebandTransmission};
pub use overhead::{is_default_designator, OverheadData, ResolvedOverhead, DEFAULT_DESIGNATOR};
pub use status::{AllocationStatus, InviewStatus};
pub use timeline::{Timeline, TimelineError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("platform {0} is not registered in this run")]
    UnknownPlatform(String),
    #[error("cannot downgrade an inview status to {0:?}")]
    InvalidDowngrade(InviewStatus),
    #[error("time step {time_step} is allocated as {status:?}; release it before downgrading")]
    AllocatedTimeStep {
        time_step: usize,
        status: AllocationStatus,
    },
    #[error("time step {time_step} is {status:?}, not available for allocation")]
    NotInview {
        time_step: usize,
        status: InviewStatus,
    },
    #[error("time step {time_step} is already allocated as {status:?}")]
    AlreadyAllocated {
        time_step: usize,
        status: AllocationStatus,
    },
    #[error("window [{start}, {end}) extends outside planning horizon [0, {len})")]
    OutsideHorizon { start: i64, end: usize, len: usize },
    #[error("allocation range is empty")]
    EmptyRange,
}

pub type Result<T> = std::result::Result<T, LinkError>;
