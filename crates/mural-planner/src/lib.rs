//! MURAL Planner
//!
//! Loads a run configuration, validates the link criteria, builds the
//! optional scenario topology and applies worth bins to the timeline.
//!
//! # Run Pipeline
//!
//! ```text
//! planner.json ──► PlannerConfig ──┬──► Timeline
//!                                  ├──► LinkCriteria (validated)
//!                                  └──► ScenarioConfig ──► Constellation
//! worth.txt ───────────────────────────► WorthProfiles ──► fill_base_profile
//!                                                  │
//!                                                  ▼
//!                                             PlanSummary (JSON)
//! ```

use link_model::{ContextError, CriteriaError, TimelineError};
use relay_topology::TopologyError;
use thiserror::Error;
use worth_profile::WorthError;

pub mod config;
pub mod scenario;
pub mod summary;

pub use config::{load_config, PlannerConfig, TimelineConfig};
pub use scenario::{build_constellation, ScenarioConfig};
pub use summary::{run, PlanSummary};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid link criteria: {0}")]
    Criteria(#[from] CriteriaError),
    #[error("invalid timeline: {0}")]
    Timeline(#[from] TimelineError),
    #[error("invalid scenario: {0}")]
    Topology(#[from] TopologyError),
    #[error("invalid scenario: {0}")]
    Context(#[from] ContextError),
    #[error("worth input: {0}")]
    Worth(#[from] WorthError),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
