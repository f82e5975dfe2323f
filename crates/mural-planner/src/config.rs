//! Run configuration

use crate::scenario::ScenarioConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use link_model::{LinkCriteria, LinkCriteriaConfig, Timeline};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;
use worth_profile::WorthConfig;

/// Planning horizon as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Epoch of timestep 0 (RFC 3339)
    pub start: DateTime<Utc>,
    pub step_seconds: f64,
    pub time_steps: usize,
    /// OF time of timestep 0
    #[serde(default)]
    pub of_start: f64,
}

impl TimelineConfig {
    pub fn to_timeline(&self) -> Result<Timeline> {
        Ok(Timeline::new(
            self.start,
            self.step_seconds,
            self.time_steps,
            self.of_start,
        )?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub link_criteria: LinkCriteriaConfig,
    #[serde(default)]
    pub worth: WorthConfig,
    #[serde(default)]
    pub scenario: Option<ScenarioConfig>,
}

impl PlannerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn link_criteria(&self) -> Result<LinkCriteria> {
        Ok(LinkCriteria::from_config(&self.link_criteria)?)
    }
}

/// Load a planner configuration from a JSON file
pub fn load_config(path: impl AsRef<Path>) -> Result<PlannerConfig> {
    let path = path.as_ref();
    info!("Loading planner configuration from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: PlannerConfig = serde_json::from_reader(reader)?;

    info!(
        "Horizon: {} steps of {} s from {}",
        config.timeline.time_steps, config.timeline.step_seconds, config.timeline.start
    );
    Ok(config)
}
