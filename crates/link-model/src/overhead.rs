//! Link overhead timing
//!
//! Durations are in timestep units. Configuration files may write `-1` (or
//! omit the field) for an unset duration.

use serde::{Deserialize, Deserializer, Serialize};

/// Designator of the mandatory fallback overhead entry
pub const DEFAULT_DESIGNATOR: &str = "DEFAULT";

/// Case-insensitive match against the wildcard designator
pub fn is_default_designator(designator: &str) -> bool {
    designator.eq_ignore_ascii_case(DEFAULT_DESIGNATOR)
}

/// Timing constants for one resource designator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverheadData {
    pub resource_designator: String,
    #[serde(default, deserialize_with = "unset_if_negative")]
    pub acquisition_time: Option<u32>,
    #[serde(default, deserialize_with = "unset_if_negative")]
    pub droplink_time: Option<u32>,
    #[serde(default, deserialize_with = "unset_if_negative")]
    pub mbb_droplink_time: Option<u32>,
    #[serde(default, deserialize_with = "unset_if_negative")]
    pub mbb_start_up_time: Option<u32>,
}

impl OverheadData {
    pub fn new(resource_designator: impl Into<String>) -> Self {
        Self {
            resource_designator: resource_designator.into(),
            acquisition_time: None,
            droplink_time: None,
            mbb_droplink_time: None,
            mbb_start_up_time: None,
        }
    }

    pub fn default_entry(acquisition_time: u32, droplink_time: u32) -> Self {
        Self::new(DEFAULT_DESIGNATOR)
            .with_acquisition_time(acquisition_time)
            .with_droplink_time(droplink_time)
    }

    pub fn with_acquisition_time(mut self, steps: u32) -> Self {
        self.acquisition_time = Some(steps);
        self
    }

    pub fn with_droplink_time(mut self, steps: u32) -> Self {
        self.droplink_time = Some(steps);
        self
    }

    pub fn with_mbb_droplink_time(mut self, steps: u32) -> Self {
        self.mbb_droplink_time = Some(steps);
        self
    }

    pub fn with_mbb_start_up_time(mut self, steps: u32) -> Self {
        self.mbb_start_up_time = Some(steps);
        self
    }

    pub fn is_default(&self) -> bool {
        is_default_designator(&self.resource_designator)
    }

    /// Fill every unset field from `fallback`
    pub fn resolve_against(&self, fallback: &OverheadData) -> ResolvedOverhead {
        ResolvedOverhead {
            acquisition_time: self
                .acquisition_time
                .or(fallback.acquisition_time)
                .unwrap_or(0),
            droplink_time: self.droplink_time.or(fallback.droplink_time).unwrap_or(0),
            mbb_droplink_time: self.mbb_droplink_time.or(fallback.mbb_droplink_time),
            mbb_start_up_time: self.mbb_start_up_time.or(fallback.mbb_start_up_time),
        }
    }
}

/// Concrete timings a link works with after default fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedOverhead {
    pub acquisition_time: u32,
    pub droplink_time: u32,
    pub mbb_droplink_time: Option<u32>,
    pub mbb_start_up_time: Option<u32>,
}

impl ResolvedOverhead {
    /// Shortest teardown: the make-before-break droplink when it is faster
    pub fn minimum_droplink_time(&self) -> u32 {
        match self.mbb_droplink_time {
            Some(mbb) if mbb < self.droplink_time => mbb,
            _ => self.droplink_time,
        }
    }

    /// Longest teardown: the make-before-break droplink when it is slower
    pub fn maximum_droplink_time(&self) -> u32 {
        match self.mbb_droplink_time {
            Some(mbb) if mbb > self.droplink_time => mbb,
            _ => self.droplink_time,
        }
    }

    /// Start-up overhead of a make-before-break handover, or plain
    /// acquisition when no MBB start-up is configured
    pub fn mbb_start_up_or_acquisition(&self) -> u32 {
        self.mbb_start_up_time.unwrap_or(self.acquisition_time)
    }

    pub fn mbb_droplink_or_droplink(&self) -> u32 {
        self.mbb_droplink_time.unwrap_or(self.droplink_time)
    }
}

fn unset_if_negative<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<i64> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v < 0 => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("duration {v} out of range"))),
    }
}
