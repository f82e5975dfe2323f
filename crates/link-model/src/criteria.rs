//! Link criteria configuration
//!
//! Holds the overhead timing table, the narrowband and wideband conjunction
//! angle tables and the maneuver / solar intrusion thresholds. Every
//! insertion is validated immediately, so a `LinkCriteria` that exists is
//! always consistent.
//!
//! # Conjunction tables
//!
//! Each entry is `(angle, near, far, senders)`. For one `(near, far)` pair
//! the angle must strictly increase with the number of simultaneous
//! senders:
//!
//! ```text
//! senders:  2     3     4
//! angle:    5.0°  7.0°  9.0°   accepted
//! angle:    7.0°  5.0°         rejected at the second insertion
//! ```

use crate::overhead::{is_default_designator, OverheadData, ResolvedOverhead, DEFAULT_DESIGNATOR};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Smallest number of simultaneous senders a conjunction entry may name
pub const MINIMUM_SENDERS: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("no overhead data configured; a DEFAULT entry is required")]
    NoOverheadData,
    #[error("overhead data for {0} added before the DEFAULT entry")]
    MissingDefaultOverhead(String),
    #[error("expected the DEFAULT overhead entry, got {0}")]
    NotDefaultOverhead(String),
    #[error("duplicate overhead data for {0}")]
    DuplicateOverhead(String),
    #[error("{band} conjunction ({near}, {far}): senders must be at least 2, got {senders}")]
    InvalidSenderCount {
        band: Band,
        near: String,
        far: String,
        senders: u32,
    },
    #[error("{band} conjunction ({near}, {far}): missing required senders count")]
    MissingSenders { band: Band, near: String, far: String },
    #[error("{band} conjunction ({near}, {far}): {senders} senders specified without the entry for one fewer sender")]
    MissingPredecessor {
        band: Band,
        near: String,
        far: String,
        senders: u32,
    },
    #[error("{band} conjunction ({near}, {far}): duplicate entry for {senders} senders")]
    DuplicateConjunction {
        band: Band,
        near: String,
        far: String,
        senders: u32,
    },
    #[error("{band} conjunction ({near}, {far}): angle {angle_deg} for {senders} senders must be strictly between neighbours, conflicts with {other_angle_deg} for {other_senders} senders")]
    NonIncreasingAngle {
        band: Band,
        near: String,
        far: String,
        senders: u32,
        angle_deg: f64,
        other_senders: u32,
        other_angle_deg: f64,
    },
    #[error("{field}: angle {angle_deg} outside [0, 180] degrees")]
    AngleOutOfRange { field: &'static str, angle_deg: f64 },
    #[error("{field}: angle and time steps must be given together")]
    IncompleteThreshold { field: &'static str },
}

pub type Result<T> = std::result::Result<T, CriteriaError>;

/// Data rate class a conjunction table applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Narrowband,
    Wideband,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Narrowband => write!(f, "narrowband"),
            Band::Wideband => write!(f, "wideband"),
        }
    }
}

fn normalize(designator: &str) -> String {
    if is_default_designator(designator) {
        DEFAULT_DESIGNATOR.to_string()
    } else {
        designator.to_string()
    }
}

fn check_angle(field: &'static str, angle_deg: f64) -> Result<()> {
    if angle_deg.is_finite() && (0.0..=180.0).contains(&angle_deg) {
        Ok(())
    } else {
        Err(CriteriaError::AngleOutOfRange { field, angle_deg })
    }
}

/// One conjunction threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionEntry {
    pub angle_deg: f64,
    pub near: String,
    pub far: String,
    pub senders: u32,
}

/// Conjunction angles for one band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConjunctionTable {
    band: Band,
    entries: Vec<ConjunctionEntry>,
}

impl ConjunctionTable {
    pub fn new(band: Band) -> Self {
        Self {
            band,
            entries: Vec::new(),
        }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn entries(&self) -> &[ConjunctionEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry, rejecting anything that breaks the table's ordering
    pub fn insert(&mut self, angle_deg: f64, near: &str, far: &str, senders: u32) -> Result<()> {
        let near = normalize(near);
        let far = normalize(far);
        let field = match self.band {
            Band::Narrowband => "narrowband conjunction",
            Band::Wideband => "wideband conjunction",
        };
        check_angle(field, angle_deg)?;

        if senders < MINIMUM_SENDERS {
            return Err(CriteriaError::InvalidSenderCount {
                band: self.band,
                near,
                far,
                senders,
            });
        }

        let same_pair: Vec<&ConjunctionEntry> = self
            .entries
            .iter()
            .filter(|e| e.near == near && e.far == far)
            .collect();

        if same_pair.iter().any(|e| e.senders == senders) {
            return Err(CriteriaError::DuplicateConjunction {
                band: self.band,
                near,
                far,
                senders,
            });
        }

        if senders > MINIMUM_SENDERS && !same_pair.iter().any(|e| e.senders == senders - 1) {
            return Err(CriteriaError::MissingPredecessor {
                band: self.band,
                near,
                far,
                senders,
            });
        }

        let conflict = same_pair.iter().find(|e| {
            (e.senders < senders && e.angle_deg >= angle_deg)
                || (e.senders > senders && e.angle_deg <= angle_deg)
        });
        if let Some(other) = conflict {
            return Err(CriteriaError::NonIncreasingAngle {
                band: self.band,
                near,
                far,
                senders,
                angle_deg,
                other_senders: other.senders,
                other_angle_deg: other.angle_deg,
            });
        }

        debug!(
            "Added {} conjunction angle {:.3} deg for ({}, {}) with {} senders",
            self.band, angle_deg, near, far, senders
        );

        self.entries.push(ConjunctionEntry {
            angle_deg,
            near,
            far,
            senders,
        });
        Ok(())
    }

    fn exact(&self, near: &str, far: &str, senders: u32) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.near == near && e.far == far && e.senders == senders)
            .map(|e| e.angle_deg)
    }

    /// Resolve the angle for a pair: exact match first, then the default
    /// pair. A designator paired with itself never falls back.
    pub fn angle(&self, near: &str, far: &str, senders: u32) -> Option<f64> {
        let near = normalize(near);
        let far = normalize(far);

        if let Some(angle) = self.exact(&near, &far, senders) {
            return Some(angle);
        }

        let both_default = is_default_designator(&near) && is_default_designator(&far);
        if near != far || both_default {
            self.exact(DEFAULT_DESIGNATOR, DEFAULT_DESIGNATOR, senders)
        } else {
            None
        }
    }
}

/// Angle below which an event applies, and how many timesteps it lasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleThreshold {
    pub angle_deg: f64,
    pub time_steps: u32,
}

/// Resolved link criteria for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCriteria {
    overhead: Vec<OverheadData>,
    narrowband: ConjunctionTable,
    wideband: ConjunctionTable,
    maneuver: Option<AngleThreshold>,
    solar_intrusion: Option<AngleThreshold>,
}

impl LinkCriteria {
    /// Start from the mandatory DEFAULT overhead entry
    pub fn new(mut default_overhead: OverheadData) -> Result<Self> {
        if !default_overhead.is_default() {
            return Err(CriteriaError::NotDefaultOverhead(
                default_overhead.resource_designator,
            ));
        }
        default_overhead.resource_designator = DEFAULT_DESIGNATOR.to_string();
        Ok(Self {
            overhead: vec![default_overhead],
            narrowband: ConjunctionTable::new(Band::Narrowband),
            wideband: ConjunctionTable::new(Band::Wideband),
            maneuver: None,
            solar_intrusion: None,
        })
    }

    /// Build and validate from a deserialized configuration, in file order
    pub fn from_config(config: &LinkCriteriaConfig) -> Result<Self> {
        let mut entries = config.overhead.iter();
        let first = entries.next().ok_or(CriteriaError::NoOverheadData)?;
        if !first.is_default() {
            return Err(CriteriaError::MissingDefaultOverhead(
                first.resource_designator.clone(),
            ));
        }

        let mut criteria = Self::new(first.clone())?;
        for entry in entries {
            criteria.add_overhead_data(entry.clone())?;
        }

        for (band, list) in [
            (Band::Narrowband, &config.narrowband_conjunction),
            (Band::Wideband, &config.wideband_conjunction),
        ] {
            for entry in list {
                let senders = entry.senders.ok_or_else(|| CriteriaError::MissingSenders {
                    band,
                    near: entry.near.clone(),
                    far: entry.far.clone(),
                })?;
                criteria
                    .conjunction_table_mut(band)
                    .insert(entry.angle_deg, &entry.near, &entry.far, senders)?;
            }
        }

        if let Some(threshold) = config.maneuver.resolve("maneuver")? {
            criteria.set_maneuver_threshold(threshold)?;
        }
        if let Some(threshold) = config.solar_intrusion.resolve("solar_intrusion")? {
            criteria.set_solar_intrusion_threshold(threshold)?;
        }

        Ok(criteria)
    }

    pub fn add_overhead_data(&mut self, data: OverheadData) -> Result<()> {
        if data.is_default()
            || self
                .overhead
                .iter()
                .any(|o| o.resource_designator == data.resource_designator)
        {
            return Err(CriteriaError::DuplicateOverhead(data.resource_designator));
        }
        debug!("Added overhead data for {}", data.resource_designator);
        self.overhead.push(data);
        Ok(())
    }

    pub fn add_narrowband_conjunction(
        &mut self,
        angle_deg: f64,
        near: &str,
        far: &str,
        senders: u32,
    ) -> Result<()> {
        self.narrowband.insert(angle_deg, near, far, senders)
    }

    pub fn add_wideband_conjunction(
        &mut self,
        angle_deg: f64,
        near: &str,
        far: &str,
        senders: u32,
    ) -> Result<()> {
        self.wideband.insert(angle_deg, near, far, senders)
    }

    pub fn set_maneuver_threshold(&mut self, threshold: AngleThreshold) -> Result<()> {
        check_angle("maneuver", threshold.angle_deg)?;
        self.maneuver = Some(threshold);
        Ok(())
    }

    pub fn set_solar_intrusion_threshold(&mut self, threshold: AngleThreshold) -> Result<()> {
        check_angle("solar_intrusion", threshold.angle_deg)?;
        self.solar_intrusion = Some(threshold);
        Ok(())
    }

    /// The DEFAULT entry; always present
    pub fn default_overhead_data(&self) -> &OverheadData {
        &self.overhead[0]
    }

    /// The entry for `resource_designator`, else the DEFAULT entry
    pub fn overhead_data(&self, resource_designator: &str) -> &OverheadData {
        self.overhead
            .iter()
            .find(|o| o.resource_designator == resource_designator)
            .unwrap_or_else(|| self.default_overhead_data())
    }

    pub fn has_specific_overhead_data(&self, resource_designator: &str) -> bool {
        self.overhead
            .iter()
            .skip(1)
            .any(|o| o.resource_designator == resource_designator)
    }

    /// Concrete timings for a resource with per-field DEFAULT fallback
    pub fn resolve_overhead(&self, resource_designator: &str) -> ResolvedOverhead {
        self.overhead_data(resource_designator)
            .resolve_against(self.default_overhead_data())
    }

    pub fn overhead_entries(&self) -> &[OverheadData] {
        &self.overhead
    }

    pub fn conjunction_table(&self, band: Band) -> &ConjunctionTable {
        match band {
            Band::Narrowband => &self.narrowband,
            Band::Wideband => &self.wideband,
        }
    }

    fn conjunction_table_mut(&mut self, band: Band) -> &mut ConjunctionTable {
        match band {
            Band::Narrowband => &mut self.narrowband,
            Band::Wideband => &mut self.wideband,
        }
    }

    pub fn narrowband_conjunction_angle(&self, near: &str, far: &str, senders: u32) -> Option<f64> {
        self.narrowband.angle(near, far, senders)
    }

    pub fn wideband_conjunction_angle(&self, near: &str, far: &str, senders: u32) -> Option<f64> {
        self.wideband.angle(near, far, senders)
    }

    pub fn maneuver_threshold(&self) -> Option<AngleThreshold> {
        self.maneuver
    }

    pub fn solar_intrusion_threshold(&self) -> Option<AngleThreshold> {
        self.solar_intrusion
    }
}

/// On-disk form of the link criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkCriteriaConfig {
    #[serde(default)]
    pub overhead: Vec<OverheadData>,
    #[serde(default)]
    pub narrowband_conjunction: Vec<ConjunctionConfig>,
    #[serde(default)]
    pub wideband_conjunction: Vec<ConjunctionConfig>,
    #[serde(default)]
    pub maneuver: ThresholdConfig,
    #[serde(default)]
    pub solar_intrusion: ThresholdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConjunctionConfig {
    pub angle_deg: f64,
    #[serde(default = "default_designator")]
    pub near: String,
    #[serde(default = "default_designator")]
    pub far: String,
    pub senders: Option<u32>,
}

fn default_designator() -> String {
    DEFAULT_DESIGNATOR.to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub angle_deg: Option<f64>,
    pub time_steps: Option<u32>,
}

impl ThresholdConfig {
    fn resolve(&self, field: &'static str) -> Result<Option<AngleThreshold>> {
        match (self.angle_deg, self.time_steps) {
            (None, None) => Ok(None),
            (Some(angle_deg), Some(time_steps)) => Ok(Some(AngleThreshold {
                angle_deg,
                time_steps,
            })),
            _ => Err(CriteriaError::IncompleteThreshold { field }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> LinkCriteria {
        LinkCriteria::new(OverheadData::default_entry(3, 2)).unwrap()
    }

    #[test]
    fn test_overhead_lookup_falls_back_to_default() {
        let mut c = criteria();
        c.add_overhead_data(OverheadData::new("TDRS-W").with_acquisition_time(6))
            .unwrap();

        assert_eq!(c.overhead_data("TDRS-W").acquisition_time, Some(6));
        assert!(c.overhead_data("TDRS-Z").is_default());
        assert_eq!(c.resolve_overhead("TDRS-W").droplink_time, 2);
        assert!(c.has_specific_overhead_data("TDRS-W"));
        assert!(!c.has_specific_overhead_data("DEFAULT"));
    }

    #[test]
    fn test_new_requires_default_entry() {
        let err = LinkCriteria::new(OverheadData::new("TDRS-W")).unwrap_err();
        assert_eq!(err, CriteriaError::NotDefaultOverhead("TDRS-W".into()));
    }

    #[test]
    fn test_lowercase_default_entry_accepted() {
        let default = OverheadData::new("default").with_acquisition_time(2);
        let mut c = LinkCriteria::new(default).unwrap();
        assert_eq!(c.default_overhead_data().resource_designator, DEFAULT_DESIGNATOR);
        assert_eq!(c.resolve_overhead("TDRS-Z").acquisition_time, 2);
        assert!(matches!(
            c.add_overhead_data(OverheadData::new("Default")),
            Err(CriteriaError::DuplicateOverhead(_))
        ));
    }

    #[test]
    fn test_duplicate_overhead_rejected() {
        let mut c = criteria();
        c.add_overhead_data(OverheadData::new("GS-1")).unwrap();
        assert!(matches!(
            c.add_overhead_data(OverheadData::new("GS-1")),
            Err(CriteriaError::DuplicateOverhead(_))
        ));
        assert!(matches!(
            c.add_overhead_data(OverheadData::default_entry(1, 1)),
            Err(CriteriaError::DuplicateOverhead(_))
        ));
    }

    #[test]
    fn test_increasing_angles_accepted() {
        let mut c = criteria();
        c.add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 2).unwrap();
        c.add_narrowband_conjunction(7.0, "DEFAULT", "DEFAULT", 3).unwrap();
        c.add_narrowband_conjunction(9.0, "DEFAULT", "DEFAULT", 4).unwrap();

        c.add_wideband_conjunction(5.0, "TDRS-E", "TDRS-W", 2).unwrap();
        c.add_wideband_conjunction(7.0, "TDRS-E", "TDRS-W", 3).unwrap();
        c.add_wideband_conjunction(9.0, "TDRS-E", "TDRS-W", 4).unwrap();
        assert_eq!(c.conjunction_table(Band::Wideband).entries().len(), 3);
    }

    #[test]
    fn test_decreasing_angle_rejected() {
        let mut c = criteria();
        c.add_narrowband_conjunction(7.0, "DEFAULT", "DEFAULT", 2).unwrap();
        let err = c
            .add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 3)
            .unwrap_err();
        assert!(matches!(
            err,
            CriteriaError::NonIncreasingAngle {
                senders: 3,
                other_senders: 2,
                ..
            }
        ));
        // equal angles are not strictly increasing either
        assert!(c.add_narrowband_conjunction(7.0, "DEFAULT", "DEFAULT", 3).is_err());
    }

    #[test]
    fn test_sender_count_validation() {
        let mut c = criteria();
        assert!(matches!(
            c.add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 1),
            Err(CriteriaError::InvalidSenderCount { senders: 1, .. })
        ));
        assert!(matches!(
            c.add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 3),
            Err(CriteriaError::MissingPredecessor { senders: 3, .. })
        ));
        c.add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 2).unwrap();
        assert!(matches!(
            c.add_narrowband_conjunction(6.0, "default", "Default", 2),
            Err(CriteriaError::DuplicateConjunction { .. })
        ));
    }

    #[test]
    fn test_conjunction_lookup_precedence() {
        let mut c = criteria();
        c.add_narrowband_conjunction(5.0, "DEFAULT", "DEFAULT", 2).unwrap();
        c.add_narrowband_conjunction(3.0, "TDRS-E", "TDRS-W", 2).unwrap();

        assert_eq!(c.narrowband_conjunction_angle("TDRS-E", "TDRS-W", 2), Some(3.0));
        assert_eq!(c.narrowband_conjunction_angle("TDRS-W", "TDRS-E", 2), Some(5.0));
        assert_eq!(c.narrowband_conjunction_angle("DEFAULT", "DEFAULT", 2), Some(5.0));
        // self pairs never use the default
        assert_eq!(c.narrowband_conjunction_angle("TDRS-E", "TDRS-E", 2), None);
        assert_eq!(c.narrowband_conjunction_angle("TDRS-E", "TDRS-W", 3), None);
        assert_eq!(c.wideband_conjunction_angle("TDRS-E", "TDRS-W", 2), None);
    }

    #[test]
    fn test_angle_range_checked() {
        let mut c = criteria();
        assert!(matches!(
            c.add_wideband_conjunction(190.0, "DEFAULT", "DEFAULT", 2),
            Err(CriteriaError::AngleOutOfRange { .. })
        ));
        assert!(c
            .set_solar_intrusion_threshold(AngleThreshold {
                angle_deg: -1.0,
                time_steps: 2
            })
            .is_err());
    }

    #[test]
    fn test_from_config() {
        let json = r#"{
            "overhead": [
                {"resource_designator": "DEFAULT", "acquisition_time": 2, "droplink_time": 1},
                {"resource_designator": "GS-WSC", "acquisition_time": 4, "mbb_droplink_time": -1}
            ],
            "narrowband_conjunction": [
                {"angle_deg": 5.0, "senders": 2},
                {"angle_deg": 7.0, "senders": 3}
            ],
            "wideband_conjunction": [
                {"angle_deg": 2.5, "near": "TDRS-E", "far": "TDRS-W", "senders": 2}
            ],
            "maneuver": {"angle_deg": 30.0, "time_steps": 4}
        }"#;
        let config: LinkCriteriaConfig = serde_json::from_str(json).unwrap();
        let c = LinkCriteria::from_config(&config).unwrap();

        assert_eq!(c.resolve_overhead("GS-WSC").acquisition_time, 4);
        assert_eq!(c.resolve_overhead("GS-WSC").droplink_time, 1);
        assert_eq!(c.narrowband_conjunction_angle("A", "B", 3), Some(7.0));
        assert_eq!(c.wideband_conjunction_angle("TDRS-E", "TDRS-W", 2), Some(2.5));
        assert_eq!(c.maneuver_threshold().map(|m| m.time_steps), Some(4));
        assert!(c.solar_intrusion_threshold().is_none());
    }

    #[test]
    fn test_from_config_errors() {
        let override_first: LinkCriteriaConfig = serde_json::from_str(
            r#"{"overhead": [{"resource_designator": "GS-1"}, {"resource_designator": "DEFAULT"}]}"#,
        )
        .unwrap();
        assert_eq!(
            LinkCriteria::from_config(&override_first).unwrap_err(),
            CriteriaError::MissingDefaultOverhead("GS-1".into())
        );

        assert_eq!(
            LinkCriteria::from_config(&LinkCriteriaConfig::default()).unwrap_err(),
            CriteriaError::NoOverheadData
        );

        let no_senders: LinkCriteriaConfig = serde_json::from_str(
            r#"{"overhead": [{"resource_designator": "DEFAULT"}],
                "wideband_conjunction": [{"angle_deg": 4.0}]}"#,
        )
        .unwrap();
        assert!(matches!(
            LinkCriteria::from_config(&no_senders),
            Err(CriteriaError::MissingSenders { band: Band::Wideband, .. })
        ));

        let half_threshold: LinkCriteriaConfig = serde_json::from_str(
            r#"{"overhead": [{"resource_designator": "DEFAULT"}],
                "solar_intrusion": {"angle_deg": 4.0}}"#,
        )
        .unwrap();
        assert_eq!(
            LinkCriteria::from_config(&half_threshold).unwrap_err(),
            CriteriaError::IncompleteThreshold {
                field: "solar_intrusion"
            }
        );
    }
}
