//! Per-timestep status codes
//!
//! `InviewStatus` is the geometric verdict for a transmit/receive pair at one
//! timestep. `AllocationStatus` refines an inview timestep into what the
//! planner has reserved it for.

use serde::{Deserialize, Serialize};

/// Geometric visibility verdict for one timestep
///
/// Exactly one code applies per timestep. Everything other than `Link`
/// names the reason the pair is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InviewStatus {
    /// No geometric line of sight
    #[default]
    NoLink,
    /// Geometrically available
    Link,
    MinimumElevation,
    MaximumElevation,
    MinimumRange,
    MaximumRange,
    MinimumSunSeparation,
    MaximumSunSeparation,
    MinimumAzimuth,
    MaximumAzimuth,
    /// Line of sight grazes the atmosphere below the configured altitude
    GrazingAltitude,
    SolarIntrusion,
    /// Reserved for a required downlink's overhead
    RequiredDownlinkOverhead,
    /// Reserved for a state-of-health contact
    StateOfHealthTimeStep,
    Outage,
    NarrowbandConjunction,
    WidebandConjunction,
    Maneuver,
    EarthBlockage,
    TerrainMask,
}

impl InviewStatus {
    pub const ALL: [InviewStatus; 20] = [
        InviewStatus::NoLink,
        InviewStatus::Link,
        InviewStatus::MinimumElevation,
        InviewStatus::MaximumElevation,
        InviewStatus::MinimumRange,
        InviewStatus::MaximumRange,
        InviewStatus::MinimumSunSeparation,
        InviewStatus::MaximumSunSeparation,
        InviewStatus::MinimumAzimuth,
        InviewStatus::MaximumAzimuth,
        InviewStatus::GrazingAltitude,
        InviewStatus::SolarIntrusion,
        InviewStatus::RequiredDownlinkOverhead,
        InviewStatus::StateOfHealthTimeStep,
        InviewStatus::Outage,
        InviewStatus::NarrowbandConjunction,
        InviewStatus::WidebandConjunction,
        InviewStatus::Maneuver,
        InviewStatus::EarthBlockage,
        InviewStatus::TerrainMask,
    ];

    pub fn is_link(&self) -> bool {
        matches!(self, InviewStatus::Link)
    }

    /// Whether an allocation may be recorded on a timestep with this code
    pub fn permits_allocation(&self) -> bool {
        matches!(self, InviewStatus::Link | InviewStatus::StateOfHealthTimeStep)
    }

    /// Whether the code is one of the conjunction-derived exclusions
    pub fn is_conjunction(&self) -> bool {
        matches!(
            self,
            InviewStatus::NarrowbandConjunction | InviewStatus::WidebandConjunction
        )
    }

    /// Whether a `Link` timestep may be downgraded to this code
    pub fn is_exclusion(&self) -> bool {
        !matches!(self, InviewStatus::Link)
    }
}

/// What an inview timestep has been reserved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AllocationStatus {
    #[default]
    NoAllocation,
    Mission,
    Buffer,
    BufferDuringStartUp,
    StateOfHealth,
    NarrowbandContact,
    AcquisitionWideband,
    AcquisitionNarrowband,
    StartUpWideband,
    StartUpNarrowband,
    FinishUpWideband,
    FinishUpNarrowband,
    DroplinkWideband,
    DroplinkNarrowband,
    TransmitAntennaPrep,
    ReceiveAntennaPrep,
    BothAntennaPrep,
}

impl AllocationStatus {
    pub const ALL: [AllocationStatus; 17] = [
        AllocationStatus::NoAllocation,
        AllocationStatus::Mission,
        AllocationStatus::Buffer,
        AllocationStatus::BufferDuringStartUp,
        AllocationStatus::StateOfHealth,
        AllocationStatus::NarrowbandContact,
        AllocationStatus::AcquisitionWideband,
        AllocationStatus::AcquisitionNarrowband,
        AllocationStatus::StartUpWideband,
        AllocationStatus::StartUpNarrowband,
        AllocationStatus::FinishUpWideband,
        AllocationStatus::FinishUpNarrowband,
        AllocationStatus::DroplinkWideband,
        AllocationStatus::DroplinkNarrowband,
        AllocationStatus::TransmitAntennaPrep,
        AllocationStatus::ReceiveAntennaPrep,
        AllocationStatus::BothAntennaPrep,
    ];

    pub fn is_allocated(&self) -> bool {
        !matches!(self, AllocationStatus::NoAllocation)
    }

    pub fn is_mission(&self) -> bool {
        matches!(self, AllocationStatus::Mission)
    }

    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            AllocationStatus::Buffer | AllocationStatus::BufferDuringStartUp
        )
    }

    pub fn is_state_of_health(&self) -> bool {
        matches!(self, AllocationStatus::StateOfHealth)
    }

    pub fn is_narrowband_contact(&self) -> bool {
        matches!(self, AllocationStatus::NarrowbandContact)
    }

    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            AllocationStatus::AcquisitionWideband | AllocationStatus::AcquisitionNarrowband
        )
    }

    pub fn is_start_up(&self) -> bool {
        matches!(
            self,
            AllocationStatus::StartUpWideband | AllocationStatus::StartUpNarrowband
        )
    }

    pub fn is_finish_up(&self) -> bool {
        matches!(
            self,
            AllocationStatus::FinishUpWideband | AllocationStatus::FinishUpNarrowband
        )
    }

    pub fn is_droplink(&self) -> bool {
        matches!(
            self,
            AllocationStatus::DroplinkWideband | AllocationStatus::DroplinkNarrowband
        )
    }

    pub fn is_antenna_prep(&self) -> bool {
        matches!(
            self,
            AllocationStatus::TransmitAntennaPrep
                | AllocationStatus::ReceiveAntennaPrep
                | AllocationStatus::BothAntennaPrep
        )
    }

    pub fn is_acquiring_or_droplinking(&self) -> bool {
        self.is_acquisition() || self.is_droplink()
    }

    /// Timesteps billed against the wideband channel
    pub fn is_wideband(&self) -> bool {
        matches!(
            self,
            AllocationStatus::Mission
                | AllocationStatus::AcquisitionWideband
                | AllocationStatus::StartUpWideband
                | AllocationStatus::FinishUpWideband
                | AllocationStatus::DroplinkWideband
        )
    }

    /// Timesteps billed against the narrowband channel
    pub fn is_narrowband(&self) -> bool {
        matches!(
            self,
            AllocationStatus::StateOfHealth
                | AllocationStatus::NarrowbandContact
                | AllocationStatus::AcquisitionNarrowband
                | AllocationStatus::StartUpNarrowband
                | AllocationStatus::FinishUpNarrowband
                | AllocationStatus::DroplinkNarrowband
        )
    }
}
