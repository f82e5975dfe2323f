//! Allocation state machine
//!
//! A `Link` adds to the inview history a per-timestep `AllocationStatus`,
//! the overhead timing resolved for the link's resource and the wideband
//! transmission mode that decides how overhead segments are billed.
//!
//! A contact laid down by [`Link::allocate_contact`] looks like:
//!
//! ```text
//! | acquisition | start-up | mission ... | finish-up | droplink |
//! ```
//!
//! Writes never break the layering invariant: a timestep can only be
//! allocated while its inview code is `Link` or `StateOfHealthTimeStep`.
//! Reads of the allocation array panic if the link was built without one or
//! the timestep is outside the horizon.

use crate::basic_link::{assert_in_horizon, BasicLink, Inview};
use crate::context::EndpointKind;
use crate::criteria::LinkCriteria;
use crate::endpoint::{AntennaEndpoint, LinkKind};
use crate::overhead::ResolvedOverhead;
use crate::status::{AllocationStatus, InviewStatus};
use crate::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Which overhead segments travel on the wideband channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WidebandTransmission {
    /// Only the mission itself is wideband
    #[default]
    MissionOnly,
    /// Start-up and finish-up commanding join the mission on wideband
    CommandAndMission,
    /// Every segment, acquisition and droplink included, is wideband
    EntireTransmission,
}

impl WidebandTransmission {
    pub fn acquisition_is_wideband(&self) -> bool {
        matches!(self, WidebandTransmission::EntireTransmission)
    }

    pub fn start_up_is_wideband(&self) -> bool {
        matches!(
            self,
            WidebandTransmission::EntireTransmission | WidebandTransmission::CommandAndMission
        )
    }

    pub fn finish_up_is_wideband(&self) -> bool {
        self.start_up_is_wideband()
    }

    pub fn droplink_is_wideband(&self) -> bool {
        matches!(self, WidebandTransmission::EntireTransmission)
    }
}

/// Which side of the link an antenna preparation period serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AntennaPrep {
    Transmit,
    Receive,
    Both,
}

impl AntennaPrep {
    pub fn status(&self) -> AllocationStatus {
        match self {
            AntennaPrep::Transmit => AllocationStatus::TransmitAntennaPrep,
            AntennaPrep::Receive => AllocationStatus::ReceiveAntennaPrep,
            AntennaPrep::Both => AllocationStatus::BothAntennaPrep,
        }
    }
}

/// Request to lay down a full contact around a mission interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    /// Half-open mission interval
    pub mission: Range<usize>,
    pub start_up_time: u32,
    pub finish_up_time: u32,
    /// Use make-before-break start-up/droplink timing where configured
    #[serde(default)]
    pub make_before_break: bool,
}

/// Segments written by a contact allocation, each half-open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactWindow {
    pub acquisition: Range<usize>,
    pub start_up: Range<usize>,
    pub mission: Range<usize>,
    pub finish_up: Range<usize>,
    pub droplink: Range<usize>,
}

impl ContactWindow {
    pub fn span(&self) -> Range<usize> {
        self.acquisition.start..self.droplink.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    basic: BasicLink,
    allocation: Option<Vec<AllocationStatus>>,
    resource_designator: String,
    overhead: ResolvedOverhead,
    wideband_transmission: WidebandTransmission,
}

/// The endpoint whose overhead entry governs the link: the non-user side,
/// preferring the receiver
fn resource_designator_for(basic: &BasicLink) -> &str {
    let (tx, rx) = (basic.transmit(), basic.receive());
    if rx.kind != EndpointKind::User || tx.kind == EndpointKind::User {
        &rx.owner
    } else {
        &tx.owner
    }
}

impl Link {
    /// Link with an allocation array, every timestep unallocated
    pub fn new(
        basic: BasicLink,
        criteria: &LinkCriteria,
        wideband_transmission: WidebandTransmission,
    ) -> Self {
        let mut link = Self::untracked(basic, criteria, wideband_transmission);
        link.allocation = Some(vec![AllocationStatus::NoAllocation; link.time_steps()]);
        link
    }

    /// Geometry-only link; every allocation query on it panics
    pub fn untracked(
        basic: BasicLink,
        criteria: &LinkCriteria,
        wideband_transmission: WidebandTransmission,
    ) -> Self {
        let resource_designator = resource_designator_for(&basic).to_string();
        let overhead = criteria.resolve_overhead(&resource_designator);
        Self {
            basic,
            allocation: None,
            resource_designator,
            overhead,
            wideband_transmission,
        }
    }

    pub fn basic(&self) -> &BasicLink {
        &self.basic
    }

    pub fn transmit(&self) -> &AntennaEndpoint {
        self.basic.transmit()
    }

    pub fn receive(&self) -> &AntennaEndpoint {
        self.basic.receive()
    }

    pub fn kind(&self) -> Option<LinkKind> {
        self.basic.kind()
    }

    pub fn is_multi_hop_link(&self) -> bool {
        self.basic.is_multi_hop_link()
    }

    pub fn is_self_relaying_link(&self) -> bool {
        self.basic.is_self_relaying_link()
    }

    pub fn is_direct_downlink_link(&self) -> bool {
        self.basic.is_direct_downlink_link()
    }

    pub fn is_crosslink(&self) -> bool {
        self.basic.is_crosslink()
    }

    pub fn is_downlink(&self) -> bool {
        self.basic.is_downlink()
    }

    // ---- overhead timing -------------------------------------------------

    pub fn resource_designator(&self) -> &str {
        &self.resource_designator
    }

    pub fn overhead(&self) -> &ResolvedOverhead {
        &self.overhead
    }

    pub fn acquisition_time(&self) -> u32 {
        self.overhead.acquisition_time
    }

    pub fn droplink_time(&self) -> u32 {
        self.overhead.droplink_time
    }

    pub fn mbb_droplink_time(&self) -> Option<u32> {
        self.overhead.mbb_droplink_time
    }

    pub fn mbb_start_up_time(&self) -> Option<u32> {
        self.overhead.mbb_start_up_time
    }

    pub fn minimum_droplink_time(&self) -> u32 {
        self.overhead.minimum_droplink_time()
    }

    pub fn maximum_droplink_time(&self) -> u32 {
        self.overhead.maximum_droplink_time()
    }

    pub fn wideband_transmission(&self) -> WidebandTransmission {
        self.wideband_transmission
    }

    pub fn acquisition_is_wideband(&self) -> bool {
        self.wideband_transmission.acquisition_is_wideband()
    }

    pub fn start_up_is_wideband(&self) -> bool {
        self.wideband_transmission.start_up_is_wideband()
    }

    pub fn finish_up_is_wideband(&self) -> bool {
        self.wideband_transmission.finish_up_is_wideband()
    }

    pub fn droplink_is_wideband(&self) -> bool {
        self.wideband_transmission.droplink_is_wideband()
    }

    // ---- allocation queries ----------------------------------------------

    pub fn is_tracking_allocations(&self) -> bool {
        self.allocation.is_some()
    }

    #[track_caller]
    pub fn allocation_statuses(&self) -> &[AllocationStatus] {
        match &self.allocation {
            Some(allocation) => allocation,
            None => panic!(
                "link {} -> {} has no allocation array",
                self.transmit(),
                self.receive()
            ),
        }
    }

    #[track_caller]
    pub fn allocation_status(&self, time_step: usize) -> AllocationStatus {
        let statuses = self.allocation_statuses();
        assert_in_horizon(time_step, statuses.len());
        statuses[time_step]
    }

    #[track_caller]
    pub fn is_allocated(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_allocated()
    }

    #[track_caller]
    pub fn is_allocated_mission(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_mission()
    }

    #[track_caller]
    pub fn is_allocated_buffer(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_buffer()
    }

    #[track_caller]
    pub fn is_allocated_state_of_health(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_state_of_health()
    }

    #[track_caller]
    pub fn is_allocated_narrowband_contact(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_narrowband_contact()
    }

    #[track_caller]
    pub fn is_allocated_acquisition(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_acquisition()
    }

    #[track_caller]
    pub fn is_allocated_start_up(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_start_up()
    }

    #[track_caller]
    pub fn is_allocated_finish_up(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_finish_up()
    }

    #[track_caller]
    pub fn is_allocated_droplink(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_droplink()
    }

    #[track_caller]
    pub fn is_allocated_antenna_prep(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_antenna_prep()
    }

    #[track_caller]
    pub fn is_acquiring_or_droplinking(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_acquiring_or_droplinking()
    }

    #[track_caller]
    pub fn is_allocated_wideband(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_wideband()
    }

    #[track_caller]
    pub fn is_allocated_narrowband(&self, time_step: usize) -> bool {
        self.allocation_status(time_step).is_narrowband()
    }

    /// Maximal runs of allocated timesteps, whatever their status
    pub fn allocation_periods(&self) -> Vec<Range<usize>> {
        let statuses = self.allocation_statuses();
        let mut periods = Vec::new();
        let mut start = None;
        for (t, status) in statuses.iter().enumerate() {
            match (status.is_allocated(), start) {
                (true, None) => start = Some(t),
                (false, Some(s)) => {
                    periods.push(s..t);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            periods.push(s..statuses.len());
        }
        periods
    }

    pub fn number_of_allocated_time_steps(&self) -> usize {
        self.allocation_statuses()
            .iter()
            .filter(|s| s.is_allocated())
            .count()
    }

    // ---- allocation writes -----------------------------------------------

    #[track_caller]
    fn allocation_mut(&mut self) -> &mut Vec<AllocationStatus> {
        match &mut self.allocation {
            Some(allocation) => allocation,
            None => panic!(
                "link {} -> {} has no allocation array",
                self.basic.transmit(),
                self.basic.receive()
            ),
        }
    }

    /// Overwrite one timestep; allocated states need a usable inview code
    #[track_caller]
    pub fn set_allocation_status(&mut self, time_step: usize, status: AllocationStatus) -> Result<()> {
        let inview = self.inview_status(time_step);
        if status.is_allocated() && !inview.permits_allocation() {
            return Err(LinkError::NotInview {
                time_step,
                status: inview,
            });
        }
        self.allocation_mut()[time_step] = status;
        Ok(())
    }

    fn check_window(&self, start: usize, end: usize) -> Result<()> {
        let len = self.time_steps();
        if end > len {
            return Err(LinkError::OutsideHorizon {
                start: start as i64,
                end,
                len,
            });
        }
        let statuses = self.allocation_statuses();
        for t in start..end {
            let inview = self.basic.inview_statuses()[t];
            if !inview.permits_allocation() {
                return Err(LinkError::NotInview {
                    time_step: t,
                    status: inview,
                });
            }
            if statuses[t].is_allocated() {
                return Err(LinkError::AlreadyAllocated {
                    time_step: t,
                    status: statuses[t],
                });
            }
        }
        Ok(())
    }

    fn fill(&mut self, range: Range<usize>, status: AllocationStatus) {
        for slot in &mut self.allocation_mut()[range] {
            *slot = status;
        }
    }

    fn allocate_uniform(&mut self, range: Range<usize>, status: AllocationStatus) -> Result<()> {
        if range.is_empty() {
            return Err(LinkError::EmptyRange);
        }
        self.check_window(range.start, range.end)?;
        debug!(
            "Allocated {:?} on {} -> {} for [{}, {})",
            status,
            self.transmit(),
            self.receive(),
            range.start,
            range.end
        );
        self.fill(range, status);
        Ok(())
    }

    /// Lay down acquisition, start-up, mission, finish-up and droplink
    /// around `request.mission`. Nothing is written unless every timestep
    /// of the whole window is inview and free.
    pub fn allocate_contact(&mut self, request: &ContactRequest) -> Result<ContactWindow> {
        let mission = request.mission.clone();
        if mission.is_empty() {
            return Err(LinkError::EmptyRange);
        }

        let (acquisition_time, droplink_time) = if request.make_before_break {
            (
                self.overhead.mbb_start_up_or_acquisition(),
                self.overhead.mbb_droplink_or_droplink(),
            )
        } else {
            (self.overhead.acquisition_time, self.overhead.droplink_time)
        };

        // u32 + u32 always fits an i64
        let lead = i64::from(request.start_up_time) + i64::from(acquisition_time);
        let acquisition_start = i64::try_from(mission.start).unwrap_or(i64::MAX) - lead;
        let finish_up_end = mission.end.saturating_add(request.finish_up_time as usize);
        let droplink_end = finish_up_end.saturating_add(droplink_time as usize);

        if acquisition_start < 0 {
            return Err(LinkError::OutsideHorizon {
                start: acquisition_start,
                end: droplink_end,
                len: self.time_steps(),
            });
        }
        let acquisition_start = acquisition_start as usize;
        self.check_window(acquisition_start, droplink_end)?;

        let start_up_start = acquisition_start + acquisition_time as usize;
        let window = ContactWindow {
            acquisition: acquisition_start..start_up_start,
            start_up: start_up_start..mission.start,
            mission: mission.clone(),
            finish_up: mission.end..finish_up_end,
            droplink: finish_up_end..droplink_end,
        };

        let mode = self.wideband_transmission;
        let pick = |wideband: bool, wide: AllocationStatus, narrow: AllocationStatus| {
            if wideband {
                wide
            } else {
                narrow
            }
        };
        self.fill(
            window.acquisition.clone(),
            pick(
                mode.acquisition_is_wideband(),
                AllocationStatus::AcquisitionWideband,
                AllocationStatus::AcquisitionNarrowband,
            ),
        );
        self.fill(
            window.start_up.clone(),
            pick(
                mode.start_up_is_wideband(),
                AllocationStatus::StartUpWideband,
                AllocationStatus::StartUpNarrowband,
            ),
        );
        self.fill(window.mission.clone(), AllocationStatus::Mission);
        self.fill(
            window.finish_up.clone(),
            pick(
                mode.finish_up_is_wideband(),
                AllocationStatus::FinishUpWideband,
                AllocationStatus::FinishUpNarrowband,
            ),
        );
        self.fill(
            window.droplink.clone(),
            pick(
                mode.droplink_is_wideband(),
                AllocationStatus::DroplinkWideband,
                AllocationStatus::DroplinkNarrowband,
            ),
        );

        debug!(
            "Allocated contact on {} -> {}: span [{}, {}), mission [{}, {})",
            self.transmit(),
            self.receive(),
            window.acquisition.start,
            window.droplink.end,
            mission.start,
            mission.end
        );
        Ok(window)
    }

    pub fn allocate_buffer(&mut self, range: Range<usize>, during_start_up: bool) -> Result<()> {
        let status = if during_start_up {
            AllocationStatus::BufferDuringStartUp
        } else {
            AllocationStatus::Buffer
        };
        self.allocate_uniform(range, status)
    }

    pub fn allocate_antenna_prep(&mut self, range: Range<usize>, prep: AntennaPrep) -> Result<()> {
        self.allocate_uniform(range, prep.status())
    }

    pub fn allocate_state_of_health(&mut self, range: Range<usize>) -> Result<()> {
        self.allocate_uniform(range, AllocationStatus::StateOfHealth)
    }

    pub fn allocate_narrowband_contact(&mut self, range: Range<usize>) -> Result<()> {
        self.allocate_uniform(range, AllocationStatus::NarrowbandContact)
    }

    /// Release every allocation in `range`; returns how many were released
    #[track_caller]
    pub fn clear_allocation(&mut self, range: Range<usize>) -> usize {
        let len = self.time_steps();
        if range.end > len {
            assert_in_horizon(range.end - 1, len);
        }
        let mut cleared = 0;
        for slot in &mut self.allocation_mut()[range] {
            if slot.is_allocated() {
                *slot = AllocationStatus::NoAllocation;
                cleared += 1;
            }
        }
        cleared
    }

    /// Downgrade inview codes, refusing to strand an allocation on a
    /// timestep that would no longer permit it
    pub fn downgrade(&mut self, range: Range<usize>, reason: InviewStatus) -> Result<usize> {
        if let (Some(allocation), false) = (&self.allocation, reason.permits_allocation()) {
            let end = range.end.min(allocation.len());
            for t in range.start..end {
                let inview = self.basic.inview_statuses()[t];
                if allocation[t].is_allocated() && inview.permits_allocation() {
                    return Err(LinkError::AllocatedTimeStep {
                        time_step: t,
                        status: allocation[t],
                    });
                }
            }
        }
        self.basic.downgrade(range, reason)
    }

    /// Mark timesteps as reserved for state-of-health contacts
    pub fn mark_state_of_health(&mut self, range: Range<usize>) -> Result<usize> {
        self.downgrade(range, InviewStatus::StateOfHealthTimeStep)
    }

    /// Mark timesteps as consumed by a required downlink's overhead
    pub fn mark_required_downlink_overhead(&mut self, range: Range<usize>) -> Result<usize> {
        self.downgrade(range, InviewStatus::RequiredDownlinkOverhead)
    }
}

impl Inview for Link {
    fn inview_statuses(&self) -> &[InviewStatus] {
        self.basic.inview_statuses()
    }
}
