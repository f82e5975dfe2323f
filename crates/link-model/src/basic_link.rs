//! Geometric inview model
//!
//! A `BasicLink` stores one `InviewStatus` per timestep for a
//! transmit/receive antenna pair. The array comes from the geometry
//! collaborator at construction and is only changed afterwards by
//! [`BasicLink::downgrade`].

use crate::endpoint::{AntennaEndpoint, LinkKind};
use crate::status::InviewStatus;
use crate::{LinkError, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Panic unless `time_step` lies in `[0, len)`
#[track_caller]
pub(crate) fn assert_in_horizon(time_step: usize, len: usize) {
    assert!(
        time_step < len,
        "time step {time_step} outside planning horizon [0, {len})"
    );
}

/// Position/velocity source for line-of-sight geometry
pub trait Ephemeris {
    /// Position of a platform (km) at a timestep
    fn position(&self, designator: &str, time_step: usize) -> Option<Vector3<f64>>;

    /// Velocity of a platform (km/s) at a timestep
    fn velocity(&self, designator: &str, time_step: usize) -> Option<Vector3<f64>>;
}

/// Read-only inview queries shared by [`BasicLink`] and `Link`
///
/// Every scan stops at an explicit boundary so its cost is bounded by the
/// horizon length. Queries panic when handed a timestep outside the horizon.
pub trait Inview {
    fn inview_statuses(&self) -> &[InviewStatus];

    fn time_steps(&self) -> usize {
        self.inview_statuses().len()
    }

    #[track_caller]
    fn inview_status(&self, time_step: usize) -> InviewStatus {
        let statuses = self.inview_statuses();
        assert_in_horizon(time_step, statuses.len());
        statuses[time_step]
    }

    #[track_caller]
    fn is_inview(&self, time_step: usize) -> bool {
        self.inview_status(time_step).is_link()
    }

    /// True when every timestep in the closed range `[start, end]` is inview
    #[track_caller]
    fn is_inview_over(&self, start: usize, end: usize) -> bool {
        assert_in_horizon(end, self.time_steps());
        (start..=end).all(|t| self.inview_statuses()[t].is_link())
    }

    /// True when any timestep in the closed range `[start, end]` is inview
    #[track_caller]
    fn any_inview(&self, start: usize, end: usize) -> bool {
        assert_in_horizon(end, self.time_steps());
        (start..=end).any(|t| self.inview_statuses()[t].is_link())
    }

    /// Next inview period starting at or after `current`
    ///
    /// Returns the half-open interval `[first Link step, first non-Link step)`
    /// truncated at `stop_at`, or `None` when nothing is inview before
    /// `stop_at`.
    fn inview_period(&self, current: usize, stop_at: usize) -> Option<Range<usize>> {
        let statuses = self.inview_statuses();
        let stop_at = stop_at.min(statuses.len());
        let start = (current..stop_at).find(|&t| statuses[t].is_link())?;
        let end = (start..stop_at)
            .find(|&t| !statuses[t].is_link())
            .unwrap_or(stop_at);
        Some(start..end)
    }

    /// Every maximal run of inview timesteps
    fn inview_periods(&self) -> Vec<Range<usize>> {
        let mut periods = Vec::new();
        let mut current = 0;
        while let Some(period) = self.inview_period(current, self.time_steps()) {
            current = period.end;
            periods.push(period);
        }
        periods
    }

    fn first_inview_time_step(&self) -> Option<usize> {
        self.inview_statuses().iter().position(InviewStatus::is_link)
    }

    fn last_inview_time_step(&self) -> Option<usize> {
        self.inview_statuses().iter().rposition(InviewStatus::is_link)
    }

    /// First inview timestep scanning forward from `start` up to and
    /// including `boundary`
    fn earliest_inview_time_step(&self, start: usize, boundary: usize) -> Option<usize> {
        let statuses = self.inview_statuses();
        if statuses.is_empty() {
            return None;
        }
        let boundary = boundary.min(statuses.len() - 1);
        (start..=boundary).find(|&t| statuses[t].is_link())
    }

    /// Last inview timestep scanning backward from `start` down to and
    /// including `boundary`
    fn latest_inview_time_step(&self, start: usize, boundary: usize) -> Option<usize> {
        let statuses = self.inview_statuses();
        if statuses.is_empty() {
            return None;
        }
        let start = start.min(statuses.len() - 1);
        (boundary..=start).rev().find(|&t| statuses[t].is_link())
    }

    fn number_of_inview_time_steps(&self) -> usize {
        self.inview_statuses().iter().filter(|s| s.is_link()).count()
    }
}

/// Inview status history for a transmit/receive antenna pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicLink {
    transmit: AntennaEndpoint,
    receive: AntennaEndpoint,
    inview: Vec<InviewStatus>,
}

impl BasicLink {
    pub fn new(
        transmit: AntennaEndpoint,
        receive: AntennaEndpoint,
        inview: Vec<InviewStatus>,
    ) -> Self {
        Self {
            transmit,
            receive,
            inview,
        }
    }

    /// Build from `(range, status)` runs over an otherwise `NoLink` horizon
    pub fn from_runs(
        transmit: AntennaEndpoint,
        receive: AntennaEndpoint,
        time_steps: usize,
        runs: &[(Range<usize>, InviewStatus)],
    ) -> Self {
        let mut inview = vec![InviewStatus::NoLink; time_steps];
        for (range, status) in runs {
            let end = range.end.min(time_steps);
            for slot in inview.iter_mut().take(end).skip(range.start) {
                *slot = *status;
            }
        }
        Self::new(transmit, receive, inview)
    }

    pub fn transmit(&self) -> &AntennaEndpoint {
        &self.transmit
    }

    pub fn receive(&self) -> &AntennaEndpoint {
        &self.receive
    }

    pub fn kind(&self) -> Option<LinkKind> {
        LinkKind::classify(self.transmit.kind, self.receive.kind)
    }

    pub fn is_multi_hop_link(&self) -> bool {
        self.kind() == Some(LinkKind::MultiHop)
    }

    pub fn is_self_relaying_link(&self) -> bool {
        self.kind() == Some(LinkKind::SelfRelaying)
    }

    pub fn is_direct_downlink_link(&self) -> bool {
        self.kind() == Some(LinkKind::DirectDownlink)
    }

    pub fn is_crosslink(&self) -> bool {
        self.kind() == Some(LinkKind::Crosslink)
    }

    pub fn is_downlink(&self) -> bool {
        self.kind() == Some(LinkKind::Downlink)
    }

    /// Replace usable codes (`Link`, `StateOfHealthTimeStep`) in `range`
    /// with `reason`; other exclusions are left alone.
    ///
    /// Returns the number of timesteps changed.
    pub fn downgrade(&mut self, range: Range<usize>, reason: InviewStatus) -> Result<usize> {
        if !reason.is_exclusion() {
            return Err(LinkError::InvalidDowngrade(reason));
        }
        if range.end > self.inview.len() {
            assert_in_horizon(range.end - 1, self.inview.len());
        }
        let mut changed = 0;
        for slot in &mut self.inview[range] {
            if slot.permits_allocation() && *slot != reason {
                *slot = reason;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Vector from the transmitting platform to the receiving platform
    pub fn line_of_sight_vector(
        &self,
        time_step: usize,
        ephemeris: &impl Ephemeris,
    ) -> Option<Vector3<f64>> {
        let from = ephemeris.position(&self.transmit.owner, time_step)?;
        let to = ephemeris.position(&self.receive.owner, time_step)?;
        Some(to - from)
    }

    pub fn range_km(&self, time_step: usize, ephemeris: &impl Ephemeris) -> Option<f64> {
        self.line_of_sight_vector(time_step, ephemeris)
            .map(|los| los.norm())
    }

    /// Rate of change of the range (km/s); positive when opening
    pub fn range_rate(&self, time_step: usize, ephemeris: &impl Ephemeris) -> Option<f64> {
        let los = self.line_of_sight_vector(time_step, ephemeris)?;
        let range = los.norm();
        if range == 0.0 {
            return None;
        }
        let v_tx = ephemeris.velocity(&self.transmit.owner, time_step)?;
        let v_rx = ephemeris.velocity(&self.receive.owner, time_step)?;
        Some((v_rx - v_tx).dot(&los) / range)
    }
}

impl Inview for BasicLink {
    fn inview_statuses(&self) -> &[InviewStatus] {
        &self.inview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EndpointKind;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn endpoints(tx: EndpointKind, rx: EndpointKind) -> (AntennaEndpoint, AntennaEndpoint) {
        (
            AntennaEndpoint::new("TX", "A1", tx),
            AntennaEndpoint::new("RX", "B1", rx),
        )
    }

    /// L = Link, . = NoLink, S = StateOfHealthTimeStep, O = Outage
    fn link_from(pattern: &str) -> BasicLink {
        let inview = pattern
            .chars()
            .map(|c| match c {
                'L' => InviewStatus::Link,
                'S' => InviewStatus::StateOfHealthTimeStep,
                'O' => InviewStatus::Outage,
                _ => InviewStatus::NoLink,
            })
            .collect();
        let (tx, rx) = endpoints(EndpointKind::User, EndpointKind::Relay);
        BasicLink::new(tx, rx, inview)
    }

    #[test]
    fn test_point_and_range_queries() {
        let link = link_from("..LLL.LL..");
        assert!(!link.is_inview(1));
        assert!(link.is_inview(2));
        assert!(link.is_inview_over(2, 4));
        assert!(!link.is_inview_over(2, 5));
        assert!(link.any_inview(0, 2));
        assert!(!link.any_inview(8, 9));
        assert_eq!(link.number_of_inview_time_steps(), 5);
    }

    #[test]
    #[should_panic(expected = "outside planning horizon")]
    fn test_out_of_range_panics() {
        link_from("LL").is_inview(2);
    }

    #[test]
    fn test_inview_period_scan() {
        let link = link_from("..LLL.LL..");
        assert_eq!(link.inview_period(0, 10), Some(2..5));
        assert_eq!(link.inview_period(3, 10), Some(3..5));
        assert_eq!(link.inview_period(5, 10), Some(6..8));
        assert_eq!(link.inview_period(0, 4), Some(2..4));
        assert_eq!(link.inview_period(8, 10), None);
        assert_eq!(link.inview_period(0, 2), None);
        assert_eq!(link.inview_periods(), vec![2..5, 6..8]);

        let open = link_from("..LL");
        assert_eq!(open.inview_period(0, 100), Some(2..4));
    }

    #[test]
    fn test_first_last_earliest_latest() {
        let link = link_from("..LLL.LL..");
        assert_eq!(link.first_inview_time_step(), Some(2));
        assert_eq!(link.last_inview_time_step(), Some(7));
        assert_eq!(link.earliest_inview_time_step(5, 9), Some(6));
        assert_eq!(link.earliest_inview_time_step(8, 20), None);
        assert_eq!(link.earliest_inview_time_step(0, 1), None);
        assert_eq!(link.latest_inview_time_step(5, 0), Some(4));
        assert_eq!(link.latest_inview_time_step(9, 8), None);
        assert_eq!(link_from("....").first_inview_time_step(), None);
    }

    #[test]
    fn test_downgrade_only_touches_usable_steps() {
        let mut link = link_from("LLSO..");
        let changed = link
            .downgrade(0..6, InviewStatus::RequiredDownlinkOverhead)
            .unwrap();
        assert_eq!(changed, 3);
        assert_eq!(link.inview_status(3), InviewStatus::Outage);
        assert_eq!(link.inview_status(4), InviewStatus::NoLink);
        assert!(matches!(
            link.downgrade(0..1, InviewStatus::Link),
            Err(LinkError::InvalidDowngrade(_))
        ));
    }

    #[test]
    fn test_from_runs() {
        let (tx, rx) = endpoints(EndpointKind::Relay, EndpointKind::Ground);
        let link = BasicLink::from_runs(
            tx,
            rx,
            6,
            &[(1..3, InviewStatus::Link), (4..9, InviewStatus::SolarIntrusion)],
        );
        assert_eq!(link.inview_periods(), vec![1..3]);
        assert_eq!(link.inview_status(5), InviewStatus::SolarIntrusion);
        assert!(link.is_downlink());
    }

    #[test]
    fn test_classification_predicates() {
        let cases = [
            (EndpointKind::User, EndpointKind::Relay, LinkKind::MultiHop),
            (EndpointKind::User, EndpointKind::User, LinkKind::SelfRelaying),
            (EndpointKind::User, EndpointKind::Ground, LinkKind::DirectDownlink),
            (EndpointKind::Relay, EndpointKind::Relay, LinkKind::Crosslink),
            (EndpointKind::Relay, EndpointKind::Ground, LinkKind::Downlink),
        ];
        for (tx, rx, expected) in cases {
            let (a, b) = endpoints(tx, rx);
            let link = BasicLink::new(a, b, vec![]);
            let flags = [
                link.is_multi_hop_link(),
                link.is_self_relaying_link(),
                link.is_direct_downlink_link(),
                link.is_crosslink(),
                link.is_downlink(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1);
            assert_eq!(link.kind(), Some(expected));
        }
        let (a, b) = endpoints(EndpointKind::Ground, EndpointKind::Relay);
        assert_eq!(BasicLink::new(a, b, vec![]).kind(), None);
    }

    struct FixedEphemeris(HashMap<&'static str, (Vector3<f64>, Vector3<f64>)>);

    impl Ephemeris for FixedEphemeris {
        fn position(&self, designator: &str, _time_step: usize) -> Option<Vector3<f64>> {
            self.0.get(designator).map(|(p, _)| *p)
        }

        fn velocity(&self, designator: &str, _time_step: usize) -> Option<Vector3<f64>> {
            self.0.get(designator).map(|(_, v)| *v)
        }
    }

    #[test]
    fn test_line_of_sight_geometry() {
        let ephemeris = FixedEphemeris(HashMap::from([
            ("TX", (Vector3::new(7000.0, 0.0, 0.0), Vector3::zeros())),
            ("RX", (Vector3::new(7000.0, 3000.0, 4000.0), Vector3::new(0.0, 0.6, 0.8))),
        ]));
        let link = link_from("L");

        let los = link.line_of_sight_vector(0, &ephemeris).unwrap();
        assert_eq!(los, Vector3::new(0.0, 3000.0, 4000.0));
        assert!((link.range_km(0, &ephemeris).unwrap() - 5000.0).abs() < 1e-9);
        assert!((link.range_rate(0, &ephemeris).unwrap() - 1.0).abs() < 1e-9);

        let empty = FixedEphemeris(HashMap::new());
        assert!(link.line_of_sight_vector(0, &empty).is_none());
    }

    fn status_strategy() -> impl Strategy<Value = InviewStatus> {
        proptest::sample::select(InviewStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_inview_matches_link_code(
            statuses in proptest::collection::vec(status_strategy(), 1..64)
        ) {
            let (tx, rx) = endpoints(EndpointKind::User, EndpointKind::Relay);
            let link = BasicLink::new(tx, rx, statuses.clone());
            for (t, status) in statuses.iter().enumerate() {
                prop_assert_eq!(link.is_inview(t), *status == InviewStatus::Link);
            }
            let covered: usize = link.inview_periods().iter().map(|p| p.len()).sum();
            prop_assert_eq!(covered, link.number_of_inview_time_steps());
        }
    }
}
