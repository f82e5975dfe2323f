//! Run-scoped constellation
//!
//! Owns the relays of one planning run and the arena of links between
//! their antennas. Antennas refer to links by [`LinkId`]; removing a link
//! detaches it from both ends and leaves a tombstone so ids stay stable.

use crate::antenna::{Antenna, LinkRef};
use crate::relay::RelaySatellite;
use crate::{LinkId, Result, TopologyError};
use link_model::{
    AntennaEndpoint, BasicLink, ConstellationContext, EndpointKind, InviewStatus, Link,
    LinkCriteria, WidebandTransmission,
};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use tracing::{debug, info};

/// Everything needed to add a link between two antennas
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescriptor {
    pub transmit_owner: String,
    pub transmit_antenna: String,
    pub receive_owner: String,
    pub receive_antenna: String,
    pub inview: Vec<InviewStatus>,
    pub wideband_transmission: WidebandTransmission,
    /// Geometry-only links carry no allocation array
    pub track_allocations: bool,
}

impl LinkDescriptor {
    pub fn new(
        transmit: (&str, &str),
        receive: (&str, &str),
        inview: Vec<InviewStatus>,
    ) -> Self {
        Self {
            transmit_owner: transmit.0.to_string(),
            transmit_antenna: transmit.1.to_string(),
            receive_owner: receive.0.to_string(),
            receive_antenna: receive.1.to_string(),
            inview,
            wideband_transmission: WidebandTransmission::default(),
            track_allocations: true,
        }
    }

    /// Inview history of `time_steps` `NoLink` codes overwritten by `runs`
    pub fn from_runs(
        transmit: (&str, &str),
        receive: (&str, &str),
        time_steps: usize,
        runs: &[(Range<usize>, InviewStatus)],
    ) -> Self {
        let mut inview = vec![InviewStatus::NoLink; time_steps];
        for (range, status) in runs {
            let end = range.end.min(time_steps);
            if range.start < end {
                inview[range.start..end].fill(*status);
            }
        }
        Self::new(transmit, receive, inview)
    }

    pub fn with_wideband_transmission(mut self, mode: WidebandTransmission) -> Self {
        self.wideband_transmission = mode;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track_allocations = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Constellation {
    context: ConstellationContext,
    criteria: LinkCriteria,
    time_steps: usize,
    relays: Vec<RelaySatellite>,
    links: Vec<Option<Link>>,
}

impl Constellation {
    pub fn new(context: ConstellationContext, criteria: LinkCriteria, time_steps: usize) -> Self {
        Self {
            context,
            criteria,
            time_steps,
            relays: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn context(&self) -> &ConstellationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ConstellationContext {
        &mut self.context
    }

    pub fn criteria(&self) -> &LinkCriteria {
        &self.criteria
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    // ---- relays ----------------------------------------------------------

    pub fn add_relay(&mut self, relay: RelaySatellite) -> Result<()> {
        if !self.context.is_valid_relay_satellite(relay.designator()) {
            return Err(TopologyError::NotARelay(relay.designator().to_string()));
        }
        if self.relay(relay.designator()).is_some() {
            return Err(TopologyError::DuplicateRelay(relay.designator().to_string()));
        }
        if relay.requires_state_of_health() {
            self.context.set_any_state_of_health_relay(true);
        }
        info!(
            "Added relay {} with {} antennas",
            relay.designator(),
            relay.antennas().count()
        );
        self.relays.push(relay);
        Ok(())
    }

    pub fn relay(&self, designator: &str) -> Option<&RelaySatellite> {
        self.relays.iter().find(|r| r.designator() == designator)
    }

    pub fn relay_mut(&mut self, designator: &str) -> Option<&mut RelaySatellite> {
        self.relays.iter_mut().find(|r| r.designator() == designator)
    }

    pub fn relays(&self) -> &[RelaySatellite] {
        &self.relays
    }

    fn antenna(&self, owner: &str, antenna: &str) -> Result<&Antenna> {
        let relay = self
            .relay(owner)
            .ok_or_else(|| TopologyError::UnknownRelay(owner.to_string()))?;
        relay
            .antenna(antenna)
            .ok_or_else(|| TopologyError::UnknownAntenna {
                owner: owner.to_string(),
                antenna: antenna.to_string(),
            })
    }

    /// Remove a relay along with every link touching its antennas
    ///
    /// Links the relay owns are deleted first; links a peer antenna owns are
    /// then dropped as well since they lose an endpoint.
    pub fn remove_relay(&mut self, designator: &str) -> Result<RelaySatellite> {
        let position = self
            .relays
            .iter()
            .position(|r| r.designator() == designator)
            .ok_or_else(|| TopologyError::UnknownRelay(designator.to_string()))?;

        let mut owned = BTreeSet::new();
        let mut shared = BTreeSet::new();
        for link in self.relays[position].antennas().flat_map(|a| a.links()) {
            if link.owns_for_deletion {
                owned.insert(link.id);
            } else {
                shared.insert(link.id);
            }
        }
        shared.retain(|id| !owned.contains(id));

        for id in &owned {
            self.remove_link(*id);
        }
        // links owned by a peer antenna would be left with a dangling endpoint
        for id in &shared {
            if let Some((owner, antenna)) = self.link_owner(*id) {
                debug!("Dropping {} owned by {}/{}", id, owner, antenna);
            }
            self.remove_link(*id);
        }

        info!(
            "Removed relay {} ({} owned links, {} peer-owned links)",
            designator,
            owned.len(),
            shared.len()
        );
        Ok(self.relays.remove(position))
    }

    // ---- links -----------------------------------------------------------

    /// Resolve both endpoints, build the link and attach it to the relay
    /// antennas on either side
    ///
    /// The transmit antenna owns the link when it sits on a relay; otherwise
    /// the receiving relay antenna does.
    pub fn add_link(&mut self, descriptor: LinkDescriptor) -> Result<LinkId> {
        if descriptor.inview.len() != self.time_steps {
            return Err(TopologyError::InviewLength {
                expected: self.time_steps,
                actual: descriptor.inview.len(),
            });
        }

        let transmit = AntennaEndpoint::resolve(
            &self.context,
            &descriptor.transmit_owner,
            &descriptor.transmit_antenna,
        )?;
        let receive = AntennaEndpoint::resolve(
            &self.context,
            &descriptor.receive_owner,
            &descriptor.receive_antenna,
        )?;

        let transmit_on_relay = transmit.kind == EndpointKind::Relay;
        let receive_on_relay = receive.kind == EndpointKind::Relay;
        if !transmit_on_relay && !receive_on_relay {
            return Err(TopologyError::NoRelayEndpoint {
                transmit: transmit.to_string(),
                receive: receive.to_string(),
            });
        }
        if transmit_on_relay {
            let antenna = self.antenna(&transmit.owner, &transmit.antenna)?;
            if !antenna.is_transmitting() {
                return Err(TopologyError::CapabilityMismatch {
                    antenna: transmit.to_string(),
                    required: "transmit",
                });
            }
        }
        if receive_on_relay {
            let antenna = self.antenna(&receive.owner, &receive.antenna)?;
            if !antenna.is_receiving() {
                return Err(TopologyError::CapabilityMismatch {
                    antenna: receive.to_string(),
                    required: "receive",
                });
            }
        }

        let basic = BasicLink::new(transmit.clone(), receive.clone(), descriptor.inview);
        let link = if descriptor.track_allocations {
            Link::new(basic, &self.criteria, descriptor.wideband_transmission)
        } else {
            Link::untracked(basic, &self.criteria, descriptor.wideband_transmission)
        };

        let id = LinkId(self.links.len());
        debug!(
            "Adding {} {} -> {} ({:?}, resource {})",
            id,
            transmit,
            receive,
            link.kind(),
            link.resource_designator()
        );
        self.links.push(Some(link));

        if transmit_on_relay {
            self.attach(&transmit, id, true);
        }
        if receive_on_relay {
            self.attach(&receive, id, !transmit_on_relay);
        }
        Ok(id)
    }

    fn attach(&mut self, endpoint: &AntennaEndpoint, id: LinkId, owns_for_deletion: bool) {
        if let Some(antenna) = self
            .relay_mut(&endpoint.owner)
            .and_then(|r| r.antenna_mut(&endpoint.antenna))
        {
            antenna.attach(LinkRef {
                id,
                owns_for_deletion,
            });
        }
    }

    /// Detach the link from both antennas and drop it from the arena
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.get_mut(id.0)?.take()?;
        for relay in self.relays.iter_mut() {
            for antenna in relay.antennas_mut() {
                antenna.detach(id);
            }
        }
        debug!("Removed {} {} -> {}", id, link.transmit(), link.receive());
        Some(link)
    }

    /// Relay and antenna holding the deletion flag for `id`
    pub fn link_owner(&self, id: LinkId) -> Option<(&str, &str)> {
        self.relays.iter().find_map(|relay| {
            relay
                .antennas()
                .find(|a| a.owned_links().any(|owned| owned == id))
                .map(|a| (relay.designator(), a.designator()))
        })
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0).and_then(Option::as_ref)
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (LinkId(i), l)))
    }

    pub fn number_of_links(&self) -> usize {
        self.links.iter().flatten().count()
    }

    // ---- capacity --------------------------------------------------------

    /// Links on the antenna holding an allocation at `time_step`
    ///
    /// Panics if `time_step` is outside the planning horizon.
    pub fn antenna_load(&self, owner: &str, antenna: &str, time_step: usize) -> Result<u32> {
        let antenna = self.antenna(owner, antenna)?;
        let load = antenna
            .link_ids()
            .filter_map(|id| self.link(id))
            .filter(|l| l.is_tracking_allocations() && l.is_allocated(time_step))
            .count();
        Ok(load as u32)
    }

    pub fn has_spare_capacity(&self, owner: &str, antenna: &str, time_step: usize) -> Result<bool> {
        let capacity = self.antenna(owner, antenna)?.capacity();
        Ok(self.antenna_load(owner, antenna, time_step)? < capacity)
    }

    // ---- topology --------------------------------------------------------

    pub fn minimum_number_of_hops(&self, designator: &str) -> Result<Option<usize>> {
        let relay = self
            .relay(designator)
            .ok_or_else(|| TopologyError::UnknownRelay(designator.to_string()))?;
        let mut visited = HashSet::from([designator.to_string()]);
        Ok(relay.minimum_number_of_hops(self, &mut visited))
    }

    pub fn has_any_resource_in_view(&self, designator: &str, time_step: usize) -> Result<bool> {
        let relay = self
            .relay(designator)
            .ok_or_else(|| TopologyError::UnknownRelay(designator.to_string()))?;
        let mut checked = HashSet::new();
        Ok(relay.has_any_resource_in_view(time_step, self, &mut checked))
    }

    /// Drop every relay and link and reset the run registry
    pub fn clear(&mut self) {
        self.relays.clear();
        self.links.clear();
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antenna::Capability;
    use link_model::{Inview, OverheadData};

    const N: usize = 10;

    fn criteria() -> LinkCriteria {
        LinkCriteria::new(OverheadData::default_entry(1, 1)).unwrap()
    }

    fn relay(ctx: &mut ConstellationContext, name: &str, ground: bool) -> RelaySatellite {
        ctx.register_relay_satellite(name).unwrap();
        let mut r = RelaySatellite::new(ctx, name).unwrap();
        r.add_antenna(Antenna::user_pointing("SA", 2)).unwrap();
        r.add_antenna(Antenna::relay_pointing("X", Capability::Duplex, 2))
            .unwrap();
        if ground {
            r.add_antenna(Antenna::ground_pointing("SGL", 1)).unwrap();
        }
        r
    }

    /// A -> B -> C -> A crosslink ring; only C has a ground terminal
    fn ring(ground_on_c: bool) -> Constellation {
        let mut ctx = ConstellationContext::new();
        ctx.register_user_vehicle("ISS").unwrap();
        ctx.register_ground_station("WSC").unwrap();
        let a = relay(&mut ctx, "A", false);
        let b = relay(&mut ctx, "B", false);
        let c = relay(&mut ctx, "C", ground_on_c);

        let mut net = Constellation::new(ctx, criteria(), N);
        net.add_relay(a).unwrap();
        net.add_relay(b).unwrap();
        net.add_relay(c).unwrap();
        for (tx, rx) in [("A", "B"), ("B", "C"), ("C", "A")] {
            net.add_link(LinkDescriptor::new(
                (tx, "X"),
                (rx, "X"),
                vec![InviewStatus::Link; N],
            ))
            .unwrap();
        }
        net
    }

    #[test]
    fn test_minimum_hops_through_ring() {
        let net = ring(true);
        assert_eq!(net.minimum_number_of_hops("C").unwrap(), Some(1));
        assert_eq!(net.minimum_number_of_hops("B").unwrap(), Some(2));
        assert_eq!(net.minimum_number_of_hops("A").unwrap(), Some(3));
    }

    #[test]
    fn test_ring_without_ground_terminates() {
        let net = ring(false);
        for name in ["A", "B", "C"] {
            assert_eq!(net.minimum_number_of_hops(name).unwrap(), None);
        }
    }

    #[test]
    fn test_resource_in_view_follows_crosslinks() {
        let mut ctx = ConstellationContext::new();
        ctx.register_ground_station("WSC").unwrap();
        let a = relay(&mut ctx, "A", false);
        let b = relay(&mut ctx, "B", true);
        let mut net = Constellation::new(ctx, criteria(), N);
        net.add_relay(a).unwrap();
        net.add_relay(b).unwrap();

        net.add_link(LinkDescriptor::from_runs(
            ("A", "X"),
            ("B", "X"),
            N,
            &[(0..5, InviewStatus::Link)],
        ))
        .unwrap();
        net.add_link(LinkDescriptor::from_runs(
            ("B", "SGL"),
            ("WSC", "DISH"),
            N,
            &[(3..8, InviewStatus::Link)],
        ))
        .unwrap();

        assert!(!net.has_any_resource_in_view("A", 2).unwrap());
        assert!(net.has_any_resource_in_view("A", 4).unwrap());
        // crosslink is down at 6 but B still sees WSC
        assert!(net.has_any_resource_in_view("A", 6).unwrap());
        assert!(net.has_any_resource_in_view("B", 6).unwrap());
        assert!(!net.has_any_resource_in_view("A", 9).unwrap());
    }

    #[test]
    fn test_resource_in_view_ignores_crosslink_visibility() {
        let mut ctx = ConstellationContext::new();
        ctx.register_ground_station("WSC").unwrap();
        let a = relay(&mut ctx, "A", false);
        let b = relay(&mut ctx, "B", true);
        let mut net = Constellation::new(ctx, criteria(), N);
        net.add_relay(a).unwrap();
        net.add_relay(b).unwrap();

        net.add_link(LinkDescriptor::new(
            ("A", "X"),
            ("B", "X"),
            vec![InviewStatus::NoLink; N],
        ))
        .unwrap();
        net.add_link(LinkDescriptor::new(
            ("B", "SGL"),
            ("WSC", "DISH"),
            vec![InviewStatus::Link; N],
        ))
        .unwrap();

        assert!(net.has_any_resource_in_view("A", 0).unwrap());
        assert!(net.has_any_resource_in_view("A", N - 1).unwrap());
    }

    #[test]
    fn test_ownership_follows_transmit_relay() {
        let mut net = ring(true);
        let uplink = net
            .add_link(LinkDescriptor::new(
                ("ISS", "HGA"),
                ("A", "SA"),
                vec![InviewStatus::Link; N],
            ))
            .unwrap();

        let a = net.relay("A").unwrap();
        let sa = a.antenna("SA").unwrap();
        assert_eq!(sa.owned_links().collect::<Vec<_>>(), vec![uplink]);

        // A -> B crosslink owned by A's antenna only
        let x_a = a.antenna("X").unwrap();
        let x_b = net.relay("B").unwrap().antenna("X").unwrap();
        let ab = LinkId(0);
        assert!(x_a.owned_links().any(|id| id == ab));
        assert!(x_b.link_ids().any(|id| id == ab));
        assert!(!x_b.owned_links().any(|id| id == ab));

        assert!(net.link(uplink).unwrap().is_multi_hop_link());
        assert_eq!(net.link(uplink).unwrap().resource_designator(), "A");
    }

    #[test]
    fn test_add_link_validation() {
        let mut net = ring(true);
        assert!(matches!(
            net.add_link(LinkDescriptor::new(("A", "X"), ("B", "X"), vec![InviewStatus::Link; 3])),
            Err(TopologyError::InviewLength { expected: N, actual: 3 })
        ));
        assert!(matches!(
            net.add_link(LinkDescriptor::new(
                ("A", "SA"),
                ("B", "X"),
                vec![InviewStatus::Link; N]
            )),
            Err(TopologyError::CapabilityMismatch { required: "transmit", .. })
        ));
        assert!(matches!(
            net.add_link(LinkDescriptor::new(
                ("A", "NOPE"),
                ("B", "X"),
                vec![InviewStatus::Link; N]
            )),
            Err(TopologyError::UnknownAntenna { .. })
        ));
        assert!(matches!(
            net.add_link(LinkDescriptor::new(
                ("ISS", "HGA"),
                ("WSC", "DISH"),
                vec![InviewStatus::Link; N]
            )),
            Err(TopologyError::NoRelayEndpoint { .. })
        ));
        assert!(matches!(
            net.add_link(LinkDescriptor::new(
                ("GHOST", "HGA"),
                ("A", "SA"),
                vec![InviewStatus::Link; N]
            )),
            Err(TopologyError::Link(_))
        ));
    }

    #[test]
    fn test_antenna_load_and_capacity() {
        let mut net = ring(true);
        let uplink = net
            .add_link(LinkDescriptor::new(
                ("ISS", "HGA"),
                ("A", "SA"),
                vec![InviewStatus::Link; N],
            ))
            .unwrap();
        net.add_link(
            LinkDescriptor::new(("ISS", "HGA"), ("A", "SA"), vec![InviewStatus::Link; N]).untracked(),
        )
        .unwrap();

        net.link_mut(uplink)
            .unwrap()
            .allocate_narrowband_contact(2..5)
            .unwrap();

        assert_eq!(net.antenna_load("A", "SA", 1).unwrap(), 0);
        assert_eq!(net.antenna_load("A", "SA", 3).unwrap(), 1);
        assert!(net.has_spare_capacity("A", "SA", 3).unwrap());
        assert!(matches!(
            net.antenna_load("A", "NOPE", 0),
            Err(TopologyError::UnknownAntenna { .. })
        ));
    }

    #[test]
    fn test_remove_relay_detaches_links() {
        let mut net = ring(true);
        assert_eq!(net.number_of_links(), 3);
        let removed = net.remove_relay("B").unwrap();
        assert_eq!(removed.designator(), "B");
        assert_eq!(net.number_of_links(), 1);

        let x_a = net.relay("A").unwrap().antenna("X").unwrap();
        assert_eq!(x_a.link_ids().count(), 1);
        assert_eq!(net.minimum_number_of_hops("A").unwrap(), None);
        assert!(net.link(LinkId(0)).is_none());
        assert!(net.link(LinkId(2)).unwrap().is_inview(0));
    }

    #[test]
    fn test_every_link_has_one_owner() {
        let mut net = ring(true);
        let uplink = net
            .add_link(LinkDescriptor::new(
                ("ISS", "HGA"),
                ("A", "SA"),
                vec![InviewStatus::Link; N],
            ))
            .unwrap();

        for (id, link) in net.links() {
            let owners: usize = net
                .relays()
                .iter()
                .flat_map(|r| r.antennas())
                .map(|a| a.owned_links().filter(|owned| *owned == id).count())
                .sum();
            assert_eq!(owners, 1, "{} has {} owners", id, owners);

            let (owner, antenna) = net.link_owner(id).unwrap();
            let expected = if net.relay(&link.transmit().owner).is_some() {
                link.transmit()
            } else {
                link.receive()
            };
            assert_eq!((owner, antenna), (expected.owner.as_str(), expected.antenna.as_str()));
        }
        assert_eq!(net.link_owner(uplink), Some(("A", "SA")));
        assert_eq!(net.link_owner(LinkId(99)), None);
    }

    #[test]
    fn test_remove_relay_drops_owned_and_peer_owned_links() {
        let mut net = ring(true);
        let uplink = net
            .add_link(LinkDescriptor::new(
                ("ISS", "HGA"),
                ("B", "SA"),
                vec![InviewStatus::Link; N],
            ))
            .unwrap();
        // B owns B -> C and the uplink; A owns A -> B
        assert_eq!(net.link_owner(LinkId(1)).map(|(r, _)| r), Some("B"));
        assert_eq!(net.link_owner(LinkId(0)).map(|(r, _)| r), Some("A"));

        net.remove_relay("B").unwrap();
        assert!(net.link(uplink).is_none());
        assert!(net.link(LinkId(0)).is_none());
        assert!(net.link(LinkId(1)).is_none());
        assert_eq!(net.link_owner(LinkId(2)).map(|(r, _)| r), Some("C"));
        assert!(net
            .relays()
            .iter()
            .flat_map(|r| r.antennas())
            .all(|a| a.link_ids().all(|id| net.link(id).is_some())));
    }

    #[test]
    fn test_add_relay_rejects_duplicates_and_sets_soh_flag() {
        let mut ctx = ConstellationContext::new();
        let a = relay(&mut ctx, "A", true).with_state_of_health(true);
        let again = relay(&mut ctx, "A", true);
        let mut net = Constellation::new(ctx, criteria(), N);
        net.add_relay(a).unwrap();
        assert!(net.context().any_state_of_health_relay());
        assert!(matches!(
            net.add_relay(again),
            Err(TopologyError::DuplicateRelay(_))
        ));

        net.clear();
        assert!(net.relays().is_empty());
        assert!(!net.context().is_valid_relay_satellite("A"));
    }
}
