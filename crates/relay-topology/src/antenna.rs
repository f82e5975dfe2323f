//! Relay antennas
//!
//! User-pointing antennas receive from user vehicles and ground-pointing
//! antennas transmit to ground stations; both roles are fixed. Relay-pointing
//! antennas carry crosslinks and may transmit, receive or do both.

use crate::{LinkId, Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AntennaKind {
    UserPointing,
    GroundPointing,
    RelayPointing,
}

impl fmt::Display for AntennaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AntennaKind::UserPointing => write!(f, "user-pointing"),
            AntennaKind::GroundPointing => write!(f, "ground-pointing"),
            AntennaKind::RelayPointing => write!(f, "relay-pointing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Transmit,
    Receive,
    Duplex,
}

impl Capability {
    pub fn is_transmitting(&self) -> bool {
        matches!(self, Capability::Transmit | Capability::Duplex)
    }

    pub fn is_receiving(&self) -> bool {
        matches!(self, Capability::Receive | Capability::Duplex)
    }
}

/// A link the antenna takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub id: LinkId,
    /// Set on exactly one of the link's two antennas: the transmit antenna
    /// when it sits on a relay, else the receiving one. Removing the owning
    /// relay deletes the link.
    pub owns_for_deletion: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    designator: String,
    kind: AntennaKind,
    capability: Capability,
    /// Maximum concurrent links
    capacity: u32,
    number_of_transmit_channels: u32,
    /// Timesteps needed to slew and configure before a contact
    preparation_time: u32,
    /// Per-channel data rate (Mbps)
    data_rate_mbps: f64,
    #[serde(skip)]
    links: Vec<LinkRef>,
}

impl Antenna {
    /// Relay-pointing antennas take any capability; the others only their
    /// fixed role
    pub fn new(
        designator: impl Into<String>,
        kind: AntennaKind,
        capability: Capability,
        capacity: u32,
    ) -> Result<Self> {
        let designator = designator.into();
        let fixed = match kind {
            AntennaKind::UserPointing => Some(Capability::Receive),
            AntennaKind::GroundPointing => Some(Capability::Transmit),
            AntennaKind::RelayPointing => None,
        };
        if let Some(required) = fixed {
            if capability != required {
                return Err(TopologyError::FixedCapability {
                    antenna: designator,
                    kind,
                    capability,
                });
            }
        }
        Ok(Self::fixed(designator, kind, capability, capacity))
    }

    pub fn user_pointing(designator: impl Into<String>, capacity: u32) -> Self {
        Self::fixed(designator, AntennaKind::UserPointing, Capability::Receive, capacity)
    }

    pub fn ground_pointing(designator: impl Into<String>, capacity: u32) -> Self {
        Self::fixed(designator, AntennaKind::GroundPointing, Capability::Transmit, capacity)
    }

    pub fn relay_pointing(
        designator: impl Into<String>,
        capability: Capability,
        capacity: u32,
    ) -> Self {
        Self::fixed(designator, AntennaKind::RelayPointing, capability, capacity)
    }

    fn fixed(
        designator: impl Into<String>,
        kind: AntennaKind,
        capability: Capability,
        capacity: u32,
    ) -> Self {
        Self {
            designator: designator.into(),
            kind,
            capability,
            capacity,
            number_of_transmit_channels: u32::from(capability.is_transmitting()),
            preparation_time: 0,
            data_rate_mbps: 0.0,
            links: Vec::new(),
        }
    }

    /// Receive-only antennas keep zero transmit channels
    pub fn with_transmit_channels(mut self, channels: u32) -> Self {
        if self.capability.is_transmitting() {
            self.number_of_transmit_channels = channels;
        }
        self
    }

    pub fn with_preparation_time(mut self, steps: u32) -> Self {
        self.preparation_time = steps;
        self
    }

    pub fn with_data_rate(mut self, rate_mbps: f64) -> Self {
        self.data_rate_mbps = rate_mbps;
        self
    }

    pub fn designator(&self) -> &str {
        &self.designator
    }

    pub fn kind(&self) -> AntennaKind {
        self.kind
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn is_transmitting(&self) -> bool {
        self.capability.is_transmitting()
    }

    pub fn is_receiving(&self) -> bool {
        self.capability.is_receiving()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn number_of_transmit_channels(&self) -> u32 {
        self.number_of_transmit_channels
    }

    pub fn preparation_time(&self) -> u32 {
        self.preparation_time
    }

    pub fn data_rate_mbps(&self) -> f64 {
        self.data_rate_mbps
    }

    /// Combined rate over every transmit channel
    pub fn transmit_rate_mbps(&self) -> f64 {
        self.data_rate_mbps * self.number_of_transmit_channels as f64
    }

    pub fn links(&self) -> &[LinkRef] {
        &self.links
    }

    pub fn link_ids(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links.iter().map(|l| l.id)
    }

    /// Links this antenna is responsible for deleting
    pub fn owned_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links
            .iter()
            .filter(|l| l.owns_for_deletion)
            .map(|l| l.id)
    }

    pub(crate) fn attach(&mut self, link: LinkRef) {
        self.links.push(link);
    }

    pub(crate) fn detach(&mut self, id: LinkId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.id != id);
        before != self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_roles() {
        let user = Antenna::user_pointing("SA-1", 1);
        assert!(user.is_receiving());
        assert!(!user.is_transmitting());
        assert_eq!(user.number_of_transmit_channels(), 0);

        let ground = Antenna::ground_pointing("SGL", 2);
        assert!(ground.is_transmitting());
        assert_eq!(ground.number_of_transmit_channels(), 1);

        assert!(matches!(
            Antenna::new("SGL", AntennaKind::GroundPointing, Capability::Duplex, 1),
            Err(TopologyError::FixedCapability { .. })
        ));
        assert!(Antenna::new("X-1", AntennaKind::RelayPointing, Capability::Duplex, 1).is_ok());
    }

    #[test]
    fn test_channel_builders() {
        let antenna = Antenna::relay_pointing("X-1", Capability::Duplex, 2)
            .with_transmit_channels(3)
            .with_data_rate(150.0)
            .with_preparation_time(4);
        assert_eq!(antenna.transmit_rate_mbps(), 450.0);
        assert_eq!(antenna.preparation_time(), 4);

        let receiver = Antenna::user_pointing("SA-1", 1).with_transmit_channels(3);
        assert_eq!(receiver.number_of_transmit_channels(), 0);
    }

    #[test]
    fn test_link_refs() {
        let mut antenna = Antenna::relay_pointing("X-1", Capability::Duplex, 2);
        antenna.attach(LinkRef {
            id: LinkId(0),
            owns_for_deletion: true,
        });
        antenna.attach(LinkRef {
            id: LinkId(1),
            owns_for_deletion: false,
        });
        assert_eq!(antenna.owned_links().collect::<Vec<_>>(), vec![LinkId(0)]);
        assert!(antenna.detach(LinkId(0)));
        assert!(!antenna.detach(LinkId(0)));
        assert_eq!(antenna.link_ids().collect::<Vec<_>>(), vec![LinkId(1)]);
    }
}
