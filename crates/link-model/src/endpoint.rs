//! Link endpoints and link classification

use crate::context::{ConstellationContext, EndpointKind};
use crate::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One end of a link: an antenna on a registered platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AntennaEndpoint {
    /// Designator of the relay, user vehicle or ground station
    pub owner: String,
    /// Antenna designator, unique within its owner
    pub antenna: String,
    pub kind: EndpointKind,
}

impl AntennaEndpoint {
    pub fn new(owner: impl Into<String>, antenna: impl Into<String>, kind: EndpointKind) -> Self {
        Self {
            owner: owner.into(),
            antenna: antenna.into(),
            kind,
        }
    }

    /// Tag the endpoint with its owner's kind from the run registry
    pub fn resolve(
        context: &ConstellationContext,
        owner: &str,
        antenna: &str,
    ) -> Result<Self> {
        let kind = context
            .endpoint_kind(owner)
            .ok_or_else(|| LinkError::UnknownPlatform(owner.to_string()))?;
        Ok(Self::new(owner, antenna, kind))
    }
}

impl fmt::Display for AntennaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.antenna)
    }
}

/// Category of a link by the kinds of its transmit and receive endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// User vehicle to relay: the first hop of a relayed return path
    MultiHop,
    /// User vehicle to another user vehicle acting as its relay
    SelfRelaying,
    /// User vehicle straight to a ground station
    DirectDownlink,
    /// Relay to relay
    Crosslink,
    /// Relay to ground station
    Downlink,
}

impl LinkKind {
    /// Every transmit/receive pair maps to at most one category
    pub fn classify(transmit: EndpointKind, receive: EndpointKind) -> Option<LinkKind> {
        use EndpointKind::*;
        match (transmit, receive) {
            (User, Relay) => Some(LinkKind::MultiHop),
            (User, User) => Some(LinkKind::SelfRelaying),
            (User, Ground) => Some(LinkKind::DirectDownlink),
            (Relay, Relay) => Some(LinkKind::Crosslink),
            (Relay, Ground) => Some(LinkKind::Downlink),
            (Relay, User) | (Ground, _) => None,
        }
    }
}
