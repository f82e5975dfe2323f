//! Run-scoped identity registry
//!
//! Maps relay satellite, user vehicle and ground station designators to
//! dense indices for one simulation run. Components take the context by
//! reference; nothing here is global.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("designator {0} is already registered as a {1}")]
    AlreadyRegistered(String, EndpointKind),
    #[error("designator must not be empty")]
    EmptyDesignator,
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// What kind of platform an antenna endpoint sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    Relay,
    User,
    Ground,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Relay => write!(f, "relay satellite"),
            EndpointKind::User => write!(f, "user vehicle"),
            EndpointKind::Ground => write!(f, "ground station"),
        }
    }
}

/// Designator <-> index table for one platform kind
#[derive(Debug, Clone, Default)]
pub struct DesignatorRegistry {
    designators: Vec<String>,
    indices: HashMap<String, usize>,
}

impl DesignatorRegistry {
    fn insert(&mut self, designator: &str) -> usize {
        if let Some(&index) = self.indices.get(designator) {
            return index;
        }
        let index = self.designators.len();
        self.designators.push(designator.to_string());
        self.indices.insert(designator.to_string(), index);
        index
    }

    pub fn index_of(&self, designator: &str) -> Option<usize> {
        self.indices.get(designator).copied()
    }

    pub fn designator(&self, index: usize) -> Option<&str> {
        self.designators.get(index).map(String::as_str)
    }

    pub fn contains(&self, designator: &str) -> bool {
        self.indices.contains_key(designator)
    }

    pub fn len(&self) -> usize {
        self.designators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.designators.iter().map(String::as_str)
    }

    fn clear(&mut self) {
        self.designators.clear();
        self.indices.clear();
    }
}

/// Identity registry for one run
#[derive(Debug, Clone, Default)]
pub struct ConstellationContext {
    relays: DesignatorRegistry,
    users: DesignatorRegistry,
    ground_stations: DesignatorRegistry,
    any_state_of_health_relay: bool,
}

impl ConstellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self, kind: EndpointKind) -> &DesignatorRegistry {
        match kind {
            EndpointKind::Relay => &self.relays,
            EndpointKind::User => &self.users,
            EndpointKind::Ground => &self.ground_stations,
        }
    }

    fn register(&mut self, designator: &str, kind: EndpointKind) -> Result<usize> {
        if designator.trim().is_empty() {
            return Err(ContextError::EmptyDesignator);
        }
        match self.endpoint_kind(designator) {
            Some(existing) if existing != kind => Err(ContextError::AlreadyRegistered(
                designator.to_string(),
                existing,
            )),
            _ => {
                let registry = match kind {
                    EndpointKind::Relay => &mut self.relays,
                    EndpointKind::User => &mut self.users,
                    EndpointKind::Ground => &mut self.ground_stations,
                };
                let index = registry.insert(designator);
                debug!("Registered {} {} at index {}", kind, designator, index);
                Ok(index)
            }
        }
    }

    /// Register a relay satellite; re-registering returns the existing index
    pub fn register_relay_satellite(&mut self, designator: &str) -> Result<usize> {
        self.register(designator, EndpointKind::Relay)
    }

    pub fn register_user_vehicle(&mut self, designator: &str) -> Result<usize> {
        self.register(designator, EndpointKind::User)
    }

    pub fn register_ground_station(&mut self, designator: &str) -> Result<usize> {
        self.register(designator, EndpointKind::Ground)
    }

    pub fn is_valid_relay_satellite(&self, designator: &str) -> bool {
        self.relays.contains(designator)
    }

    pub fn is_valid_user_vehicle(&self, designator: &str) -> bool {
        self.users.contains(designator)
    }

    pub fn is_valid_ground_station(&self, designator: &str) -> bool {
        self.ground_stations.contains(designator)
    }

    /// Kind tag for a registered designator
    pub fn endpoint_kind(&self, designator: &str) -> Option<EndpointKind> {
        [EndpointKind::Relay, EndpointKind::User, EndpointKind::Ground]
            .into_iter()
            .find(|&kind| self.registry(kind).contains(designator))
    }

    pub fn index_of(&self, kind: EndpointKind, designator: &str) -> Option<usize> {
        self.registry(kind).index_of(designator)
    }

    pub fn designator_of(&self, kind: EndpointKind, index: usize) -> Option<&str> {
        self.registry(kind).designator(index)
    }

    pub fn relay_satellites(&self) -> &DesignatorRegistry {
        &self.relays
    }

    pub fn user_vehicles(&self) -> &DesignatorRegistry {
        &self.users
    }

    pub fn ground_stations(&self) -> &DesignatorRegistry {
        &self.ground_stations
    }

    pub fn any_state_of_health_relay(&self) -> bool {
        self.any_state_of_health_relay
    }

    pub fn set_any_state_of_health_relay(&mut self, value: bool) {
        self.any_state_of_health_relay = value;
    }

    /// Drop every registration at run teardown
    pub fn clear(&mut self) {
        self.relays.clear();
        self.users.clear();
        self.ground_stations.clear();
        self.any_state_of_health_relay = false;
    }
}
