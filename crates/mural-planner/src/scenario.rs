//! Scenario topology
//!
//! Platforms, relay antennas and links with their inview runs, as written in
//! the `scenario` section of the planner configuration.

use crate::Result;
use link_model::{ConstellationContext, InviewStatus, LinkCriteria, WidebandTransmission};
use relay_topology::{
    Antenna, AntennaKind, Capability, Constellation, LinkDescriptor, RelaySatellite,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub user_vehicles: Vec<String>,
    #[serde(default)]
    pub ground_stations: Vec<String>,
    #[serde(default)]
    pub relays: Vec<RelayConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub designator: String,
    #[serde(default)]
    pub state_of_health: bool,
    #[serde(default)]
    pub antennas: Vec<AntennaConfig>,
}

fn default_capacity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntennaConfig {
    pub designator: String,
    pub kind: AntennaKind,
    /// Required for relay-pointing antennas to be anything but duplex
    #[serde(default)]
    pub capability: Option<Capability>,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub transmit_channels: Option<u32>,
    #[serde(default)]
    pub preparation_time: u32,
    #[serde(default)]
    pub data_rate_mbps: f64,
}

impl AntennaConfig {
    fn to_antenna(&self) -> Result<Antenna> {
        let capability = self.capability.unwrap_or(match self.kind {
            AntennaKind::UserPointing => Capability::Receive,
            AntennaKind::GroundPointing => Capability::Transmit,
            AntennaKind::RelayPointing => Capability::Duplex,
        });
        let mut antenna = Antenna::new(&self.designator, self.kind, capability, self.capacity)?
            .with_preparation_time(self.preparation_time)
            .with_data_rate(self.data_rate_mbps);
        if let Some(channels) = self.transmit_channels {
            antenna = antenna.with_transmit_channels(channels);
        }
        Ok(antenna)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub owner: String,
    pub antenna: String,
}

fn default_run_status() -> InviewStatus {
    InviewStatus::Link
}

/// Half-open run of one inview code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviewRun {
    pub start: usize,
    pub end: usize,
    #[serde(default = "default_run_status")]
    pub status: InviewStatus,
}

fn default_tracking() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub transmit: EndpointConfig,
    pub receive: EndpointConfig,
    /// Steps not covered by a run are `NoLink`
    #[serde(default)]
    pub inview: Vec<InviewRun>,
    #[serde(default)]
    pub wideband_transmission: WidebandTransmission,
    #[serde(default = "default_tracking")]
    pub track_allocations: bool,
}

impl LinkConfig {
    fn to_descriptor(&self, time_steps: usize) -> LinkDescriptor {
        let runs: Vec<_> = self
            .inview
            .iter()
            .map(|r| (r.start..r.end, r.status))
            .collect();
        let descriptor = LinkDescriptor::from_runs(
            (self.transmit.owner.as_str(), self.transmit.antenna.as_str()),
            (self.receive.owner.as_str(), self.receive.antenna.as_str()),
            time_steps,
            &runs,
        )
        .with_wideband_transmission(self.wideband_transmission);
        if self.track_allocations {
            descriptor
        } else {
            descriptor.untracked()
        }
    }
}

/// Register every platform in a fresh context and assemble the relays and
/// links
pub fn build_constellation(
    scenario: &ScenarioConfig,
    criteria: LinkCriteria,
    time_steps: usize,
) -> Result<Constellation> {
    let mut context = ConstellationContext::new();
    for user in &scenario.user_vehicles {
        context.register_user_vehicle(user)?;
    }
    for station in &scenario.ground_stations {
        context.register_ground_station(station)?;
    }
    for relay in &scenario.relays {
        context.register_relay_satellite(&relay.designator)?;
    }

    let mut relays = Vec::with_capacity(scenario.relays.len());
    for config in &scenario.relays {
        let mut relay = RelaySatellite::new(&context, &config.designator)?
            .with_state_of_health(config.state_of_health);
        for antenna in &config.antennas {
            relay.add_antenna(antenna.to_antenna()?)?;
        }
        relays.push(relay);
    }

    let mut constellation = Constellation::new(context, criteria, time_steps);
    for relay in relays {
        constellation.add_relay(relay)?;
    }
    for link in &scenario.links {
        let id = constellation.add_link(link.to_descriptor(time_steps))?;
        debug!(
            "Scenario link {}/{} -> {}/{} is {}",
            link.transmit.owner, link.transmit.antenna, link.receive.owner, link.receive.antenna, id
        );
    }

    info!(
        "Built constellation: {} relays, {} users, {} ground stations, {} links",
        constellation.relays().len(),
        constellation.context().user_vehicles().len(),
        constellation.context().ground_stations().len(),
        constellation.number_of_links()
    );
    Ok(constellation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlannerError;
    use link_model::{Inview, OverheadData};
    use relay_topology::TopologyError;

    const SCENARIO: &str = r#"{
        "user_vehicles": ["ISS"],
        "ground_stations": ["WSC"],
        "relays": [
            {
                "designator": "TDRS-E",
                "state_of_health": true,
                "antennas": [
                    {"designator": "SA-1", "kind": "UserPointing", "capacity": 2},
                    {"designator": "X", "kind": "RelayPointing", "capability": "Transmit"}
                ]
            },
            {
                "designator": "TDRS-W",
                "antennas": [
                    {"designator": "X", "kind": "RelayPointing", "capability": "Receive"},
                    {"designator": "SGL", "kind": "GroundPointing", "transmit_channels": 2, "data_rate_mbps": 300.0}
                ]
            }
        ],
        "links": [
            {
                "transmit": {"owner": "ISS", "antenna": "HGA"},
                "receive": {"owner": "TDRS-E", "antenna": "SA-1"},
                "inview": [{"start": 2, "end": 6}, {"start": 6, "end": 7, "status": "Outage"}],
                "wideband_transmission": "CommandAndMission"
            },
            {
                "transmit": {"owner": "TDRS-E", "antenna": "X"},
                "receive": {"owner": "TDRS-W", "antenna": "X"},
                "inview": [{"start": 0, "end": 10}]
            },
            {
                "transmit": {"owner": "TDRS-W", "antenna": "SGL"},
                "receive": {"owner": "WSC", "antenna": "DISH"},
                "inview": [{"start": 0, "end": 10}],
                "track_allocations": false
            }
        ]
    }"#;

    fn criteria() -> LinkCriteria {
        LinkCriteria::new(OverheadData::default_entry(1, 1)).unwrap()
    }

    #[test]
    fn test_build_constellation() {
        let scenario: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        let net = build_constellation(&scenario, criteria(), 10).unwrap();

        assert_eq!(net.relays().len(), 2);
        assert_eq!(net.number_of_links(), 3);
        assert!(net.context().any_state_of_health_relay());
        assert_eq!(net.minimum_number_of_hops("TDRS-E").unwrap(), Some(2));
        assert_eq!(net.minimum_number_of_hops("TDRS-W").unwrap(), Some(1));

        let (_, uplink) = net.links().next().unwrap();
        assert!(uplink.is_multi_hop_link());
        assert_eq!(uplink.inview_periods(), vec![2..6]);
        assert_eq!(uplink.inview_status(6), InviewStatus::Outage);
        assert!(uplink.start_up_is_wideband());

        let tdrs_w = net.relay("TDRS-W").unwrap();
        assert_eq!(tdrs_w.number_of_transmit_channels(), 2);
        assert_eq!(tdrs_w.channel_data_rates().len(), 3);
    }

    #[test]
    fn test_fixed_capability_rejected() {
        let scenario: ScenarioConfig = serde_json::from_str(
            r#"{"relays": [{"designator": "R", "antennas": [
                {"designator": "SA", "kind": "UserPointing", "capability": "Transmit"}
            ]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            build_constellation(&scenario, criteria(), 4),
            Err(PlannerError::Topology(TopologyError::FixedCapability { .. }))
        ));
    }

    #[test]
    fn test_conflicting_registration_rejected() {
        let scenario: ScenarioConfig = serde_json::from_str(
            r#"{"user_vehicles": ["X"], "ground_stations": ["X"]}"#,
        )
        .unwrap();
        assert!(matches!(
            build_constellation(&scenario, criteria(), 4),
            Err(PlannerError::Context(_))
        ));
    }
}
