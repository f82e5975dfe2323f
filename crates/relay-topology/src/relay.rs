//! Relay satellites
//!
//! A relay owns its user-pointing, ground-pointing and relay-pointing
//! antennas. Capacity queries are folds over those collections; the hop and
//! reachability queries walk crosslinks into other relays of the same
//! [`Constellation`], guarded by a caller-managed visited set because the
//! crosslink graph may contain cycles.

use crate::antenna::{Antenna, AntennaKind};
use crate::constellation::Constellation;
use crate::{Result, TopologyError};
use link_model::{ConstellationContext, EndpointKind, Inview, Link};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One entry of [`RelaySatellite::channel_data_rates`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelRate {
    /// A real transmit channel
    Channel { antenna: String, rate_mbps: f64 },
    /// Synthetic combined rate over every active channel; not a channel
    Aggregate { rate_mbps: f64 },
}

impl ChannelRate {
    pub fn rate_mbps(&self) -> f64 {
        match self {
            ChannelRate::Channel { rate_mbps, .. } | ChannelRate::Aggregate { rate_mbps } => {
                *rate_mbps
            }
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ChannelRate::Aggregate { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaySatellite {
    designator: String,
    index: usize,
    state_of_health: bool,
    user_pointing: Vec<Antenna>,
    ground_pointing: Vec<Antenna>,
    relay_pointing: Vec<Antenna>,
}

impl RelaySatellite {
    /// The designator must already be registered as a relay in `context`
    pub fn new(context: &ConstellationContext, designator: &str) -> Result<Self> {
        let index = context
            .index_of(EndpointKind::Relay, designator)
            .ok_or_else(|| TopologyError::NotARelay(designator.to_string()))?;
        Ok(Self {
            designator: designator.to_string(),
            index,
            state_of_health: false,
            user_pointing: Vec::new(),
            ground_pointing: Vec::new(),
            relay_pointing: Vec::new(),
        })
    }

    /// Mark the relay as one that needs state-of-health contacts
    pub fn with_state_of_health(mut self, required: bool) -> Self {
        self.state_of_health = required;
        self
    }

    pub fn designator(&self) -> &str {
        &self.designator
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn requires_state_of_health(&self) -> bool {
        self.state_of_health
    }

    pub fn add_antenna(&mut self, antenna: Antenna) -> Result<()> {
        if self.antenna(antenna.designator()).is_some() {
            return Err(TopologyError::DuplicateAntenna {
                owner: self.designator.clone(),
                antenna: antenna.designator().to_string(),
            });
        }
        debug!(
            "Added {} antenna {} to {}",
            antenna.kind(),
            antenna.designator(),
            self.designator
        );
        match antenna.kind() {
            AntennaKind::UserPointing => self.user_pointing.push(antenna),
            AntennaKind::GroundPointing => self.ground_pointing.push(antenna),
            AntennaKind::RelayPointing => self.relay_pointing.push(antenna),
        }
        Ok(())
    }

    pub fn user_pointing_antennas(&self) -> &[Antenna] {
        &self.user_pointing
    }

    pub fn ground_pointing_antennas(&self) -> &[Antenna] {
        &self.ground_pointing
    }

    pub fn relay_pointing_antennas(&self) -> &[Antenna] {
        &self.relay_pointing
    }

    pub fn antennas(&self) -> impl Iterator<Item = &Antenna> {
        self.user_pointing
            .iter()
            .chain(&self.ground_pointing)
            .chain(&self.relay_pointing)
    }

    pub fn antenna(&self, designator: &str) -> Option<&Antenna> {
        self.antennas().find(|a| a.designator() == designator)
    }

    pub(crate) fn antenna_mut(&mut self, designator: &str) -> Option<&mut Antenna> {
        self.user_pointing
            .iter_mut()
            .chain(self.ground_pointing.iter_mut())
            .chain(self.relay_pointing.iter_mut())
            .find(|a| a.designator() == designator)
    }

    pub(crate) fn antennas_mut(&mut self) -> impl Iterator<Item = &mut Antenna> {
        self.user_pointing
            .iter_mut()
            .chain(self.ground_pointing.iter_mut())
            .chain(self.relay_pointing.iter_mut())
    }

    pub fn has_ground_pointing_antenna(&self) -> bool {
        !self.ground_pointing.is_empty()
    }

    // ---- capacity folds --------------------------------------------------

    pub fn user_pointing_antenna_capacity(&self) -> u32 {
        self.user_pointing.iter().map(Antenna::capacity).sum()
    }

    pub fn ground_pointing_antenna_capacity(&self) -> u32 {
        self.ground_pointing.iter().map(Antenna::capacity).sum()
    }

    pub fn relay_pointing_antenna_capacity(&self) -> u32 {
        self.relay_pointing.iter().map(Antenna::capacity).sum()
    }

    pub fn total_transmit_capacity(&self) -> u32 {
        self.antennas()
            .filter(|a| a.is_transmitting())
            .map(Antenna::capacity)
            .sum()
    }

    pub fn total_receive_capacity(&self) -> u32 {
        self.antennas()
            .filter(|a| a.is_receiving())
            .map(Antenna::capacity)
            .sum()
    }

    pub fn number_of_transmit_channels(&self) -> u32 {
        self.antennas()
            .filter(|a| a.is_transmitting())
            .map(Antenna::number_of_transmit_channels)
            .sum()
    }

    /// Longest preparation time over the relay's antennas
    pub fn maximum_preparation_time(&self) -> u32 {
        self.antennas()
            .map(Antenna::preparation_time)
            .max()
            .unwrap_or(0)
    }

    /// One entry per active transmit channel, followed by an `Aggregate`
    /// entry carrying the combined rate when more than one channel exists
    pub fn channel_data_rates(&self) -> Vec<ChannelRate> {
        let mut rates: Vec<ChannelRate> = self
            .antennas()
            .filter(|a| a.is_transmitting())
            .flat_map(|a| {
                (0..a.number_of_transmit_channels()).map(move |_| ChannelRate::Channel {
                    antenna: a.designator().to_string(),
                    rate_mbps: a.data_rate_mbps(),
                })
            })
            .collect();

        if rates.len() > 1 {
            let combined = self
                .antennas()
                .filter(|a| a.is_transmitting())
                .map(Antenna::transmit_rate_mbps)
                .sum();
            rates.push(ChannelRate::Aggregate {
                rate_mbps: combined,
            });
        }
        rates
    }

    // ---- link views ------------------------------------------------------

    fn links_on<'a>(
        antennas: &'a [Antenna],
        network: &'a Constellation,
    ) -> impl Iterator<Item = &'a Link> + 'a {
        antennas
            .iter()
            .flat_map(|a| a.link_ids())
            .filter_map(move |id| network.link(id))
    }

    /// Crosslinks this relay transmits on
    pub fn outgoing_crosslinks<'a>(
        &'a self,
        network: &'a Constellation,
    ) -> impl Iterator<Item = &'a Link> + 'a {
        self.relay_pointing
            .iter()
            .filter(|a| a.is_transmitting())
            .flat_map(|a| a.link_ids())
            .filter_map(move |id| network.link(id))
            .filter(move |l| l.transmit().owner == self.designator && l.is_crosslink())
    }

    pub fn has_ground_in_view(&self, time_step: usize, network: &Constellation) -> bool {
        Self::links_on(&self.ground_pointing, network).any(|l| l.is_inview(time_step))
    }

    pub fn has_user_in_view(&self, time_step: usize, network: &Constellation) -> bool {
        Self::links_on(&self.user_pointing, network).any(|l| l.is_inview(time_step))
    }

    // ---- topology --------------------------------------------------------

    /// Fewest links from this relay to the ground: 1 with a ground-pointing
    /// antenna, else one more than the best receiving relay not yet in
    /// `visited`. `None` when no chain reaches the ground.
    ///
    /// Each receiving relay is inserted into `visited` before the recursive
    /// call, so recursion depth never exceeds the number of relays.
    pub fn minimum_number_of_hops(
        &self,
        network: &Constellation,
        visited: &mut HashSet<String>,
    ) -> Option<usize> {
        if self.has_ground_pointing_antenna() {
            return Some(1);
        }

        let mut best: Option<usize> = None;
        for crosslink in self.outgoing_crosslinks(network) {
            let receiver = &crosslink.receive().owner;
            if !visited.insert(receiver.clone()) {
                continue;
            }
            let Some(next) = network.relay(receiver) else {
                continue;
            };
            if let Some(hops) = next.minimum_number_of_hops(network, visited) {
                let candidate = hops + 1;
                best = Some(best.map_or(candidate, |b| b.min(candidate)));
            }
        }

        debug!("{} minimum hops to ground: {:?}", self.designator, best);
        best
    }

    /// Whether this relay, or any relay reachable over its transmitting
    /// crosslinks, sees a ground station or user vehicle at `time_step`
    ///
    /// Crosslink visibility is not consulted; only the terminal ground and
    /// user links are checked at `time_step`.
    pub fn has_any_resource_in_view(
        &self,
        time_step: usize,
        network: &Constellation,
        checked: &mut HashSet<String>,
    ) -> bool {
        checked.insert(self.designator.clone());

        if self.has_ground_in_view(time_step, network) || self.has_user_in_view(time_step, network)
        {
            return true;
        }

        for crosslink in self.outgoing_crosslinks(network) {
            let receiver = &crosslink.receive().owner;
            if checked.contains(receiver) {
                continue;
            }
            if let Some(next) = network.relay(receiver) {
                if next.has_any_resource_in_view(time_step, network, checked) {
                    return true;
                }
            }
        }
        false
    }
}
