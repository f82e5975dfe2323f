//! Run execution and the JSON summary it produces

use crate::config::PlannerConfig;
use crate::scenario::build_constellation;
use crate::Result;
use chrono::{DateTime, Utc};
use link_model::{
    AngleThreshold, Band, Inview, LinkCriteria, LinkKind, ResolvedOverhead, Timeline,
};
use relay_topology::{ChannelRate, Constellation};
use serde::Serialize;
use std::ops::Range;
use std::path::Path;
use tracing::info;
use worth_profile::{WorthParseReport, WorthParser, WorthProfiles};

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub timeline: TimelineSummary,
    pub criteria: CriteriaSummary,
    pub topology: Option<TopologySummary>,
    pub worth: Option<WorthSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_seconds: f64,
    pub time_steps: usize,
    pub of_start: f64,
    pub of_end: f64,
}

impl TimelineSummary {
    fn new(timeline: &Timeline) -> Self {
        Self {
            start: timeline.start(),
            end: timeline.of_time_to_epoch(timeline.of_end()),
            step_seconds: timeline.step_seconds(),
            time_steps: timeline.len(),
            of_start: timeline.of_start(),
            of_end: timeline.of_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverheadSummary {
    pub resource_designator: String,
    pub resolved: ResolvedOverhead,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaSummary {
    pub overhead: Vec<OverheadSummary>,
    pub narrowband_conjunctions: usize,
    pub wideband_conjunctions: usize,
    pub maneuver: Option<AngleThreshold>,
    pub solar_intrusion: Option<AngleThreshold>,
}

impl CriteriaSummary {
    fn new(criteria: &LinkCriteria) -> Self {
        Self {
            overhead: criteria
                .overhead_entries()
                .iter()
                .map(|entry| OverheadSummary {
                    resource_designator: entry.resource_designator.clone(),
                    resolved: criteria.resolve_overhead(&entry.resource_designator),
                })
                .collect(),
            narrowband_conjunctions: criteria.conjunction_table(Band::Narrowband).entries().len(),
            wideband_conjunctions: criteria.conjunction_table(Band::Wideband).entries().len(),
            maneuver: criteria.maneuver_threshold(),
            solar_intrusion: criteria.solar_intrusion_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelaySummary {
    pub designator: String,
    pub antennas: usize,
    pub total_transmit_capacity: u32,
    pub total_receive_capacity: u32,
    pub number_of_transmit_channels: u32,
    pub channel_data_rates: Vec<ChannelRate>,
    /// `None` when no crosslink chain reaches the ground
    pub minimum_number_of_hops: Option<usize>,
    /// Timesteps with a ground station or user vehicle reachable
    pub time_steps_with_resource_in_view: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub id: usize,
    pub transmit: String,
    pub receive: String,
    pub kind: Option<LinkKind>,
    pub resource_designator: String,
    pub inview_time_steps: usize,
    pub inview_periods: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologySummary {
    pub relays: Vec<RelaySummary>,
    pub links: Vec<LinkSummary>,
}

impl TopologySummary {
    fn new(constellation: &Constellation) -> Result<Self> {
        let mut relays = Vec::with_capacity(constellation.relays().len());
        for relay in constellation.relays() {
            let designator = relay.designator();
            let mut in_view = 0;
            for t in 0..constellation.time_steps() {
                if constellation.has_any_resource_in_view(designator, t)? {
                    in_view += 1;
                }
            }
            relays.push(RelaySummary {
                designator: designator.to_string(),
                antennas: relay.antennas().count(),
                total_transmit_capacity: relay.total_transmit_capacity(),
                total_receive_capacity: relay.total_receive_capacity(),
                number_of_transmit_channels: relay.number_of_transmit_channels(),
                channel_data_rates: relay.channel_data_rates(),
                minimum_number_of_hops: constellation.minimum_number_of_hops(designator)?,
                time_steps_with_resource_in_view: in_view,
            });
        }

        let links = constellation
            .links()
            .map(|(id, link)| LinkSummary {
                id: id.0,
                transmit: link.transmit().to_string(),
                receive: link.receive().to_string(),
                kind: link.kind(),
                resource_designator: link.resource_designator().to_string(),
                inview_time_steps: link.number_of_inview_time_steps(),
                inview_periods: link.inview_periods(),
            })
            .collect();

        Ok(Self { relays, links })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub user: String,
    pub resource: String,
    pub total_worth: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorthSummary {
    pub report: WorthParseReport,
    pub backfilled_cells: usize,
    pub profiles: Vec<ProfileSummary>,
}

impl WorthSummary {
    fn new(report: WorthParseReport, backfilled_cells: usize, profiles: &WorthProfiles) -> Self {
        let mut summaries = Vec::new();
        for user in profiles.users() {
            for resource in profiles.resources(user) {
                summaries.push(ProfileSummary {
                    user: user.to_string(),
                    resource: resource.to_string(),
                    total_worth: profiles.total_worth(user, resource),
                });
            }
        }
        Self {
            report,
            backfilled_cells,
            profiles: summaries,
        }
    }
}

/// Validate the configuration, build the scenario and apply the worth file
pub fn run(config: &PlannerConfig, worth_path: Option<&Path>) -> Result<PlanSummary> {
    let timeline = config.timeline.to_timeline()?;
    let criteria = config.link_criteria()?;
    info!(
        "Link criteria: {} overhead entries",
        criteria.overhead_entries().len()
    );
    let criteria_summary = CriteriaSummary::new(&criteria);

    let topology = match &config.scenario {
        Some(scenario) => {
            let constellation = build_constellation(scenario, criteria, timeline.len())?;
            Some(TopologySummary::new(&constellation)?)
        }
        None => None,
    };

    let worth = match worth_path {
        Some(path) => {
            let parser = WorthParser::new(&config.worth, &timeline);
            let mut profiles = parser.profiles();
            let report = parser.parse_file(path, &mut profiles)?;
            let backfilled = profiles.fill_base_profile();
            info!(
                "Worth profiles: {} users, {} profiles, {} ANY cells backfilled",
                profiles.users().len(),
                profiles.len(),
                backfilled
            );
            Some(WorthSummary::new(report, backfilled, &profiles))
        }
        None => None,
    };

    Ok(PlanSummary {
        timeline: TimelineSummary::new(&timeline),
        criteria: criteria_summary,
        topology,
        worth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"{
        "timeline": {"start": "2024-01-01T00:00:00Z", "step_seconds": 10.0, "time_steps": 6, "of_start": 500.0},
        "link_criteria": {
            "overhead": [
                {"resource_designator": "DEFAULT", "acquisition_time": 1, "droplink_time": 1},
                {"resource_designator": "TDRS-E", "acquisition_time": 2}
            ],
            "narrowband_conjunction": [{"angle_deg": 3.0, "senders": 2}]
        },
        "scenario": {
            "user_vehicles": ["ISS"],
            "ground_stations": ["WSC"],
            "relays": [{
                "designator": "TDRS-E",
                "antennas": [
                    {"designator": "SA-1", "kind": "UserPointing"},
                    {"designator": "SGL", "kind": "GroundPointing"}
                ]
            }],
            "links": [
                {
                    "transmit": {"owner": "ISS", "antenna": "HGA"},
                    "receive": {"owner": "TDRS-E", "antenna": "SA-1"},
                    "inview": [{"start": 1, "end": 3}]
                },
                {
                    "transmit": {"owner": "TDRS-E", "antenna": "SGL"},
                    "receive": {"owner": "WSC", "antenna": "DISH"},
                    "inview": [{"start": 4, "end": 6}]
                }
            ]
        }
    }"#;

    #[test]
    fn test_run_with_scenario_and_worth() {
        let config = PlannerConfig::from_json(CONFIG).unwrap();
        let mut worth = NamedTempFile::new().unwrap();
        writeln!(worth, "2024-001 ISS REQ1 KUSSAR 500 TDRS-E").unwrap();
        writeln!(worth, "20 40").unwrap();
        writeln!(worth, "2024-001 ISS REQ2 KUSSAR 530 ALL").unwrap();
        writeln!(worth, "10 7").unwrap();
        worth.flush().unwrap();

        let summary = run(&config, Some(worth.path())).unwrap();

        assert_eq!(summary.timeline.time_steps, 6);
        assert_eq!(summary.timeline.of_end, 560.0);
        assert_eq!(summary.criteria.overhead.len(), 2);
        assert_eq!(summary.criteria.overhead[1].resolved.droplink_time, 1);
        assert_eq!(summary.criteria.narrowband_conjunctions, 1);

        let topology = summary.topology.unwrap();
        assert_eq!(topology.relays[0].minimum_number_of_hops, Some(1));
        // steps 1, 2 (user) and 4, 5 (ground)
        assert_eq!(topology.relays[0].time_steps_with_resource_in_view, 4);
        assert_eq!(topology.links[0].kind, Some(LinkKind::MultiHop));
        assert_eq!(topology.links[0].inview_periods, vec![1..3]);
        assert_eq!(topology.links[1].kind, Some(LinkKind::Downlink));

        let worth = summary.worth.unwrap();
        assert_eq!(worth.report.bins_applied, 2);
        assert_eq!(worth.report.aliased_resources, 1);
        // ANY gets 7 at step 3 and is backfilled with 20 at steps 0 and 1
        assert_eq!(worth.backfilled_cells, 2);
        let any = worth
            .profiles
            .iter()
            .find(|p| p.resource == "ANY")
            .unwrap();
        assert!((any.total_worth - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_without_scenario_or_worth() {
        let mut config = PlannerConfig::from_json(CONFIG).unwrap();
        config.scenario = None;
        let summary = run(&config, None).unwrap();
        assert!(summary.topology.is_none());
        assert!(summary.worth.is_none());
        assert!(serde_json::to_string(&summary).is_ok());
    }
}
