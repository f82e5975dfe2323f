//! Worth-bin parsing and apportionment
//!
//! A line with more than two whitespace-separated tokens is a header:
//!
//! ```text
//! date user request_id mnemonic of_time_start resource
//! ```
//!
//! Every following two-token line `seconds worth` is a bin. Bins in a block
//! are consecutive: the first starts at `of_time_start`, each later one
//! where the previous ended.
//!
//! ```text
//!   bin  |<------------- seconds ------------->|
//!   step |   t   |  t+1  |  t+2  |  t+3  |
//!        ^cursor  ^next boundary
//! ```
//!
//! Bad lines are counted in [`WorthParseReport`] and skipped; only I/O
//! errors are returned.

use crate::profile::WorthProfiles;
use crate::{Result, WorthError, ANY_RESOURCE};
use link_model::Timeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

fn default_excluded_resources() -> Vec<String> {
    vec!["SLOW".to_string()]
}

fn default_legacy_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([("ALL".to_string(), ANY_RESOURCE.to_string())])
}

/// Which header blocks are accepted and how resources are renamed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorthConfig {
    /// Accepted mnemonics; empty accepts any well-formed mnemonic
    #[serde(default)]
    pub valid_mnemonics: Vec<String>,
    #[serde(default = "default_excluded_resources")]
    pub excluded_resources: Vec<String>,
    #[serde(default = "default_legacy_aliases")]
    pub legacy_aliases: BTreeMap<String, String>,
}

impl Default for WorthConfig {
    fn default() -> Self {
        Self {
            valid_mnemonics: Vec::new(),
            excluded_resources: default_excluded_resources(),
            legacy_aliases: default_legacy_aliases(),
        }
    }
}

impl WorthConfig {
    pub fn is_valid_mnemonic(&self, mnemonic: &str) -> bool {
        let well_formed = !mnemonic.is_empty()
            && mnemonic
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        well_formed
            && (self.valid_mnemonics.is_empty()
                || self.valid_mnemonics.iter().any(|m| m == mnemonic))
    }

    pub fn is_excluded_resource(&self, resource: &str) -> bool {
        self.excluded_resources
            .iter()
            .any(|r| r.eq_ignore_ascii_case(resource))
    }

    /// Resource name after legacy alias substitution
    pub fn canonical_resource<'a>(&'a self, resource: &'a str) -> &'a str {
        self.legacy_aliases
            .get(resource)
            .map(String::as_str)
            .unwrap_or(resource)
    }
}

/// Counters for one parse
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorthParseReport {
    pub headers: usize,
    pub malformed_headers: usize,
    pub invalid_mnemonics: usize,
    pub excluded_resources: usize,
    pub aliased_resources: usize,
    pub bins_applied: usize,
    /// Bins under a skipped header or before any header
    pub bins_skipped: usize,
    /// Unparseable lines or bins with a non-positive duration
    pub malformed_bins: usize,
    /// Bins that ran past either end of the horizon
    pub truncated_bins: usize,
    pub worth_applied: f64,
    pub worth_discarded: f64,
}

impl WorthParseReport {
    pub fn merge(&mut self, other: &WorthParseReport) {
        self.headers += other.headers;
        self.malformed_headers += other.malformed_headers;
        self.invalid_mnemonics += other.invalid_mnemonics;
        self.excluded_resources += other.excluded_resources;
        self.aliased_resources += other.aliased_resources;
        self.bins_applied += other.bins_applied;
        self.bins_skipped += other.bins_skipped;
        self.malformed_bins += other.malformed_bins;
        self.truncated_bins += other.truncated_bins;
        self.worth_applied += other.worth_applied;
        self.worth_discarded += other.worth_discarded;
    }
}

/// Header block currently receiving bins
#[derive(Debug)]
struct Block {
    user: String,
    resource: String,
    cursor: f64,
}

/// Result of spreading one bin over the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
struct Apportioned {
    applied: f64,
    discarded: f64,
    /// Part of the bin fell outside the horizon
    truncated: bool,
}

pub struct WorthParser<'a> {
    config: &'a WorthConfig,
    timeline: &'a Timeline,
}

impl<'a> WorthParser<'a> {
    pub fn new(config: &'a WorthConfig, timeline: &'a Timeline) -> Self {
        Self { config, timeline }
    }

    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        profiles: &mut WorthProfiles,
    ) -> Result<WorthParseReport> {
        let path = path.as_ref();
        info!("Loading worth bins from {:?}", path);
        let file = File::open(path)?;
        self.parse_reader(BufReader::new(file), profiles)
    }

    /// Empty profile store sized to this parser's timeline
    pub fn profiles(&self) -> WorthProfiles {
        WorthProfiles::new(self.timeline.len())
    }

    fn check_horizon(&self, profiles: &WorthProfiles) -> Result<()> {
        if profiles.time_steps() != self.timeline.len() {
            return Err(WorthError::HorizonMismatch {
                profiles: profiles.time_steps(),
                timeline: self.timeline.len(),
            });
        }
        Ok(())
    }

    pub fn parse_reader<R: BufRead>(
        &self,
        reader: R,
        profiles: &mut WorthProfiles,
    ) -> Result<WorthParseReport> {
        self.check_horizon(profiles)?;
        let mut report = WorthParseReport::default();
        let mut block: Option<Block> = None;
        for line in reader.lines() {
            self.parse_line(&line?, &mut block, profiles, &mut report);
        }
        self.log_report(&report);
        Ok(report)
    }

    pub fn parse_str(&self, text: &str, profiles: &mut WorthProfiles) -> Result<WorthParseReport> {
        self.check_horizon(profiles)?;
        let mut report = WorthParseReport::default();
        let mut block: Option<Block> = None;
        for line in text.lines() {
            self.parse_line(line, &mut block, profiles, &mut report);
        }
        self.log_report(&report);
        Ok(report)
    }

    fn log_report(&self, report: &WorthParseReport) {
        info!(
            "Parsed {} worth headers, applied {} bins ({:.3} worth, {:.3} discarded)",
            report.headers, report.bins_applied, report.worth_applied, report.worth_discarded
        );
        let rejected = report.malformed_headers + report.malformed_bins;
        if rejected > 0 {
            warn!("Skipped {} malformed worth lines", rejected);
        }
    }

    fn parse_line(
        &self,
        line: &str,
        block: &mut Option<Block>,
        profiles: &mut WorthProfiles,
        report: &mut WorthParseReport,
    ) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            0 => {}
            1 => {
                debug!("Ignoring single-token worth line {:?}", line);
                report.malformed_bins += 1;
            }
            2 => self.parse_bin(&tokens, block, profiles, report),
            _ => *block = self.parse_header(&tokens, report),
        }
    }

    fn parse_header(&self, tokens: &[&str], report: &mut WorthParseReport) -> Option<Block> {
        report.headers += 1;

        let [_date, user, _request_id, mnemonic, of_time_start, resource, ..] = tokens else {
            debug!("Worth header {:?} is missing fields", tokens.join(" "));
            report.malformed_headers += 1;
            return None;
        };
        let Ok(cursor) = of_time_start.parse::<f64>() else {
            debug!("Worth header has bad OF start time {:?}", of_time_start);
            report.malformed_headers += 1;
            return None;
        };
        if !cursor.is_finite() {
            report.malformed_headers += 1;
            return None;
        }

        if !self.config.is_valid_mnemonic(mnemonic) {
            debug!("Skipping {} block with invalid mnemonic {:?}", user, mnemonic);
            report.invalid_mnemonics += 1;
            return None;
        }
        if self.config.is_excluded_resource(resource) {
            debug!("Skipping {} block for excluded resource {}", user, resource);
            report.excluded_resources += 1;
            return None;
        }

        let canonical = self.config.canonical_resource(resource);
        if canonical != *resource {
            report.aliased_resources += 1;
        }
        Some(Block {
            user: (*user).to_string(),
            resource: canonical.to_string(),
            cursor,
        })
    }

    fn parse_bin(
        &self,
        tokens: &[&str],
        block: &mut Option<Block>,
        profiles: &mut WorthProfiles,
        report: &mut WorthParseReport,
    ) {
        let (Ok(seconds), Ok(worth)) = (tokens[0].parse::<f64>(), tokens[1].parse::<f64>()) else {
            debug!("Unparseable worth bin {:?}", tokens.join(" "));
            report.malformed_bins += 1;
            return;
        };
        if !(seconds.is_finite() && seconds > 0.0 && worth.is_finite()) {
            debug!("Rejecting worth bin ({}, {})", seconds, worth);
            report.malformed_bins += 1;
            return;
        }
        let Some(current) = block.as_mut() else {
            report.bins_skipped += 1;
            return;
        };

        let cells = profiles.profile_mut(&current.user, &current.resource);
        let result = apportion(self.timeline, cells, current.cursor, seconds, worth);
        current.cursor += seconds;

        report.bins_applied += 1;
        report.worth_applied += result.applied;
        report.worth_discarded += result.discarded;
        if result.truncated {
            report.truncated_bins += 1;
        }
    }
}

/// Spread `worth` over `[start, start + seconds)` on the timeline
///
/// The walk runs on offsets from the horizon start and steps the timestep
/// index once per boundary, so large OF times cannot stall it. Seconds
/// outside the horizon are reported as discarded, so
/// `applied + discarded == worth` up to rounding.
fn apportion(
    timeline: &Timeline,
    cells: &mut [f64],
    start: f64,
    seconds: f64,
    worth: f64,
) -> Apportioned {
    let per_second = worth / seconds;
    let step = timeline.step_seconds();
    let horizon = step * timeline.len() as f64;

    let bin_start = start - timeline.of_start();
    let from = bin_start.max(0.0);
    let to = (bin_start + seconds).min(horizon);

    let mut applied = 0.0;
    if from < to {
        let mut index = ((from / step).floor() as usize).min(timeline.len() - 1);
        let mut cursor = from;
        while cursor < to && index < timeline.len() {
            let boundary = (step * (index + 1) as f64).min(to);
            if boundary > cursor {
                let share = per_second * (boundary - cursor);
                cells[index] += share;
                applied += share;
                cursor = boundary;
            }
            index += 1;
        }
    }

    Apportioned {
        applied,
        discarded: worth - applied,
        truncated: bin_start < 0.0 || bin_start + seconds > horizon,
    }
}
