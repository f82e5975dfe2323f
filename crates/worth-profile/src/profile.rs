//! Worth profile store

use crate::ANY_RESOURCE;
use std::collections::BTreeMap;
use tracing::debug;

/// Dense worth arrays keyed by `(user, resource)`, created zeroed on first
/// write
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorthProfiles {
    time_steps: usize,
    profiles: BTreeMap<(String, String), Vec<f64>>,
}

impl WorthProfiles {
    pub fn new(time_steps: usize) -> Self {
        Self {
            time_steps,
            profiles: BTreeMap::new(),
        }
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[track_caller]
    fn check_time_step(&self, time_step: usize) {
        assert!(
            time_step < self.time_steps,
            "time step {time_step} outside planning horizon [0, {})",
            self.time_steps
        );
    }

    /// The profile for `(user, resource)`, created zeroed if absent
    pub fn profile_mut(&mut self, user: &str, resource: &str) -> &mut [f64] {
        let time_steps = self.time_steps;
        self.profiles
            .entry((user.to_string(), resource.to_string()))
            .or_insert_with(|| vec![0.0; time_steps])
    }

    pub fn profile(&self, user: &str, resource: &str) -> Option<&[f64]> {
        self.profiles
            .get(&(user.to_string(), resource.to_string()))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, user: &str, resource: &str) -> bool {
        self.profile(user, resource).is_some()
    }

    #[track_caller]
    pub fn add_worth(&mut self, user: &str, resource: &str, time_step: usize, worth: f64) {
        self.check_time_step(time_step);
        self.profile_mut(user, resource)[time_step] += worth;
    }

    /// Worth stored for exactly `(user, resource)`; zero when no profile
    /// exists
    #[track_caller]
    pub fn worth(&self, user: &str, resource: &str, time_step: usize) -> f64 {
        self.check_time_step(time_step);
        self.profile(user, resource)
            .map_or(0.0, |p| p[time_step])
    }

    /// Worth from the resource's own profile if the user has one, otherwise
    /// from the user's `ANY` profile
    #[track_caller]
    pub fn resolve_worth(&self, user: &str, resource: &str, time_step: usize) -> f64 {
        self.check_time_step(time_step);
        self.profile(user, resource)
            .or_else(|| self.profile(user, ANY_RESOURCE))
            .map_or(0.0, |p| p[time_step])
    }

    /// Users with at least one profile, in sorted order
    pub fn users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self.profiles.keys().map(|(u, _)| u.as_str()).collect();
        users.dedup();
        users
    }

    pub fn resources<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.profiles
            .keys()
            .filter(move |(u, _)| u == user)
            .map(|(_, r)| r.as_str())
    }

    pub fn total_worth(&self, user: &str, resource: &str) -> f64 {
        self.profile(user, resource)
            .map_or(0.0, |p| p.iter().sum())
    }

    /// Set every zero `ANY` cell to the largest specific-resource worth for
    /// the same user and timestep; returns the number of cells filled
    pub fn fill_base_profile(&mut self) -> usize {
        let users: Vec<String> = self.users().into_iter().map(str::to_string).collect();
        let mut filled = 0;

        for user in users {
            let mut best = vec![f64::NEG_INFINITY; self.time_steps];
            let mut any_specific = false;
            for ((u, resource), profile) in &self.profiles {
                if *u != user || resource == ANY_RESOURCE {
                    continue;
                }
                any_specific = true;
                for (slot, value) in best.iter_mut().zip(profile) {
                    *slot = slot.max(*value);
                }
            }
            if !any_specific {
                continue;
            }

            let base = self.profile_mut(&user, ANY_RESOURCE);
            let mut user_filled = 0;
            for (cell, value) in base.iter_mut().zip(&best) {
                if *cell == 0.0 && value.is_finite() && *value != 0.0 {
                    *cell = *value;
                    user_filled += 1;
                }
            }
            debug!("Backfilled {} ANY cells for {}", user_filled, user);
            filled += user_filled;
        }
        filled
    }

    pub fn clear(&mut self) {
        self.profiles.clear();
    }
}
