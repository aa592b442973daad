//! LoadScheduler - the shot loop.
//!
//! For each of `shot_count` iterations: draw in `[0, random_limit)`, reduce
//! modulo the ammunition length, issue one request, sleep `cooldown`. A
//! failed request is recorded and consumes its slot and its cooldown like a
//! successful one; nothing aborts the loop.

use crate::ammunition::Ammunition;
use crate::issuer::RequestIssuer;
use crate::prng::Mt19937;
use perfshot_common::{ShotError, ShotResult};
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Individual failures kept in a report; the count is always exact.
pub const MAX_RECORDED_FAILURES: usize = 32;

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub shot_count: u32,
    pub cooldown: Duration,
    pub ammunition: Ammunition,
    pub seed: u64,
    pub random_limit: u32,
}

/// One failed shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShotFailure {
    pub shot: u32,
    pub url: String,
    pub error: ShotError,
}

/// Outcome of a complete load run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Endpoint index chosen for each shot, in order.
    pub selections: Vec<usize>,
    /// The first [`MAX_RECORDED_FAILURES`] failures.
    pub failures: Vec<ShotFailure>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Owns the seeded generator and the endpoint list for one run.
#[derive(Debug, Clone)]
pub struct LoadScheduler {
    rng: Mt19937,
    limit: NonZeroU32,
    shot_count: u32,
    cooldown: Duration,
    ammunition: Ammunition,
}

impl LoadScheduler {
    pub fn new(config: LoadConfig) -> ShotResult<Self> {
        if config.shot_count == 0 {
            return Err(ShotError::configuration("shot_count must be greater than zero"));
        }
        let limit = NonZeroU32::new(config.random_limit)
            .ok_or_else(|| ShotError::configuration("random_limit must be greater than zero"))?;

        Ok(Self {
            rng: Mt19937::new(config.seed),
            limit,
            shot_count: config.shot_count,
            cooldown: config.cooldown,
            ammunition: config.ammunition,
        })
    }

    pub fn shot_count(&self) -> u32 {
        self.shot_count
    }

    pub fn ammunition(&self) -> &Ammunition {
        &self.ammunition
    }

    /// Advance the generator and return the next endpoint index.
    pub fn next_selection(&mut self) -> usize {
        let draw = self.rng.randbelow(self.limit);
        self.ammunition.select(draw).0
    }

    /// The indices a [`run`](Self::run) from the current generator state would
    /// select, without issuing anything.
    pub fn plan(&self) -> Vec<usize> {
        let mut preview = self.clone();
        (0..self.shot_count).map(|_| preview.next_selection()).collect()
    }

    /// Fire every shot, one at a time.
    pub async fn run(mut self, issuer: &dyn RequestIssuer) -> LoadReport {
        info!(
            "Shooting {} requests across {} endpoints (cooldown {:?})",
            self.shot_count,
            self.ammunition.len(),
            self.cooldown
        );

        let started = Instant::now();
        let mut report = LoadReport {
            selections: Vec::with_capacity(self.shot_count as usize),
            ..Default::default()
        };

        for shot in 0..self.shot_count {
            let draw = self.rng.randbelow(self.limit);
            let (index, url) = self.ammunition.select(draw);
            report.selections.push(index);
            report.attempted += 1;

            match issuer.issue(url).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    debug!("Shot {} -> {} ({})", shot, url, outcome.status);
                }
                Err(e) => {
                    report.failed += 1;
                    debug!("Shot {} -> {} failed: {}", shot, url, e);
                    if report.failures.len() < MAX_RECORDED_FAILURES {
                        report.failures.push(ShotFailure {
                            shot,
                            url: url.to_string(),
                            error: e,
                        });
                    }
                }
            }

            tokio::time::sleep(self.cooldown).await;
        }

        report.elapsed = started.elapsed();
        if report.failed > 0 {
            warn!(
                "{} of {} requests failed",
                report.failed, report.attempted
            );
        }
        info!(
            "Load finished: {} attempted, {} succeeded in {:?}",
            report.attempted, report.succeeded, report.elapsed
        );
        report
    }
}
