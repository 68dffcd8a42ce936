//! Submission status polling.
//!
//! After an upload the tournament scores the submission asynchronously;
//! metrics flip from `null` to a value one by one. `StatusPoller` keeps
//! asking until every metric has a value, backing off slowly the longer
//! it waits.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::capital::is_controlling_capital;
use crate::error::Result;
use crate::gateway::TournamentGateway;
use crate::types::{Credentials, MetricValue, SubmissionStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const INITIAL_INTERVAL_SECS: u64 = 5;
const MAX_INTERVAL_SECS: u64 = 30;

/// Interval grows by one second per this many seconds waited.
const BACKOFF_STEP_SECS: u64 = 100;

/// Sleep before the next poll, given time elapsed since the first one.
pub fn poll_interval(elapsed: Duration) -> Duration {
    let secs = INITIAL_INTERVAL_SECS + elapsed.as_secs() / BACKOFF_STEP_SECS;
    Duration::from_secs(secs.min(MAX_INTERVAL_SECS))
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Time source for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Fetch the status of an upload once, without waiting for scoring.
pub async fn upload_status(
    gateway: &dyn TournamentGateway,
    upload_id: &str,
    creds: &Credentials,
) -> Result<SubmissionStatus> {
    let raw = gateway.submission_status(upload_id, creds).await?;
    Ok(SubmissionStatus::from_raw(&raw))
}

/// A metric that gained a value during polling.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResolution {
    pub metric: String,
    pub value: MetricValue,
    /// Minutes since polling started.
    pub minutes: f64,
}

/// Outcome of a completed poll.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub status: SubmissionStatus,
    /// In the order metrics first resolved.
    pub resolutions: Vec<MetricResolution>,
    pub polls: u32,
    pub elapsed: Duration,
    pub controlling_capital: bool,
}

enum PollState {
    Polling,
    Resolved(SubmissionStatus),
}

pub struct StatusPoller<'a> {
    gateway: &'a dyn TournamentGateway,
    clock: &'a dyn Clock,
    verbose: bool,
}

impl<'a> StatusPoller<'a> {
    pub fn new(gateway: &'a dyn TournamentGateway, clock: &'a dyn Clock) -> Self {
        Self {
            gateway,
            clock,
            verbose: false,
        }
    }

    /// Print progress lines to stdout as metrics resolve.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Poll until every metric of `upload_id` has a value.
    ///
    /// Gateway failures abort the wait.
    pub async fn wait(&self, upload_id: &str, creds: &Credentials) -> Result<PollReport> {
        let start = self.clock.now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut resolutions = Vec::new();
        let mut polls = 0u32;

        if self.verbose {
            println!("{}", progress_line("metric", "value", None));
        }

        let mut state = PollState::Polling;
        let status = loop {
            state = match state {
                PollState::Polling => {
                    let status = upload_status(self.gateway, upload_id, creds).await?;
                    polls += 1;
                    let elapsed = self.clock.now().duration_since(start);
                    let minutes = elapsed.as_secs_f64() / 60.0;

                    for (metric, value) in status.iter() {
                        if value.is_pending() || !seen.insert(metric.to_string()) {
                            continue;
                        }
                        info!(upload_id, metric, value = %value, minutes, "Metric resolved");
                        if self.verbose {
                            println!("{}", progress_line(metric, &value.to_string(), Some(minutes)));
                        }
                        resolutions.push(MetricResolution {
                            metric: metric.to_string(),
                            value,
                            minutes,
                        });
                    }

                    if status.is_complete() {
                        PollState::Resolved(status)
                    } else {
                        let wait = poll_interval(elapsed);
                        debug!(
                            upload_id,
                            resolved = status.resolved_count(),
                            total = status.len(),
                            wait_secs = wait.as_secs(),
                            "Submission still scoring"
                        );
                        self.clock.sleep(wait).await;
                        PollState::Polling
                    }
                }
                PollState::Resolved(status) => break status,
            };
        };

        let elapsed = self.clock.now().duration_since(start);
        let controlling_capital = is_controlling_capital(&status);
        if self.verbose {
            println!(
                "{}",
                progress_line(
                    "controlling capital",
                    &controlling_capital.to_string(),
                    Some(elapsed.as_secs_f64() / 60.0),
                )
            );
        }
        info!(upload_id, polls, controlling_capital, "Submission scored");

        Ok(PollReport {
            status,
            resolutions,
            polls,
            elapsed,
            controlling_capital,
        })
    }
}

/// One row of the progress table: name, value, minutes.
fn progress_line(metric: &str, value: &str, minutes: Option<f64>) -> String {
    match minutes {
        Some(m) => format!("{metric:<19} {value:>9}   {m:.4}"),
        None => format!("{metric:<19} {value:>9}   minutes"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
