//! Mock gateway for integration testing.
//!
//! Provides a deterministic `TournamentGateway` implementation that
//! serves canned statuses, leaderboards, stakes and earnings, and records
//! which rounds were requested. Everything is in-memory; nothing touches
//! the network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use numerox::engine::poller::Clock;
use numerox::gateway::{RawLeaderboardEntry, RawMetric, RawPayment, RawSubmissionStatus, TournamentGateway};
use numerox::types::{Credentials, MetricValue};

pub const DATASET_URL: &str = "https://mock.example.com/numerai_dataset.zip";
pub const DATASET_BYTES: &[u8] = b"PK\x03\x04mock-dataset";

/// A mock tournament for deterministic testing.
///
/// Submission statuses are served in order; the last one repeats once
/// the queue runs dry.
pub struct MockGateway {
    current_round: u32,
    statuses: Mutex<VecDeque<RawSubmissionStatus>>,
    last_status: Mutex<Option<RawSubmissionStatus>>,
    leaderboards: HashMap<u32, Vec<RawLeaderboardEntry>>,
    stakes: Value,
    status_calls: Arc<Mutex<u32>>,
    rounds_queried: Arc<Mutex<Vec<u32>>>,
    uploads: Arc<Mutex<Vec<String>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockGateway {
    pub fn new(current_round: u32) -> Self {
        Self {
            current_round,
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(None),
            leaderboards: HashMap::new(),
            stakes: json!({"data": {"rounds": [{"leaderboard": []}]}}),
            status_calls: Arc::new(Mutex::new(0)),
            rounds_queried: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue statuses to be returned by successive `submission_status` calls.
    pub fn with_statuses(self, statuses: Vec<Value>) -> Self {
        let queue = statuses
            .into_iter()
            .map(|s| s.as_object().cloned().unwrap_or_default())
            .collect();
        *self.statuses.lock().unwrap() = queue;
        self
    }

    pub fn with_leaderboard(mut self, round: u32, entries: Vec<RawLeaderboardEntry>) -> Self {
        self.leaderboards.insert(round, entries);
        self
    }

    /// Stake leaderboard served for any stakes query, as a list of
    /// `(username, insertedAt, soc, confidence, value)`.
    pub fn with_stakes(mut self, stakes: Vec<(&str, &str, f64, f64, Option<f64>)>) -> Self {
        let leaderboard: Vec<Value> = stakes
            .into_iter()
            .map(|(user, inserted, soc, c, value)| {
                json!({
                    "username": user,
                    "stake": {
                        "insertedAt": inserted,
                        "soc": soc.to_string(),
                        "confidence": c.to_string(),
                        "value": value.map(|v| v.to_string()),
                    }
                })
            })
            .collect();
        self.stakes = json!({"data": {"rounds": [{"leaderboard": leaderboard}]}});
        self
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn status_calls(&self) -> u32 {
        *self.status_calls.lock().unwrap()
    }

    pub fn rounds_queried(&self) -> Vec<u32> {
        self.rounds_queried.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(err) => Err(anyhow!("{}", err)),
            None => Ok(()),
        }
    }

    /// Every round pays `round` dollars of stake payout to alice, and a
    /// general payout to a per-round user.
    fn earnings_body(round: u32) -> Value {
        json!({"data": {"rounds": [{"leaderboard": [
            {"username": "alice",
             "paymentGeneral": {"usdAmount": "1.00", "nmrAmount": "0.25"},
             "paymentStaking": {"usdAmount": (round as f64), "nmrAmount": "2"}},
            {"username": format!("user{round}"),
             "paymentGeneral": {"usdAmount": "3.50"},
             "paymentStaking": null},
            {"username": "unpaid", "paymentGeneral": null, "paymentStaking": null}
        ]}]}})
    }
}

/// Leaderboard entry with resolved originality and concordance.
pub fn entry(user: &str, consistency: f64) -> RawLeaderboardEntry {
    let passed = Some(RawMetric {
        pending: false,
        value: MetricValue::Flag(true),
    });
    RawLeaderboardEntry {
        username: user.to_string(),
        consistency: Some(consistency),
        originality: passed.clone(),
        concordance: passed,
        live_logloss: None,
        validation_logloss: Some(0.6915),
        payment_general: None,
        payment_staking: Some(RawPayment {
            nmr_amount: Some(1.0),
            usd_amount: Some(4.0),
        }),
    }
}

#[async_trait]
impl TournamentGateway for MockGateway {
    async fn get_dataset_url(&self) -> Result<String> {
        self.check_error()?;
        Ok(DATASET_URL.to_string())
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        self.check_error()?;
        if url != DATASET_URL {
            return Err(anyhow!("Unknown URL: {url}"));
        }
        std::fs::write(dest, DATASET_BYTES)?;
        Ok(())
    }

    async fn upload_predictions(&self, path: &Path, _creds: &Credentials) -> Result<String> {
        self.check_error()?;
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(path.display().to_string());
        Ok(format!("MOCK-UPLOAD-{}", uploads.len()))
    }

    async fn submission_status(
        &self,
        _upload_id: &str,
        _creds: &Credentials,
    ) -> Result<RawSubmissionStatus> {
        self.check_error()?;
        *self.status_calls.lock().unwrap() += 1;
        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        if let Some(status) = next {
            *last = Some(status);
        }
        last.clone().ok_or_else(|| anyhow!("No status queued"))
    }

    async fn raw_query(&self, query: &str, variables: Value) -> Result<Value> {
        self.check_error()?;
        let round = variables["number"]
            .as_u64()
            .ok_or_else(|| anyhow!("Query without round number"))? as u32;
        self.rounds_queried.lock().unwrap().push(round);

        if query.contains("stake") {
            Ok(self.stakes.clone())
        } else if query.contains("paymentGeneral") {
            Ok(Self::earnings_body(round))
        } else {
            Err(anyhow!("Unsupported query"))
        }
    }

    async fn get_leaderboard(&self, round: u32) -> Result<Vec<RawLeaderboardEntry>> {
        self.check_error()?;
        self.rounds_queried.lock().unwrap().push(round);
        Ok(self.leaderboards.get(&round).cloned().unwrap_or_default())
    }

    async fn get_current_round(&self) -> Result<u32> {
        self.check_error()?;
        Ok(self.current_round)
    }
}

/// Clock that advances only when slept on.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}
