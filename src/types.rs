//! Shared types for the tournament client.
//!
//! Raw gateway shapes live in `gateway`; the types here are what the
//! engine hands back to callers. Every table row derives `Serialize` so
//! the CLI can emit JSON as well as text.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API key pair for authenticated calls (upload, submission status).
#[derive(Debug)]
pub struct Credentials {
    pub public_id: String,
    secret_key: SecretString,
}

impl Credentials {
    pub fn new(public_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            secret_key: SecretString::new(secret_key.into()),
        }
    }

    /// Value for the `Authorization` header.
    pub fn auth_header(&self) -> String {
        format!("Token {}${}", self.public_id, self.secret_key.expose_secret())
    }
}

// ---------------------------------------------------------------------------
// Submission status
// ---------------------------------------------------------------------------

/// A single scoring metric of a submission.
///
/// Serialises as `null`, a bool or a number, matching the wire form once
/// the `{value, pending}` wrapper has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Not computed yet.
    #[default]
    Pending,
    Flag(bool),
    Number(f64),
}

impl MetricValue {
    /// Map any raw JSON metric to a `MetricValue`.
    ///
    /// Wrapped records (`{"value": .., "pending": ..}`) are unwrapped to
    /// their `value`. Numeric strings are accepted since the API sends
    /// some decimals as strings. Anything else counts as pending.
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        use serde_json::Value;

        match raw {
            Value::Null => MetricValue::Pending,
            Value::Bool(b) => MetricValue::Flag(*b),
            Value::Number(n) => n
                .as_f64()
                .map(MetricValue::Number)
                .unwrap_or(MetricValue::Pending),
            Value::String(s) => match s.trim() {
                "true" | "True" => MetricValue::Flag(true),
                "false" | "False" => MetricValue::Flag(false),
                other => other
                    .parse::<f64>()
                    .map(MetricValue::Number)
                    .unwrap_or(MetricValue::Pending),
            },
            Value::Object(map) => map
                .get("value")
                .map(Self::from_raw)
                .unwrap_or(MetricValue::Pending),
            Value::Array(_) => MetricValue::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MetricValue::Pending)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            MetricValue::Pending => false,
            MetricValue::Flag(b) => *b,
            MetricValue::Number(n) => *n != 0.0,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Pending => write!(f, "pending"),
            MetricValue::Flag(b) => write!(f, "{b}"),
            MetricValue::Number(n) => write!(f, "{n:.4}"),
        }
    }
}

/// Scoring status of one upload, keyed by metric name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionStatus {
    metrics: BTreeMap<String, MetricValue>,
}

impl SubmissionStatus {
    /// Unwrap a raw status map coming from the gateway.
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let metrics = raw
            .iter()
            .map(|(k, v)| (k.clone(), MetricValue::from_raw(v)))
            .collect();
        Self { metrics }
    }

    pub fn get(&self, metric: &str) -> Option<MetricValue> {
        self.metrics.get(metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricValue)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.metrics.values().filter(|v| !v.is_pending()).count()
    }

    pub fn has_pending(&self) -> bool {
        self.metrics.values().any(MetricValue::is_pending)
    }

    /// Every known metric has a value.
    pub fn is_complete(&self) -> bool {
        self.resolved_count() == self.len()
    }
}

impl FromIterator<(String, MetricValue)> for SubmissionStatus {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One staker in a round, ranked in prize-pool order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeRecord {
    pub user: String,
    /// Raw stake (NMR).
    pub stake_amount: f64,
    pub confidence: f64,
    /// Stake-on-confidence as reported by the tournament.
    pub stake_on_confidence: f64,
    /// Fractional days since the stake was inserted.
    pub days_staked: f64,
    /// Sum of `stake_on_confidence` ranked strictly above this row.
    pub cumulative_above: f64,
}

/// Stake leaderboard plus the users left out because they staked at C=0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StakeTable {
    pub rows: Vec<StakeRecord>,
    pub zero_confidence: Vec<String>,
}

/// A user's payout in one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarningsRecord {
    pub round: u32,
    pub user: String,
    pub usd_main: f64,
    pub nmr_main: f64,
    pub usd_stake: f64,
}

/// A controlling-capital entry of a round's leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRecord {
    pub round: u32,
    pub name: String,
    pub consistency: f64,
    /// NaN when not reported.
    pub validation_logloss: f64,
    /// NaN until the round resolves.
    pub live_logloss: f64,
    pub usd_main: f64,
    pub nmr_main: f64,
    pub usd_stake: f64,
    pub nmr_stake: f64,
}

/// Yearly earnings row (round plus payouts only).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ten99Record {
    pub round: u32,
    pub usd_main: f64,
    pub nmr_main: f64,
    pub usd_stake: f64,
}

impl From<&EarningsRecord> for Ten99Record {
    fn from(e: &EarningsRecord) -> Self {
        Self {
            round: e.round,
            usd_main: e.usd_main,
            nmr_main: e.nmr_main,
            usd_stake: e.usd_stake,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
