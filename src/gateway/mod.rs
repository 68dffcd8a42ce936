//! Tournament API gateway.
//!
//! Defines the `TournamentGateway` trait every engine component is
//! written against, the raw response shapes shared by callers, and the
//! reqwest-backed implementation in [`numerai`].

pub mod numerai;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::types::{Credentials, MetricValue};

/// Status map as the API returns it; values may be wrapped as
/// `{value, pending}`.
pub type RawSubmissionStatus = serde_json::Map<String, serde_json::Value>;

/// Abstraction over the tournament API.
///
/// Unauthenticated calls take no credentials; upload and status take them
/// per call. Implementations report every failure through `anyhow`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TournamentGateway: Send + Sync {
    /// URL of the current dataset archive.
    async fn get_dataset_url(&self) -> Result<String>;

    /// Stream `url` to `dest`, overwriting existing content.
    async fn download_file(&self, url: &str, dest: &Path) -> Result<()>;

    /// Upload a predictions file and return its upload id.
    async fn upload_predictions(&self, path: &Path, creds: &Credentials) -> Result<String>;

    async fn submission_status(
        &self,
        upload_id: &str,
        creds: &Credentials,
    ) -> Result<RawSubmissionStatus>;

    /// Run an arbitrary GraphQL query and return the full response body.
    async fn raw_query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value>;

    async fn get_leaderboard(&self, round: u32) -> Result<Vec<RawLeaderboardEntry>>;

    async fn get_current_round(&self) -> Result<u32>;
}

// ---------------------------------------------------------------------------
// Raw response types
// ---------------------------------------------------------------------------

/// A `{pending, value}` record (originality, concordance).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMetric {
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub value: MetricValue,
}

impl RawMetric {
    /// Resolved and truthy.
    pub fn passed(&self) -> bool {
        !self.pending && self.value.is_truthy()
    }
}

/// A payout record. Amounts arrive as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayment {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nmr_amount: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd_amount: Option<f64>,
}

/// One user's entry in a round leaderboard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLeaderboardEntry {
    pub username: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub consistency: Option<f64>,
    #[serde(default)]
    pub originality: Option<RawMetric>,
    #[serde(default)]
    pub concordance: Option<RawMetric>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub live_logloss: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub validation_logloss: Option<f64>,
    #[serde(default)]
    pub payment_general: Option<RawPayment>,
    #[serde(default)]
    pub payment_staking: Option<RawPayment>,
}

/// Accept `null`, a JSON number, or a numeric string.
pub fn de_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct RoundsResponse<T> {
    data: RoundsData<T>,
}

#[derive(Deserialize)]
struct RoundsData<T> {
    rounds: Vec<RoundLeaderboard<T>>,
}

#[derive(Deserialize)]
struct RoundLeaderboard<T> {
    leaderboard: Option<Vec<T>>,
}

/// Pull `data.rounds[0].leaderboard` out of a rounds query response.
pub fn round_leaderboard<T: DeserializeOwned>(response: serde_json::Value) -> Result<Vec<T>> {
    let parsed: RoundsResponse<T> =
        serde_json::from_value(response).context("Unexpected rounds response shape")?;
    let round = parsed
        .data
        .rounds
        .into_iter()
        .next()
        .context("Rounds response contained no round")?;
    Ok(round.leaderboard.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
