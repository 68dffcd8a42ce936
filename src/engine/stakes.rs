//! Stake leaderboard.
//!
//! Fetches a round's stakers, drops inactive and zero-confidence stakes,
//! and ranks the rest in prize-pool payout order: highest confidence
//! first, ties broken by who staked earliest. `cumulative_above` is the
//! stake-on-confidence already covered by everyone ranked above a row.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{NumeraiError, Result};
use crate::gateway::{de_opt_f64, round_leaderboard, TournamentGateway};
use crate::report;
use crate::types::{StakeRecord, StakeTable};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Staking started in this round.
pub const FIRST_STAKING_ROUND: u32 = 61;

const SECS_PER_DAY: f64 = 86_400.0;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

const STAKES_QUERY: &str = r#"
    query stakes($number: Int!) {
      rounds(number: $number) {
        leaderboard {
          username
          stake {
            insertedAt
            soc
            confidence
            value
          }
        }
      }
    }
"#;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StakeEntry {
    username: String,
    #[serde(default)]
    stake: Option<RawStake>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStake {
    #[serde(default)]
    inserted_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    soc: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    confidence: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Sort keys
// ---------------------------------------------------------------------------

/// Display order for the stake table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StakeSort {
    /// Payout order, as returned by `get_stakes`.
    #[default]
    PrizePool,
    /// Confidence, descending.
    Confidence,
    /// Stake-on-confidence, descending.
    StakeOnConfidence,
    /// Stake amount, descending.
    Stake,
    /// Days staked, ascending.
    Days,
    /// Username, ascending.
    User,
}

impl FromStr for StakeSort {
    type Err = NumeraiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prize pool" | "prize-pool" => Ok(StakeSort::PrizePool),
            "c" | "confidence" => Ok(StakeSort::Confidence),
            "soc" => Ok(StakeSort::StakeOnConfidence),
            "s" | "stake" => Ok(StakeSort::Stake),
            "days" => Ok(StakeSort::Days),
            "user" => Ok(StakeSort::User),
            other => Err(NumeraiError::invalid(format!(
                "`sort_by` key not recognized: {other}"
            ))),
        }
    }
}

impl StakeTable {
    /// Copy of the rows in the requested order.
    pub fn sorted(&self, sort: StakeSort) -> Vec<StakeRecord> {
        let mut rows = self.rows.clone();
        match sort {
            StakeSort::PrizePool => {}
            StakeSort::Confidence => rows.sort_by(|a, b| b.confidence.total_cmp(&a.confidence)),
            StakeSort::StakeOnConfidence => {
                rows.sort_by(|a, b| b.stake_on_confidence.total_cmp(&a.stake_on_confidence))
            }
            StakeSort::Stake => rows.sort_by(|a, b| b.stake_amount.total_cmp(&a.stake_amount)),
            StakeSort::Days => rows.sort_by(|a, b| a.days_staked.total_cmp(&b.days_staked)),
            StakeSort::User => rows.sort_by(|a, b| a.user.cmp(&b.user)),
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Fetch and rank the stakes of `round` (`None` = current round).
pub async fn get_stakes(gateway: &dyn TournamentGateway, round: Option<u32>) -> Result<StakeTable> {
    let number = match round {
        None => 0,
        Some(r) if r < FIRST_STAKING_ROUND => {
            return Err(NumeraiError::invalid(format!(
                "first staking was in round {FIRST_STAKING_ROUND}, got {r}"
            )));
        }
        Some(r) => r,
    };

    let body = gateway
        .raw_query(STAKES_QUERY, json!({ "number": number }))
        .await?;
    let entries: Vec<StakeEntry> = round_leaderboard(body)?;
    debug!(round = number, entries = entries.len(), "Stake leaderboard fetched");

    let table = build_stake_table(entries, Utc::now())?;
    info!(
        round = number,
        stakers = table.rows.len(),
        zero_confidence = table.zero_confidence.len(),
        "Stakes ranked"
    );
    Ok(table)
}

/// Render the stake table of `round` sorted by `sort_by`.
///
/// The sort key is validated before anything is fetched.
pub async fn show_stakes(
    gateway: &dyn TournamentGateway,
    round: Option<u32>,
    sort_by: &str,
) -> Result<String> {
    let sort: StakeSort = sort_by.parse()?;
    let table = get_stakes(gateway, round).await?;
    Ok(render_stakes(&table, sort))
}

/// Text table of the stakes, followed by the C=0 users if there are any.
pub fn render_stakes(table: &StakeTable, sort: StakeSort) -> String {
    let mut out = report::render(&table.sorted(sort));
    if !table.zero_confidence.is_empty() {
        out.push_str(&format!("\nC=0: {}", table.zero_confidence.join(",")));
    }
    out
}

fn build_stake_table(entries: Vec<StakeEntry>, now: DateTime<Utc>) -> Result<StakeTable> {
    let mut rows = Vec::new();
    let mut zero_confidence = Vec::new();

    for entry in entries {
        let Some(stake) = entry.stake else { continue };
        let Some(value) = stake.value else { continue };

        let user = entry.username;
        let confidence = stake
            .confidence
            .ok_or_else(|| NumeraiError::malformed(format!("stake of {user} has no confidence")))?;
        let soc = stake
            .soc
            .ok_or_else(|| NumeraiError::malformed(format!("stake of {user} has no soc")))?;
        let inserted_at = stake
            .inserted_at
            .as_deref()
            .ok_or_else(|| NumeraiError::malformed(format!("stake of {user} has no insertedAt")))
            .and_then(parse_timestamp)?;

        if confidence == 0.0 {
            zero_confidence.push(user);
            continue;
        }

        rows.push(StakeRecord {
            user,
            stake_amount: value,
            confidence,
            stake_on_confidence: soc,
            days_staked: days_between(inserted_at, now),
            cumulative_above: 0.0,
        });
    }

    rank_stakes(&mut rows);
    Ok(StakeTable {
        rows,
        zero_confidence,
    })
}

/// Sort into prize-pool order and fill in `cumulative_above`.
pub fn rank_stakes(rows: &mut [StakeRecord]) {
    rows.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.days_staked.total_cmp(&a.days_staked))
    });

    let mut above = 0.0;
    for row in rows.iter_mut() {
        row.cumulative_above = above;
        above += row.stake_on_confidence;
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| NumeraiError::malformed(format!("bad stake timestamp {s:?}: {e}")))
}

/// Fractional days from `from` to `to`, to the microsecond.
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / MICROS_PER_DAY,
        None => delta.num_seconds() as f64 / SECS_PER_DAY,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
