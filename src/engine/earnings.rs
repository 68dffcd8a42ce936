//! Earnings and leaderboard history across a range of rounds.
//!
//! Both aggregators resolve an optional round range against the current
//! round, fetch each round, reshape it into rows and concatenate the
//! results in ascending round order. Rounds may be fetched concurrently;
//! the output order never depends on completion order.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::ops::RangeInclusive;
use tracing::{debug, info};

use super::capital::CONSISTENCY_THRESHOLD;
use crate::error::{NumeraiError, Result};
use crate::gateway::{round_leaderboard, RawLeaderboardEntry, RawPayment, TournamentGateway};
use crate::types::{EarningsRecord, LeaderboardRecord, Ten99Record};

const EARNINGS_QUERY: &str = r#"
    query($number: Int!) {
      rounds(number: $number) {
        leaderboard {
          username
          paymentGeneral {
            nmrAmount
            usdAmount
          }
          paymentStaking {
            nmrAmount
            usdAmount
          }
        }
      }
    }
"#;

/// Payout-only slice of a leaderboard entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEarnings {
    pub username: String,
    #[serde(default)]
    pub payment_general: Option<RawPayment>,
    #[serde(default)]
    pub payment_staking: Option<RawPayment>,
}

/// Tax year → inclusive round range paid out in that year.
pub fn ten99_rounds(year: i32) -> Result<RangeInclusive<u32>> {
    match year {
        2017 => Ok(31..=88),
        other => Err(NumeraiError::NotImplemented(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct EarningsAggregator<'a> {
    gateway: &'a dyn TournamentGateway,
    concurrency: usize,
}

impl<'a> EarningsAggregator<'a> {
    pub fn new(gateway: &'a dyn TournamentGateway) -> Self {
        Self {
            gateway,
            concurrency: 1,
        }
    }

    /// Number of rounds fetched in flight at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve optional bounds against the current round.
    ///
    /// Both missing: current round only. One missing: that side becomes
    /// the current round. The current round is fetched at most once.
    pub async fn resolve_rounds(
        &self,
        start: Option<u32>,
        end: Option<u32>,
    ) -> Result<RangeInclusive<u32>> {
        let range = match (start, end) {
            (Some(s), Some(e)) => s..=e,
            (None, None) => {
                let current = self.gateway.get_current_round().await?;
                current..=current
            }
            (None, Some(e)) => self.gateway.get_current_round().await?..=e,
            (Some(s), None) => s..=self.gateway.get_current_round().await?,
        };
        debug!(start = range.start(), end = range.end(), "Round range resolved");
        Ok(range)
    }

    /// Raw payout entries of one round (`None` = current round).
    pub async fn download_raw_earnings(&self, round: Option<u32>) -> Result<Vec<RawEarnings>> {
        let number = match round {
            Some(r) => r,
            None => self.gateway.get_current_round().await?,
        };
        let body = self
            .gateway
            .raw_query(EARNINGS_QUERY, json!({ "number": number }))
            .await?;
        Ok(round_leaderboard(body)?)
    }

    /// Non-zero payouts for every round in the range.
    pub async fn download_earnings(
        &self,
        start: Option<u32>,
        end: Option<u32>,
    ) -> Result<Vec<EarningsRecord>> {
        let rounds = self.resolve_rounds(start, end).await?;
        let rows = self
            .collect_rounds(rounds, |round| async move {
                let raw = self.download_raw_earnings(Some(round)).await?;
                Ok(earnings_rows(&raw, round))
            })
            .await?;
        info!(rows = rows.len(), "Earnings downloaded");
        Ok(rows)
    }

    /// Controlling-capital leaderboard entries for every round in the range.
    pub async fn get_leaderboard(
        &self,
        start: Option<u32>,
        end: Option<u32>,
    ) -> Result<Vec<LeaderboardRecord>> {
        let rounds = self.resolve_rounds(start, end).await?;
        let rows = self
            .collect_rounds(rounds, |round| async move {
                let raw = self.gateway.get_leaderboard(round).await?;
                Ok(leaderboard_rows(&raw, round))
            })
            .await?;
        info!(rows = rows.len(), "Leaderboard downloaded");
        Ok(rows)
    }

    /// A user's earnings for a tax year.
    pub async fn ten99(&self, user: &str, year: i32) -> Result<Vec<Ten99Record>> {
        let rounds = ten99_rounds(year)?;
        let earnings = self
            .download_earnings(Some(*rounds.start()), Some(*rounds.end()))
            .await?;
        Ok(earnings
            .iter()
            .filter(|e| e.user == user)
            .map(Ten99Record::from)
            .collect())
    }

    /// Run `fetch` for each round and concatenate in round order.
    ///
    /// Any failing round fails the whole call.
    async fn collect_rounds<T, F, Fut>(&self, rounds: RangeInclusive<u32>, fetch: F) -> Result<Vec<T>>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let per_round: Vec<Vec<T>> = stream::iter(rounds)
            .map(fetch)
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(per_round.into_iter().flatten().collect())
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Keep entries with at least one payment record.
///
/// Missing amounts default to 0.0; the general payment sometimes lacks
/// `nmrAmount`.
pub fn earnings_rows(raw: &[RawEarnings], round: u32) -> Vec<EarningsRecord> {
    raw.iter()
        .filter(|e| e.payment_general.is_some() || e.payment_staking.is_some())
        .map(|e| {
            let main = e.payment_general.clone().unwrap_or_default();
            let stake = e.payment_staking.clone().unwrap_or_default();
            EarningsRecord {
                round,
                user: e.username.clone(),
                usd_main: main.usd_amount.unwrap_or(0.0),
                nmr_main: main.nmr_amount.unwrap_or(0.0),
                usd_stake: stake.usd_amount.unwrap_or(0.0),
            }
        })
        .collect()
}

/// Entry qualifies as controlling capital for its round.
fn is_controlling(entry: &RawLeaderboardEntry) -> bool {
    let consistent = entry
        .consistency
        .is_some_and(|c| c >= CONSISTENCY_THRESHOLD);
    let original = entry.originality.as_ref().is_some_and(|m| m.passed());
    let concordant = entry.concordance.as_ref().is_some_and(|m| m.passed());
    consistent && original && concordant
}

/// Controlling-capital rows of one round's leaderboard.
pub fn leaderboard_rows(raw: &[RawLeaderboardEntry], round: u32) -> Vec<LeaderboardRecord> {
    raw.iter()
        .filter(|e| is_controlling(e))
        .map(|e| {
            let main = e.payment_general.clone().unwrap_or_default();
            let stake = e.payment_staking.clone().unwrap_or_default();
            LeaderboardRecord {
                round,
                name: e.username.clone(),
                consistency: e.consistency.unwrap_or(f64::NAN),
                validation_logloss: e.validation_logloss.unwrap_or(f64::NAN),
                live_logloss: e.live_logloss.unwrap_or(f64::NAN),
                usd_main: main.usd_amount.unwrap_or(0.0),
                nmr_main: main.nmr_amount.unwrap_or(0.0),
                usd_stake: stake.usd_amount.unwrap_or(0.0),
                nmr_stake: stake.nmr_amount.unwrap_or(0.0),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
