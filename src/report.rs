//! Text and JSON rendering of result tables.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::types::{EarningsRecord, LeaderboardRecord, StakeRecord, Ten99Record};

/// A row that can be laid out as a text table.
pub trait TableRow {
    fn headers() -> &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// Render rows under left-justified headers, cells right-aligned.
pub fn render<T: TableRow>(rows: &[T]) -> String {
    let cells: Vec<Vec<String>> = rows.iter().map(TableRow::cells).collect();
    render_table(T::headers(), &cells)
}

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");

    let mut lines = vec![header.trim_end().to_string()];
    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:>w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(line);
    }
    lines.join("\n")
}

/// Emit any serialisable table as pretty-printed JSON to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Row layouts
// ---------------------------------------------------------------------------

impl TableRow for StakeRecord {
    fn headers() -> &'static [&'static str] {
        &["days", "s", "soc", "cumsum", "c", "user"]
    }

    /// Days to 4 decimals; money truncated to whole NMR.
    fn cells(&self) -> Vec<String> {
        vec![
            format!("{:.4}", self.days_staked),
            (self.stake_amount as i64).to_string(),
            (self.stake_on_confidence as i64).to_string(),
            (self.cumulative_above as i64).to_string(),
            self.confidence.to_string(),
            self.user.clone(),
        ]
    }
}

impl TableRow for EarningsRecord {
    fn headers() -> &'static [&'static str] {
        &["round", "user", "usd_main", "nmr_main", "usd_stake"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.round.to_string(),
            self.user.clone(),
            format!("{:.2}", self.usd_main),
            format!("{:.4}", self.nmr_main),
            format!("{:.2}", self.usd_stake),
        ]
    }
}

impl TableRow for LeaderboardRecord {
    fn headers() -> &'static [&'static str] {
        &[
            "round",
            "name",
            "consistency",
            "validation",
            "live",
            "usd_main",
            "nmr_main",
            "usd_stake",
            "nmr_stake",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.round.to_string(),
            self.name.clone(),
            format!("{:.2}", self.consistency),
            format!("{:.5}", self.validation_logloss),
            format!("{:.5}", self.live_logloss),
            format!("{:.2}", self.usd_main),
            format!("{:.4}", self.nmr_main),
            format!("{:.2}", self.usd_stake),
            format!("{:.4}", self.nmr_stake),
        ]
    }
}

impl TableRow for Ten99Record {
    fn headers() -> &'static [&'static str] {
        &["round", "usd_main", "nmr_main", "usd_stake"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.round.to_string(),
            format!("{:.2}", self.usd_main),
            format!("{:.4}", self.nmr_main),
            format!("{:.2}", self.usd_stake),
        ]
    }
}
