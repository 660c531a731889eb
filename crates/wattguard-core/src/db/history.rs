//! Bill analysis history operations

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{parse_datetime, Database, DATETIME_FORMAT};
use crate::analysis::AnalysisResult;
use crate::error::Result;

/// Number of months returned by the usage chart
pub const MAX_USAGE_MONTHS: usize = 12;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Row in the history list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: i64,
    pub file_url: Option<String>,
    pub total_amount: f64,
    pub usage_kwh: f64,
    pub billing_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored analysis with its full result document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDetail {
    pub id: i64,
    pub user_email: String,
    pub file_url: Option<String>,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

/// One point of the month-by-month usage chart built from history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsagePoint {
    /// Analysis the point was taken from
    pub id: i64,
    pub month: String,
    pub usage: f64,
    pub temp: f64,
}

fn history_item_from_row(row: &Row) -> rusqlite::Result<HistoryItem> {
    let created_at: String = row.get(5)?;
    Ok(HistoryItem {
        id: row.get(0)?,
        file_url: row.get(1)?,
        total_amount: row.get(2)?,
        usage_kwh: row.get(3)?,
        billing_date: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Store an analysis, returning its id
    pub fn save_analysis(
        &self,
        user_email: &str,
        file_url: Option<&str>,
        content_hash: Option<&str>,
        analysis: &AnalysisResult,
    ) -> Result<i64> {
        self.save_analysis_at(user_email, file_url, content_hash, analysis, Utc::now())
    }

    /// Store an analysis with an explicit creation time
    pub fn save_analysis_at(
        &self,
        user_email: &str,
        file_url: Option<&str>,
        content_hash: Option<&str>,
        analysis: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let analysis_json = serde_json::to_string(analysis)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO bill_analyses (
                user_email, file_url, content_hash, total_amount, usage_kwh,
                previous_usage_kwh, next_month_forecast, billing_date,
                analysis_json, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_email,
                file_url,
                content_hash,
                analysis.total_amount,
                analysis.usage_kwh,
                analysis.previous_usage_kwh,
                analysis.next_month_forecast,
                analysis.billing_date,
                analysis_json,
                created_at.format(DATETIME_FORMAT).to_string(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!(id, total = analysis.total_amount, "Saved bill analysis");
        Ok(id)
    }

    /// List a user's analyses, newest first
    pub fn list_history(&self, user_email: &str) -> Result<Vec<HistoryItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_url, total_amount, usage_kwh, billing_date, created_at
            FROM bill_analyses
            WHERE user_email = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let items = stmt
            .query_map(params![user_email], history_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Fetch one analysis with its full result
    pub fn get_history_detail(&self, id: i64) -> Result<Option<HistoryDetail>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, user_email, file_url, content_hash, created_at, analysis_json
                FROM bill_analyses
                WHERE id = ?
                "#,
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, user_email, file_url, content_hash, created_at, analysis_json)) = row else {
            return Ok(None);
        };

        Ok(Some(HistoryDetail {
            id,
            user_email,
            file_url,
            content_hash,
            created_at: parse_datetime(&created_at),
            result: serde_json::from_str(&analysis_json)?,
        }))
    }

    /// Most recent analysis of the same bill content for this user
    pub fn find_by_hash(&self, user_email: &str, content_hash: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                r#"
                SELECT id FROM bill_analyses
                WHERE user_email = ? AND content_hash = ?
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                params![user_email, content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Delete an analysis. Returns false if it did not exist.
    pub fn delete_analysis(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM bill_analyses WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Usage per calendar month across a user's history.
    ///
    /// The latest analysis in each month wins. Points are in chronological
    /// order, limited to the last [`MAX_USAGE_MONTHS`]. Temperature is not
    /// tracked across bills and is reported as 0.
    pub fn monthly_usage_history(&self, user_email: &str) -> Result<Vec<MonthlyUsagePoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, usage_kwh, created_at
            FROM bill_analyses
            WHERE user_email = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_email], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Rows arrive oldest first, so later inserts overwrite earlier ones
        let mut by_month: BTreeMap<(i32, u32), (i64, f64)> = BTreeMap::new();
        for (id, usage, created_at) in rows {
            let created = parse_datetime(&created_at);
            by_month.insert((created.year(), created.month()), (id, usage));
        }

        let points: Vec<MonthlyUsagePoint> = by_month
            .into_iter()
            .map(|((_, month), (id, usage))| MonthlyUsagePoint {
                id,
                month: MONTH_NAMES[(month as usize - 1) % 12].to_string(),
                usage,
                temp: 0.0,
            })
            .collect();

        let skip = points.len().saturating_sub(MAX_USAGE_MONTHS);
        Ok(points.into_iter().skip(skip).collect())
    }

    /// Usage chart for a user, falling back to the analysis' own estimate
    /// when there is no history yet.
    pub fn usage_chart(
        &self,
        user_email: &str,
        fallback: &AnalysisResult,
    ) -> Result<Vec<MonthlyUsagePoint>> {
        let history = self.monthly_usage_history(user_email)?;
        if !history.is_empty() {
            return Ok(history);
        }

        if fallback.monthly_usage.is_empty() {
            warn!("No usage history and no estimated monthly usage available");
        }
        Ok(fallback
            .monthly_usage
            .iter()
            .map(|m| MonthlyUsagePoint {
                id: 0,
                month: m.month.clone(),
                usage: m.usage,
                temp: m.temp,
            })
            .collect())
    }
}
