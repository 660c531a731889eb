//! Database tests

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::analysis::{AnalysisResult, RecommendedAction};

fn analysis(total: f64, usage: f64) -> AnalysisResult {
    AnalysisResult {
        total_amount: total,
        usage_kwh: usage,
        previous_usage_kwh: Some(usage - 10.0),
        billing_date: Some("2026-03-01".to_string()),
        action_plan: vec![RecommendedAction {
            id: "action-1".to_string(),
            icon: "zap".to_string(),
            title: "Shift laundry".to_string(),
            description: None,
            savings: "$8.00".to_string(),
        }],
        ..Default::default()
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_history("a@example.com").unwrap().is_empty());
    assert!(!db.is_encrypted());
}

#[test]
fn test_save_and_detail_roundtrip() {
    let db = Database::in_memory().unwrap();
    let original = analysis(142.5, 455.0);
    let id = db
        .save_analysis("a@example.com", Some("bill.pdf"), Some("abc123"), &original)
        .unwrap();
    assert!(id > 0);

    let detail = db.get_history_detail(id).unwrap().unwrap();
    assert_eq!(detail.user_email, "a@example.com");
    assert_eq!(detail.file_url.as_deref(), Some("bill.pdf"));
    assert_eq!(detail.content_hash.as_deref(), Some("abc123"));
    assert_eq!(detail.result, original);
}

#[test]
fn test_missing_detail() {
    let db = Database::in_memory().unwrap();
    assert!(db.get_history_detail(999).unwrap().is_none());
}

#[test]
fn test_list_history_newest_first_and_scoped() {
    let db = Database::in_memory().unwrap();
    let old = db
        .save_analysis_at("a@example.com", None, None, &analysis(100.0, 300.0), at(2026, 1, 5))
        .unwrap();
    let new = db
        .save_analysis_at("a@example.com", None, None, &analysis(120.0, 350.0), at(2026, 2, 5))
        .unwrap();
    db.save_analysis_at("b@example.com", None, None, &analysis(90.0, 280.0), at(2026, 3, 5))
        .unwrap();

    let items = db.list_history("a@example.com").unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, new);
    assert_eq!(items[1].id, old);
    assert_eq!(items[0].total_amount, 120.0);
    assert_eq!(items[0].billing_date.as_deref(), Some("2026-03-01"));
    assert_eq!(items[1].created_at, at(2026, 1, 5));
}

#[test]
fn test_find_by_hash() {
    let db = Database::in_memory().unwrap();
    let id = db
        .save_analysis("a@example.com", None, Some("deadbeef"), &analysis(10.0, 20.0))
        .unwrap();
    assert_eq!(db.find_by_hash("a@example.com", "deadbeef").unwrap(), Some(id));
    assert_eq!(db.find_by_hash("b@example.com", "deadbeef").unwrap(), None);
    assert_eq!(db.find_by_hash("a@example.com", "other").unwrap(), None);
}

#[test]
fn test_delete_analysis() {
    let db = Database::in_memory().unwrap();
    let id = db
        .save_analysis("a@example.com", None, None, &analysis(10.0, 20.0))
        .unwrap();
    assert!(db.delete_analysis(id).unwrap());
    assert!(!db.delete_analysis(id).unwrap());
    assert!(db.get_history_detail(id).unwrap().is_none());
}

#[test]
fn test_monthly_usage_latest_per_month() {
    let db = Database::in_memory().unwrap();
    let user = "a@example.com";
    db.save_analysis_at(user, None, None, &analysis(1.0, 300.0), at(2026, 1, 3))
        .unwrap();
    let jan_latest = db
        .save_analysis_at(user, None, None, &analysis(1.0, 320.0), at(2026, 1, 20))
        .unwrap();
    db.save_analysis_at(user, None, None, &analysis(1.0, 410.0), at(2026, 3, 2))
        .unwrap();
    // Inserted out of order; still sorted chronologically
    db.save_analysis_at(user, None, None, &analysis(1.0, 280.0), at(2025, 12, 15))
        .unwrap();

    let points = db.monthly_usage_history(user).unwrap();
    let months: Vec<&str> = points.iter().map(|p| p.month.as_str()).collect();
    assert_eq!(months, vec!["Dec", "Jan", "Mar"]);
    assert_eq!(points[1].usage, 320.0);
    assert_eq!(points[1].id, jan_latest);
    assert!(points.iter().all(|p| p.temp == 0.0));
}

#[test]
fn test_monthly_usage_keeps_last_twelve() {
    let db = Database::in_memory().unwrap();
    let user = "a@example.com";
    for i in 0..15u32 {
        let year = 2025 + (i / 12) as i32;
        let month = i % 12 + 1;
        db.save_analysis_at(user, None, None, &analysis(1.0, 100.0 + i as f64), at(year, month, 1))
            .unwrap();
    }

    let points = db.monthly_usage_history(user).unwrap();
    assert_eq!(points.len(), MAX_USAGE_MONTHS);
    assert_eq!(points[0].month, "Apr");
    assert_eq!(points[0].usage, 103.0);
    assert_eq!(points[11].month, "Mar");
    assert_eq!(points[11].usage, 114.0);
}

#[test]
fn test_usage_chart_falls_back_to_estimate() {
    let db = Database::in_memory().unwrap();
    let estimate = crate::extract::MockExtractor::sample_analysis();
    let chart = db.usage_chart("nobody@example.com", &estimate).unwrap();
    assert_eq!(chart.len(), 12);
    assert_eq!(chart[0].month, "Jan");
    assert_eq!(chart[0].temp, -4.0);

    db.save_analysis("nobody@example.com", None, None, &estimate)
        .unwrap();
    let chart = db.usage_chart("nobody@example.com", &estimate).unwrap();
    assert_eq!(chart.len(), 1);
}

#[test]
fn test_encrypted_db_requires_matching_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enc.db");
    let path = path.to_string_lossy();

    let db = Database::new_with_key(&path, Some("correct horse")).unwrap();
    assert!(db.is_encrypted());
    db.save_analysis("a@example.com", None, None, &analysis(5.0, 6.0))
        .unwrap();
    drop(db);

    let reopened = Database::new_with_key(&path, Some("correct horse")).unwrap();
    assert_eq!(reopened.list_history("a@example.com").unwrap().len(), 1);

    assert!(Database::new_with_key(&path, Some("wrong")).is_err());
}
