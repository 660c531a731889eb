//! End-to-end flow: extract a bill, store it, reload it from history,
//! apply savings and split the total.

use wattguard_core::extract::content_hash;
use wattguard_core::{
    share_text, BillExtractor, BillImage, Database, ExtractorClient, SavingsTracker,
    SplitConfig, SplitSession,
};

const USER: &str = "dana@example.com";

#[tokio::test]
async fn test_analyze_save_reload_split() {
    let config = SplitConfig::default();
    let db = Database::in_memory().unwrap();
    let extractor = ExtractorClient::mock();

    let pages = vec![BillImage::new(b"%PDF-1.7 fake bill".to_vec(), None, Some("bill.pdf")).unwrap()];
    let hash = content_hash(&pages);

    let result = extractor.analyze_bill(&pages).await.unwrap();
    let id = db
        .save_analysis(USER, Some("bill.pdf"), Some(hash.as_str()), &result)
        .unwrap();
    assert_eq!(db.find_by_hash(USER, &hash).unwrap(), Some(id));

    // Reload from history
    let detail = db.get_history_detail(id).unwrap().unwrap();
    assert_eq!(detail.result, result);

    // Savings against the stored analysis
    let mut tracker = SavingsTracker::new(detail.result.clone(), &config.params);
    tracker.toggle("action-1");
    tracker.toggle("action-2");
    let summary = tracker.summary();
    assert!((summary.total_savings - 29.5).abs() < 1e-9);
    assert!((summary.final_forecast - (151.2 - 29.5)).abs() < 1e-9);

    // Loading another record resets applied actions
    tracker.load(detail.result.clone());
    assert_eq!(tracker.summary().total_savings, 0.0);

    // Split the bill
    let mut session = SplitSession::new(detail.result.total_amount, Some(USER), &config).unwrap();
    session.toggle_tag(Some("1"), "Electric Heater");
    session.add_participant("Sam");
    session.add_custom_tag(None, "Aquarium");

    let split = session.result().unwrap();
    let allocated: f64 = split.participants.iter().map(|a| a.share).sum();
    assert!((allocated - 142.5).abs() < 1e-6);

    let text = share_text(split);
    assert!(text.starts_with("WattGuard Fair Split Result\nTotal Bill: $142.50\n\ndana: $"));
    assert!(text.contains("\nSam: $"));
    assert!(text.ends_with("\n\nCalculated with WattGuard AI"));

    // Usage chart now comes from history
    let usage = db.monthly_usage_history(USER).unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].usage, 455.0);
}
