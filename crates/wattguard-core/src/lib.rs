//! WattGuard Core Library
//!
//! Shared functionality for the WattGuard utility bill tool:
//! - Fair-split allocation of a bill across roommates by usage tags
//! - Savings recalculation and next-month forecast
//! - Bill analysis schema and summary figures
//! - Pluggable vision backends for bill extraction
//! - Encrypted SQLite history of past analyses
//! - Split heuristics configuration

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod roster;
pub mod savings;
pub mod session;
pub mod share;
pub mod split;
pub mod weights;

pub use analysis::{AiInsight, AnalysisResult, BillSummary, MonthlyUsage, RecommendedAction};
pub use config::{SplitConfig, SplitParams, TagWeight};
pub use db::{Database, HistoryDetail, HistoryItem, MonthlyUsagePoint};
pub use error::{Error, Result};
pub use extract::{BillExtractor, BillImage, ExtractorClient, MockExtractor};
pub use roster::{Participant, Roster};
pub use savings::{AppliedActionSet, ForecastSummary, SavingsTracker};
pub use session::SplitSession;
pub use share::{calculation_details, share_text};
pub use split::{compute_split, Allocation, SplitResult};
pub use weights::WeightTable;
