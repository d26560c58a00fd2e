//! 服務層模組
//!
//! 執行期的分析引擎：牌型變體庫、快取、Engine 1/2/3、對手風險與整體流程

use std::any::Any;

pub mod analysis;
pub mod cache;
pub mod context;
pub mod danger;
pub mod orchestrator;
pub mod ranking;
pub mod recommend;
pub mod store;

pub use analysis::{
    AvailabilityFacts, JokerAllocation, JokerFacts, PatternAnalysisEngine, PatternAnalysisFacts,
    ProgressSummary, TileAvailability, TileMatchResult,
};
pub use cache::{CacheIntegrity, CacheStats, TtlCache};
pub use context::{AnalysisKey, ContextKey, GameContext, GamePhase, OpponentProfile};
pub use danger::{DangerAnnotation, DangerKind, OpponentRiskAnalyzer, Severity};
pub use orchestrator::{
    AnalysisRequest, AnalysisSession, HandAnalysis, HandAnalyzer, PatternSelection,
    PipelineCacheStats, RequestKey,
};
pub use ranking::{PatternRanking, PatternRankingEngine, RecommendationTier, SwitchRecommendation};
pub use recommend::{PriorityTier, TileAction, TileRecommendation, TileRecommendationEngine};
pub use store::VariationStore;

/// 取出 panic 訊息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string())
}
