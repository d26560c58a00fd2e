//! Engine 2：牌型排名
//!
//! 把 Engine 1 的事實換算成 0-100 的策略分數：
//! 目前牌數 (0-40) + 缺牌可得性 (0-50) + 牌型優先度 (0-10)，
//! 依分數分級，並判斷是否建議切換主牌型。

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use super::analysis::{AvailabilityFacts, PatternAnalysisFacts, TileMatchResult};
use crate::config::EngineConfig;
use crate::game::{
    Difficulty, PatternId, PatternInfo, AVAILABILITY_SCORE_MAX, CURRENT_TILE_SCORE_MAX,
    PRIORITY_SCORE_BASE, PRIORITY_SCORE_MAX, TIER_EXCELLENT, TIER_FAIR, TIER_GOOD, TIER_POOR,
};

/// 推薦等級
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Excellent,
    Good,
    Fair,
    Poor,
    Impossible,
}

impl RecommendationTier {
    pub fn from_score(score: f64) -> Self {
        if score >= TIER_EXCELLENT {
            RecommendationTier::Excellent
        } else if score >= TIER_GOOD {
            RecommendationTier::Good
        } else if score >= TIER_FAIR {
            RecommendationTier::Fair
        } else if score >= TIER_POOR {
            RecommendationTier::Poor
        } else {
            RecommendationTier::Impossible
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationTier::Excellent => "excellent",
            RecommendationTier::Good => "good",
            RecommendationTier::Fair => "fair",
            RecommendationTier::Poor => "poor",
            RecommendationTier::Impossible => "impossible",
        }
    }
}

/// 主牌型切換建議（只掛在第一名）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwitchRecommendation {
    pub should_switch: bool,
    pub current: PatternId,
    pub suggested: PatternId,
    /// 替代牌型分數減去目前主牌型分數
    pub score_delta: f64,
    pub reason: String,
}

/// 單一牌型的排名結果
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternRanking {
    pub pattern: PatternInfo,
    /// 三項分數之和
    pub total_score: f64,
    pub current_tile_score: f64,
    pub availability_score: f64,
    pub priority_score: f64,
    pub tier: RecommendationTier,
    pub completion_ratio: f64,
    pub availability_ratio: f64,
    pub jokers_usable: u8,
    pub best: TileMatchResult,
    pub alternates: Vec<TileMatchResult>,
    pub switch: Option<SwitchRecommendation>,
}

impl PatternRanking {
    pub fn pattern_id(&self) -> &PatternId {
        &self.pattern.id
    }
}

// ============================================================================
// 分數元件
// ============================================================================

/// `min(40, completion * 40)`
pub fn current_tile_score(best: &TileMatchResult) -> f64 {
    (best.completion_ratio * CURRENT_TILE_SCORE_MAX).clamp(0.0, CURRENT_TILE_SCORE_MAX)
}

/// 單張缺牌的難度分段
pub fn availability_band(ratio: f64) -> f64 {
    if ratio >= 0.75 {
        1.0
    } else if ratio >= 0.5 {
        0.8
    } else if ratio >= 0.25 {
        0.5
    } else if ratio > 0.0 {
        0.2
    } else {
        0.0
    }
}

/// 缺牌可得性分數
///
/// 以需要張數加權平均各缺牌的分段值，再縮放到 0-50。
/// 沒有缺牌時為滿分。
pub fn availability_score(availability: &AvailabilityFacts) -> f64 {
    let (weighted, weight) = availability
        .tiles
        .iter()
        .fold((0.0, 0.0), |(sum, w), t| {
            let needed = f64::from(t.needed);
            (sum + availability_band(t.ratio) * needed, w + needed)
        });
    if weight == 0.0 {
        return AVAILABILITY_SCORE_MAX;
    }
    (weighted / weight * AVAILABILITY_SCORE_MAX).clamp(0.0, AVAILABILITY_SCORE_MAX)
}

/// 牌型優先度：基礎 5，依分值與難度加減
pub fn priority_score(pattern: &PatternInfo) -> f64 {
    let mut score = PRIORITY_SCORE_BASE;
    score += match pattern.points {
        p if p >= 50 => 3.0,
        p if p >= 35 => 2.0,
        p if p >= 25 => 1.0,
        _ => 0.0,
    };
    score += match pattern.difficulty {
        Difficulty::Easy => 1.0,
        Difficulty::Medium => 0.0,
        Difficulty::Hard => -1.0,
    };
    score.clamp(0.0, PRIORITY_SCORE_MAX)
}

// ============================================================================
// PatternRankingEngine
// ============================================================================

/// Engine 2
#[derive(Clone, Debug)]
pub struct PatternRankingEngine {
    switch_margin: f64,
}

impl PatternRankingEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            switch_margin: config.switch_margin,
        }
    }

    /// 排名，依總分遞減（同分以牌型 ID 排序）
    ///
    /// 提供目前主牌型時，第一名附上切換建議。
    pub fn rank(
        &self,
        facts: &[PatternAnalysisFacts],
        current: Option<&PatternId>,
    ) -> Vec<PatternRanking> {
        self.rank_within(facts, facts, current)
    }

    /// 只排名 `facts`，但目前主牌型的分數可從較大的 `pool` 取得
    ///
    /// 主牌型可能因完成度不足而不在 `facts` 中；此時仍以它的實際分數比較，
    /// 兩邊都找不到才視為 0 分。
    pub fn rank_within(
        &self,
        facts: &[PatternAnalysisFacts],
        pool: &[PatternAnalysisFacts],
        current: Option<&PatternId>,
    ) -> Vec<PatternRanking> {
        let mut rankings: Vec<PatternRanking> = facts.iter().map(score_pattern).collect();
        rankings.sort_by(compare_rankings);

        if let Some(current) = current {
            let current_score = rankings
                .iter()
                .find(|r| r.pattern_id() == current)
                .map(|r| r.total_score)
                .or_else(|| {
                    pool.iter()
                        .find(|f| f.pattern_id() == current)
                        .map(|f| score_pattern(f).total_score)
                });
            let switch = self.switch_recommendation(&rankings, current, current_score.unwrap_or(0.0));
            if let (Some(top), Some(switch)) = (rankings.first_mut(), switch) {
                top.switch = Some(switch);
            }
        }

        debug!(
            ranked = rankings.len(),
            top = rankings.first().map(|r| r.pattern.id.as_str()).unwrap_or("-"),
            "patterns ranked"
        );
        rankings
    }

    /// 只有當最佳替代牌型高出目前主牌型一定比例時才建議切換
    fn switch_recommendation(
        &self,
        rankings: &[PatternRanking],
        current: &PatternId,
        current_score: f64,
    ) -> Option<SwitchRecommendation> {
        let alternative = rankings.iter().find(|r| r.pattern_id() != current)?;

        let threshold = current_score * (1.0 + self.switch_margin);
        let should_switch = alternative.total_score > threshold;
        let score_delta = alternative.total_score - current_score;
        let reason = if should_switch {
            format!(
                "{} scores {:.1} vs {:.1} for {}",
                alternative.pattern.id, alternative.total_score, current_score, current
            )
        } else {
            format!(
                "{} stays primary; best alternative {} is within {:.0}%",
                current,
                alternative.pattern.id,
                self.switch_margin * 100.0
            )
        };

        Some(SwitchRecommendation {
            should_switch,
            current: current.clone(),
            suggested: alternative.pattern.id.clone(),
            score_delta,
            reason,
        })
    }
}

fn score_pattern(facts: &PatternAnalysisFacts) -> PatternRanking {
    let current_tile_score = current_tile_score(&facts.best);
    let availability_score = availability_score(&facts.availability);
    let priority_score = priority_score(&facts.pattern);
    let total_score = current_tile_score + availability_score + priority_score;

    PatternRanking {
        pattern: facts.pattern.clone(),
        total_score,
        current_tile_score,
        availability_score,
        priority_score,
        tier: RecommendationTier::from_score(total_score),
        completion_ratio: facts.best.completion_ratio,
        availability_ratio: facts.availability.availability_ratio,
        jokers_usable: facts.jokers.jokers_usable,
        best: facts.best.clone(),
        alternates: facts.alternates.clone(),
        switch: None,
    }
}

fn compare_rankings(a: &PatternRanking, b: &PatternRanking) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| a.pattern.id.cmp(&b.pattern.id))
}

// ============================================================================
// 單元測試
// ============================================================================
