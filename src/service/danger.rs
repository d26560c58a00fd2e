//! 對手風險
//!
//! 從對手的明牌與棄牌推測其需求。風險只作為附註，不改變主要動作。

use serde::Serialize;

use super::context::{GameContext, OpponentProfile};
use crate::config::EngineConfig;
use crate::game::{Tile, TileCounts};

// 各訊號的機率
const EXPOSED_KIND_RISK: f64 = 0.6;
const LIKE_NUMBER_RISK: f64 = 0.55;
const SUIT_FOCUS_RISK: f64 = 0.45;
const VISIBLE_PAIR_RISK: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerKind {
    /// 對手可能需要這張牌
    OpponentNeed,
    /// 此牌的建議計算失敗
    StrategicError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_probability(p: f64) -> Self {
        if p > 0.75 {
            Severity::High
        } else if p > 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DangerAnnotation {
    pub kind: DangerKind,
    pub severity: Severity,
    pub probability: f64,
    pub message: String,
}

impl DangerAnnotation {
    pub fn strategic_error(message: impl Into<String>) -> Self {
        Self {
            kind: DangerKind::StrategicError,
            severity: Severity::Medium,
            probability: 0.0,
            message: message.into(),
        }
    }
}

/// 對手需求推測
#[derive(Clone, Debug)]
pub struct OpponentRiskAnalyzer {
    threshold: f64,
}

impl OpponentRiskAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.risk_threshold,
        }
    }

    /// 對每位對手計算風險，超過門檻者產生附註
    pub fn assess(&self, tile: Tile, context: &GameContext) -> Vec<DangerAnnotation> {
        if tile.is_joker() {
            return Vec::new();
        }
        let visible = context.visible_counts();

        context
            .opponents
            .iter()
            .filter_map(|opponent| {
                let (probability, signals) = opponent_need(tile, opponent, &visible);
                (probability > self.threshold).then(|| DangerAnnotation {
                    kind: DangerKind::OpponentNeed,
                    severity: Severity::from_probability(probability),
                    probability,
                    message: format!(
                        "{} may need {} ({:.0}%: {})",
                        display_name(opponent),
                        tile,
                        probability * 100.0,
                        signals.join(", ")
                    ),
                })
            })
            .collect()
    }
}

fn display_name(opponent: &OpponentProfile) -> &str {
    if opponent.name.is_empty() {
        "opponent"
    } else {
        &opponent.name
    }
}

/// 單一對手對某張牌的需求機率，`1 - Π(1 - p)`
pub fn opponent_need(
    tile: Tile,
    opponent: &OpponentProfile,
    visible: &TileCounts,
) -> (f64, Vec<&'static str>) {
    let mut signals: Vec<(&'static str, f64)> = Vec::new();

    if opponent
        .exposed_sets
        .iter()
        .any(|set| set.iter().any(|t| t.same_kind(tile)))
    {
        signals.push(("exposed set", EXPOSED_KIND_RISK));
    }

    if let (Some(suit), Some(rank)) = (tile.suit(), tile.rank()) {
        // 同號：其他花色已亮出相同點數
        let mut suits_with_rank: Vec<_> = opponent
            .exposed_tiles()
            .filter(|t| t.rank() == Some(rank))
            .filter_map(|t| t.suit())
            .collect();
        suits_with_rank.sort_unstable();
        suits_with_rank.dedup();
        if suits_with_rank.len() >= 2 {
            signals.push(("like numbers", LIKE_NUMBER_RISK));
        }

        let sets_in_suit = opponent
            .exposed_sets
            .iter()
            .filter(|set| set.iter().any(|t| t.suit() == Some(suit)))
            .count();
        let discarded_suit = opponent.discards.iter().any(|t| t.suit() == Some(suit));
        if sets_in_suit >= 2 && !discarded_suit {
            signals.push(("suit focus", SUIT_FOCUS_RISK));
        }
    }

    let own_exposed = opponent.exposed_tiles().filter(|t| t.same_kind(tile)).count();
    let elsewhere = usize::from(visible.get(tile)).saturating_sub(own_exposed);
    let discarded_kind = opponent.discards.iter().any(|t| t.same_kind(tile));
    if elsewhere >= 2 && !discarded_kind {
        signals.push(("visible pair", VISIBLE_PAIR_RISK));
    }

    let miss = signals.iter().fold(1.0, |acc, (_, p)| acc * (1.0 - p));
    (1.0 - miss, signals.into_iter().map(|(name, _)| name).collect())
}

// ============================================================================
// 單元測試
// ============================================================================
