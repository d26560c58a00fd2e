//! Engine 3：逐張牌建議
//!
//! 每種手牌依序檢查：
//! 1. 特例：Joker 必留、持有 3 張以上的成組必留
//! 2. Tier 1：第一名牌型最佳變體需要
//! 3. Tier 2：第一名牌型的次佳變體需要
//! 4. Tier 3：後續數個牌型需要
//! 5. 其餘：打出（Charleston 階段為傳出）
//!
//! Charleston 階段最後補足或收回傳牌，使傳出張數恰為設定值。

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use super::context::GameContext;
use super::danger::{DangerAnnotation, OpponentRiskAnalyzer};
use super::panic_message;
use super::ranking::PatternRanking;
use crate::config::EngineConfig;
use crate::game::{
    Tile, TileCounts, COMPLETE_SET_CONFIDENCE, COMPLETE_SET_PRIORITY, COMPLETE_SET_SIZE,
    FALLBACK_CONFIDENCE, JOKER_CONFIDENCE, JOKER_PRIORITY, NEUTRAL_CONFIDENCE, TIER1_CONFIDENCE,
    TIER1_PRIORITY, TIER2_CONFIDENCE, TIER2_PRIORITY, TIER3_CONFIDENCE, TIER3_PRIORITY,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileAction {
    Keep,
    Pass,
    Discard,
    Neutral,
}

/// 產生建議的規則
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Joker,
    CompleteSet,
    Primary,
    Alternate,
    Backup,
    Fallback,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileRecommendation {
    pub tile: Tile,
    /// 手中此種牌的張數
    pub count: u8,
    pub action: TileAction,
    /// 0-100
    pub confidence: u8,
    pub priority: u8,
    pub tier: PriorityTier,
    pub reasoning: String,
    pub dangers: Vec<DangerAnnotation>,
}

impl TileRecommendation {
    fn new(
        tile: Tile,
        count: u8,
        action: TileAction,
        confidence: u8,
        priority: u8,
        tier: PriorityTier,
        reasoning: String,
    ) -> Self {
        Self {
            tile,
            count,
            action,
            confidence,
            priority,
            tier,
            reasoning,
            dangers: Vec::new(),
        }
    }

    fn failed(tile: Tile, count: u8, message: &str) -> Self {
        let mut rec = Self::new(
            tile,
            count,
            TileAction::Neutral,
            NEUTRAL_CONFIDENCE,
            0,
            PriorityTier::Error,
            "recommendation unavailable".to_string(),
        );
        rec.dangers.push(DangerAnnotation::strategic_error(message));
        rec
    }
}

/// Engine 3
#[derive(Clone, Debug)]
pub struct TileRecommendationEngine {
    tier3_depth: usize,
    pass_count: usize,
    risk: OpponentRiskAnalyzer,
}

impl TileRecommendationEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tier3_depth: config.tier3_depth,
            pass_count: config.charleston_pass_count,
            risk: OpponentRiskAnalyzer::new(config),
        }
    }

    /// 每個手牌 ID 一筆建議，依牌排序
    ///
    /// 對手快照取自 `context.opponents`。單張牌計算失敗時
    /// 該張改為 neutral 並附 `strategic_error`，其他牌照常計算。
    pub fn recommend(
        &self,
        hand: &[Tile],
        ranked: &[PatternRanking],
        context: &GameContext,
    ) -> Vec<TileRecommendation> {
        self.recommend_with(hand, context, |tile, count| {
            self.evaluate(tile, count, ranked, context)
        })
    }

    /// 逐張套用 `evaluate`，每張各自隔離 panic
    fn recommend_with<F>(&self, hand: &[Tile], context: &GameContext, evaluate: F) -> Vec<TileRecommendation>
    where
        F: Fn(Tile, u8) -> TileRecommendation,
    {
        let counts = TileCounts::from_tiles(hand);
        let distinct: BTreeSet<Tile> = hand.iter().copied().collect();

        let mut recs: Vec<TileRecommendation> = distinct
            .into_iter()
            .map(|tile| {
                let count = counts.get(tile);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut rec = evaluate(tile, count);
                    rec.dangers = self.risk.assess(tile, context);
                    for note in &rec.dangers {
                        rec.reasoning.push_str("; risk: ");
                        rec.reasoning.push_str(&note.message);
                    }
                    rec
                }));
                outcome.unwrap_or_else(|payload| {
                    let message = panic_message(&*payload);
                    warn!(tile = %tile, "tile recommendation failed: {message}");
                    TileRecommendation::failed(tile, count, &message)
                })
            })
            .collect();

        if context.is_charleston() {
            enforce_pass_quota(&mut recs, self.pass_count);
        }

        debug!(
            tiles = recs.len(),
            passes = recs.iter().filter(|r| r.action == TileAction::Pass).count(),
            "tile recommendations computed"
        );
        recs
    }

    fn evaluate(
        &self,
        tile: Tile,
        count: u8,
        ranked: &[PatternRanking],
        context: &GameContext,
    ) -> TileRecommendation {
        if tile.is_joker() {
            return TileRecommendation::new(
                tile,
                count,
                TileAction::Keep,
                JOKER_CONFIDENCE,
                JOKER_PRIORITY,
                PriorityTier::Joker,
                "jokers substitute in any pung, kong or quint".to_string(),
            );
        }
        if count >= COMPLETE_SET_SIZE {
            return TileRecommendation::new(
                tile,
                count,
                TileAction::Keep,
                COMPLETE_SET_CONFIDENCE,
                COMPLETE_SET_PRIORITY,
                PriorityTier::CompleteSet,
                format!("holding {count} copies, a complete set"),
            );
        }

        if let Some(top) = ranked.first() {
            if top.best.requires(tile) {
                return TileRecommendation::new(
                    tile,
                    count,
                    TileAction::Keep,
                    TIER1_CONFIDENCE,
                    TIER1_PRIORITY,
                    PriorityTier::Primary,
                    format!(
                        "required by {} ({} of 14 matched)",
                        top.pattern.id, top.best.tiles_matched
                    ),
                );
            }

            // 次佳變體：至少兩個需要，或有一個與最佳變體同樣接近完成
            let supporting: Vec<_> = top.alternates.iter().filter(|a| a.requires(tile)).collect();
            let tied = supporting
                .iter()
                .any(|a| a.tiles_matched == top.best.tiles_matched);
            if supporting.len() >= 2 || tied {
                return TileRecommendation::new(
                    tile,
                    count,
                    TileAction::Keep,
                    TIER2_CONFIDENCE,
                    TIER2_PRIORITY,
                    PriorityTier::Alternate,
                    format!(
                        "fits {} alternate arrangement(s) of {}",
                        supporting.len(),
                        top.pattern.id
                    ),
                );
            }
        }

        if let Some(backup) = ranked
            .iter()
            .skip(1)
            .take(self.tier3_depth)
            .find(|r| r.best.requires(tile))
        {
            return TileRecommendation::new(
                tile,
                count,
                TileAction::Keep,
                TIER3_CONFIDENCE,
                TIER3_PRIORITY,
                PriorityTier::Backup,
                format!("keeps {} open as a backup pattern", backup.pattern.id),
            );
        }

        // 越多牌型用得到，越晚放棄
        let usefulness = ranked
            .iter()
            .filter(|r| r.best.requires(tile) || r.alternates.iter().any(|a| a.requires(tile)))
            .count();
        let priority = 1 + usefulness.min(3) as u8;
        let action = if context.is_charleston() {
            TileAction::Pass
        } else {
            TileAction::Discard
        };
        TileRecommendation::new(
            tile,
            count,
            action,
            FALLBACK_CONFIDENCE,
            priority,
            PriorityTier::Fallback,
            if usefulness == 0 {
                "not used by any ranked pattern".to_string()
            } else {
                format!("only used by {usefulness} lower-ranked pattern(s)")
            },
        )
    }
}

/// 讓傳出張數恰為 `quota`（非 Joker 的牌不足時以牌數為上限）
///
/// 不足時把優先級最低的牌補成 pass；過多時保留優先級最低的，
/// 其餘改為 neutral。同優先級以牌的順序決定。
fn enforce_pass_quota(recs: &mut [TileRecommendation], quota: usize) {
    let eligible = recs.iter().filter(|r| !r.tile.is_joker()).count();
    let quota = quota.min(eligible);

    let mut order: Vec<usize> = (0..recs.len()).filter(|&i| !recs[i].tile.is_joker()).collect();
    order.sort_by(|&a, &b| {
        recs[a]
            .priority
            .cmp(&recs[b].priority)
            .then_with(|| recs[a].tile.cmp(&recs[b].tile))
    });

    let passing: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| recs[i].action == TileAction::Pass)
        .collect();

    if passing.len() > quota {
        for &i in &passing[quota..] {
            let rec = &mut recs[i];
            rec.action = TileAction::Neutral;
            rec.confidence = NEUTRAL_CONFIDENCE;
            rec.reasoning.push_str("; held back, pass quota already met");
        }
    } else {
        let short = quota - passing.len();
        let promote: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&i| recs[i].action != TileAction::Pass)
            .take(short)
            .collect();
        for i in promote {
            let rec = &mut recs[i];
            rec.action = TileAction::Pass;
            rec.confidence = rec.confidence.min(NEUTRAL_CONFIDENCE);
            rec.reasoning.push_str("; passed to fill the Charleston quota");
        }
    }
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::parse_tiles;
    use crate::service::analysis::PatternAnalysisEngine;
    use crate::service::context::OpponentProfile;
    use crate::service::danger::DangerKind;
    use crate::service::ranking::PatternRankingEngine;
    use crate::service::store::VariationStore;
    use std::sync::Arc;

    const SCENARIO: [&str; 14] = [
        "1D", "5D", "8D", "4B", "6B", "6B", "6B", "6C", "6C", "east", "south", "white", "f1", "joker",
    ];

    fn pipeline(hand: &[Tile], ctx: &GameContext) -> Vec<TileRecommendation> {
        let config = EngineConfig::default();
        let store = Arc::new(VariationStore::builtin().unwrap());
        let facts = PatternAnalysisEngine::new(store.clone(), &config).analyze(
            hand,
            &store.candidate_patterns(),
            ctx,
        );
        let ranked = PatternRankingEngine::new(&config).rank(&facts, None);
        TileRecommendationEngine::new(&config).recommend(hand, &ranked, ctx)
    }

    fn find(recs: &[TileRecommendation], id: &str) -> TileRecommendation {
        let tile: Tile = id.parse().unwrap();
        recs.iter().find(|r| r.tile == tile).cloned().unwrap()
    }

    #[test]
    fn test_one_recommendation_per_distinct_tile() {
        let hand = parse_tiles(&SCENARIO).unwrap();
        let recs = pipeline(&hand, &GameContext::gameplay(60));
        let distinct: BTreeSet<Tile> = hand.iter().copied().collect();
        assert_eq!(recs.len(), distinct.len());
        assert!(recs.windows(2).all(|w| w[0].tile < w[1].tile));
        assert_eq!(find(&recs, "6B").count, 3);
    }

    #[test]
    fn test_special_cases_come_first() {
        let hand = parse_tiles(&SCENARIO).unwrap();
        let recs = pipeline(&hand, &GameContext::gameplay(60));

        let joker = find(&recs, "joker");
        assert_eq!(joker.action, TileAction::Keep);
        assert_eq!(joker.confidence, JOKER_CONFIDENCE);
        assert_eq!(joker.priority, JOKER_PRIORITY);

        let set = find(&recs, "6B");
        assert_eq!(set.tier, PriorityTier::CompleteSet);
        assert_eq!(set.confidence, COMPLETE_SET_CONFIDENCE);
    }

    #[test]
    fn test_gameplay_uses_discard_not_pass() {
        let hand = parse_tiles(&SCENARIO).unwrap();
        let recs = pipeline(&hand, &GameContext::gameplay(60));
        assert!(recs.iter().all(|r| r.action != TileAction::Pass));
        assert!(recs.iter().any(|r| r.action == TileAction::Discard));
    }

    #[test]
    fn test_charleston_passes_exactly_three() {
        let hand = parse_tiles(&SCENARIO).unwrap();
        let recs = pipeline(&hand, &GameContext::charleston());
        let passes: Vec<_> = recs.iter().filter(|r| r.action == TileAction::Pass).collect();
        assert_eq!(passes.len(), 3);
        assert!(passes.iter().all(|r| !r.tile.is_joker()));
    }

    #[test]
    fn test_charleston_promotes_lowest_priority_when_short() {
        // 全部牌都是 WIND-1 需要的，自然不會有 pass
        let hand = parse_tiles(&[
            "north", "north", "east", "east", "west", "west", "south", "south", "joker",
        ])
        .unwrap();
        let recs = pipeline(&hand, &GameContext::charleston());
        let passes: Vec<_> = recs.iter().filter(|r| r.action == TileAction::Pass).collect();
        assert_eq!(passes.len(), 3);
        assert!(passes.iter().all(|r| r.reasoning.contains("quota")));
        assert_eq!(find(&recs, "joker").action, TileAction::Keep);
    }

    #[test]
    fn test_quota_trims_surplus_passes() {
        let mut recs: Vec<TileRecommendation> = parse_tiles(&["1D", "2D", "3D", "4D", "5D"])
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                TileRecommendation::new(
                    t,
                    1,
                    TileAction::Pass,
                    FALLBACK_CONFIDENCE,
                    (5 - i) as u8,
                    PriorityTier::Fallback,
                    String::new(),
                )
            })
            .collect();
        enforce_pass_quota(&mut recs, 3);
        let actions: Vec<TileAction> = recs.iter().map(|r| r.action).collect();
        // 優先級 5,4,3,2,1 → 保留最低的三張
        assert_eq!(
            actions,
            vec![
                TileAction::Neutral,
                TileAction::Neutral,
                TileAction::Pass,
                TileAction::Pass,
                TileAction::Pass
            ]
        );
    }

    #[test]
    fn test_quota_capped_by_non_joker_tiles() {
        let mut recs = vec![
            TileRecommendation::new(Tile::Joker, 2, TileAction::Keep, 95, 10, PriorityTier::Joker, String::new()),
            TileRecommendation::new(Tile::FLOWER, 1, TileAction::Keep, 90, 9, PriorityTier::Primary, String::new()),
        ];
        enforce_pass_quota(&mut recs, 3);
        assert_eq!(recs[0].action, TileAction::Keep);
        assert_eq!(recs[1].action, TileAction::Pass);
    }

    #[test]
    fn test_without_rankings_everything_falls_through() {
        let hand = parse_tiles(&["1D", "9C", "red"]).unwrap();
        let engine = TileRecommendationEngine::new(&EngineConfig::default());
        let recs = engine.recommend(&hand, &[], &GameContext::gameplay(10));
        assert!(recs.iter().all(|r| r.tier == PriorityTier::Fallback
            && r.action == TileAction::Discard
            && r.confidence == FALLBACK_CONFIDENCE
            && r.priority == 1));
    }

    #[test]
    fn test_risk_is_advisory() {
        let hand = parse_tiles(&["9C", "1D", "2D"]).unwrap();
        let mut ctx = GameContext::gameplay(30);
        ctx.opponents
            .push(OpponentProfile::new("north").with_exposed(parse_tiles(&["9C", "9C", "9C"]).unwrap()));
        let engine = TileRecommendationEngine::new(&EngineConfig::default());
        let recs = engine.recommend(&hand, &[], &ctx);

        let nine = find(&recs, "9C");
        assert_eq!(nine.action, TileAction::Discard);
        assert_eq!(nine.dangers.len(), 1);
        assert_eq!(nine.dangers[0].kind, DangerKind::OpponentNeed);
        assert!(nine.reasoning.contains("risk"));
        assert!(find(&recs, "1D").dangers.is_empty());
    }

    #[test]
    fn test_failed_recommendation_is_neutral() {
        let rec = TileRecommendation::failed(Tile::FLOWER, 1, "boom");
        assert_eq!(rec.action, TileAction::Neutral);
        assert_eq!(rec.confidence, NEUTRAL_CONFIDENCE);
        assert_eq!(rec.dangers[0].kind, DangerKind::StrategicError);
    }

    #[test]
    fn test_one_failing_tile_does_not_stop_the_rest() {
        let hand = parse_tiles(&["1D", "9C", "red", "joker"]).unwrap();
        let engine = TileRecommendationEngine::new(&EngineConfig::default());
        let bad: Tile = "9C".parse().unwrap();
        let ctx = GameContext::gameplay(40);

        let recs = engine.recommend_with(&hand, &ctx, |tile, count| {
            if tile == bad {
                panic!("corrupt tile data");
            }
            engine.evaluate(tile, count, &[], &ctx)
        });

        assert_eq!(recs.len(), 4);
        let failed = find(&recs, "9C");
        assert_eq!(failed.action, TileAction::Neutral);
        assert_eq!(failed.confidence, NEUTRAL_CONFIDENCE);
        assert_eq!(failed.tier, PriorityTier::Error);
        assert_eq!(failed.dangers.len(), 1);
        assert_eq!(failed.dangers[0].kind, DangerKind::StrategicError);
        assert!(failed.dangers[0].message.contains("corrupt tile data"));

        assert_eq!(find(&recs, "joker").action, TileAction::Keep);
        assert_eq!(find(&recs, "1D").action, TileAction::Discard);
        assert_eq!(find(&recs, "red").tier, PriorityTier::Fallback);
    }

    #[test]
    fn test_failing_tile_still_meets_charleston_quota() {
        let hand = parse_tiles(&["1D", "9C", "red", "2B", "joker"]).unwrap();
        let engine = TileRecommendationEngine::new(&EngineConfig::default());
        let ctx = GameContext::charleston();

        let recs = engine.recommend_with(&hand, &ctx, |tile, count| {
            if tile.to_string() == "red" {
                panic!("corrupt tile data");
            }
            engine.evaluate(tile, count, &[], &ctx)
        });

        let passes = recs.iter().filter(|r| r.action == TileAction::Pass).count();
        assert_eq!(passes, 3);
        assert_eq!(find(&recs, "joker").action, TileAction::Keep);
    }
}
