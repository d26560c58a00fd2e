//! Engine 1：牌型分析
//!
//! 對每個候選牌型的每個變體計算精確的比對事實：
//! 最佳/最差/平均完成度、Joker 替代潛力、缺牌的剩餘可得張數。
//! 只產生事實，不做評價。

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use super::cache::{CacheIntegrity, CacheStats, TtlCache};
use super::context::{analysis_key, AnalysisKey, GameContext};
use super::panic_message;
use super::store::VariationStore;
use crate::config::EngineConfig;
use crate::game::{PatternId, PatternInfo, PatternVariation, Tile, TileCounts, HAND_TILE_COUNT};

const EPSILON: f64 = 1e-9;

// ============================================================================
// 比對結果
// ============================================================================

/// 一手牌對一個變體的比對結果
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileMatchResult {
    pub pattern_id: PatternId,
    pub sequence: u32,
    pub tiles_matched: u8,
    pub tiles_needed: u8,
    /// `tiles_matched / 14`
    pub completion_ratio: f64,
    /// 缺少的牌，每缺一張記一次（依變體位置順序）
    pub missing_tiles: Vec<Tile>,
    /// 缺少的位置中可放 Joker 的數量
    pub joker_eligible_missing: u8,
    pub tiles: [Tile; HAND_TILE_COUNT],
    pub jokers_allowed: [bool; HAND_TILE_COUNT],
    /// 已由手牌填入的位置
    pub filled: [bool; HAND_TILE_COUNT],
}

impl TileMatchResult {
    /// 手牌與變體的多重集合交集
    ///
    /// 手牌先填入不可用 Joker 的位置，剩下的才填可用位置，
    /// 讓缺口盡量落在 Joker 能補的地方。
    pub fn compute(hand: &TileCounts, variation: &PatternVariation) -> Self {
        let mut held = *hand;
        let mut filled = [false; HAND_TILE_COUNT];
        for eligible_pass in [false, true] {
            for (i, (tile, allowed)) in variation
                .tiles
                .iter()
                .zip(variation.jokers_allowed.iter())
                .enumerate()
            {
                if *allowed == eligible_pass && held.remove(*tile) {
                    filled[i] = true;
                }
            }
        }

        let mut missing_tiles = Vec::new();
        let mut joker_eligible_missing = 0u8;
        for (i, tile) in variation.tiles.iter().enumerate() {
            if filled[i] {
                continue;
            }
            missing_tiles.push(*tile);
            if variation.jokers_allowed[i] {
                joker_eligible_missing += 1;
            }
        }

        let tiles_needed = missing_tiles.len() as u8;
        let tiles_matched = HAND_TILE_COUNT as u8 - tiles_needed;
        Self {
            pattern_id: variation.pattern_id.clone(),
            sequence: variation.sequence,
            tiles_matched,
            tiles_needed,
            completion_ratio: f64::from(tiles_matched) / HAND_TILE_COUNT as f64,
            missing_tiles,
            joker_eligible_missing,
            tiles: variation.tiles,
            jokers_allowed: variation.jokers_allowed,
            filled,
        }
    }

    /// 實際能用上的 Joker 數
    pub fn jokers_usable(&self, available: u8) -> u8 {
        available.min(self.joker_eligible_missing)
    }

    /// 用完 Joker 後仍須摸到的張數
    pub fn jokers_to_complete(&self, available: u8) -> u8 {
        self.tiles_needed - self.jokers_usable(available)
    }

    /// 此變體是否用到某種牌
    pub fn requires(&self, tile: Tile) -> bool {
        self.tiles.iter().any(|t| t.same_kind(tile))
    }

    fn is_consistent(&self) -> bool {
        usize::from(self.tiles_matched) + usize::from(self.tiles_needed) == HAND_TILE_COUNT
            && self.missing_tiles.len() == usize::from(self.tiles_needed)
            && self.filled.iter().filter(|f| **f).count() == usize::from(self.tiles_matched)
            && self.joker_eligible_missing <= self.tiles_needed
            && (self.completion_ratio - f64::from(self.tiles_matched) / HAND_TILE_COUNT as f64).abs()
                < EPSILON
    }
}

// ============================================================================
// Joker / 可得性 / 進度事實
// ============================================================================

/// 某種缺牌分配到的 Joker
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JokerAllocation {
    pub tile: Tile,
    pub jokers: u8,
    /// 此種牌在最佳變體中仍缺、且可放 Joker 的位置數
    pub eligible_slots: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JokerFacts {
    pub jokers_available: u8,
    pub eligible_missing: u8,
    pub jokers_usable: u8,
    pub jokers_to_complete: u8,
    pub with_jokers_completion: f64,
    pub allocations: Vec<JokerAllocation>,
}

impl JokerFacts {
    fn from_best(best: &TileMatchResult, available: u8) -> Self {
        let usable = best.jokers_usable(available);

        // 依變體位置順序分配，每種牌不超過其可用位置
        let mut allocations: Vec<JokerAllocation> = Vec::new();
        for (i, tile) in best.tiles.iter().enumerate() {
            if best.filled[i] || !best.jokers_allowed[i] {
                continue;
            }
            match allocations.iter_mut().find(|a| a.tile.same_kind(*tile)) {
                Some(a) => a.eligible_slots += 1,
                None => allocations.push(JokerAllocation {
                    tile: *tile,
                    jokers: 0,
                    eligible_slots: 1,
                }),
            }
        }
        let mut left = usable;
        for a in &mut allocations {
            a.jokers = left.min(a.eligible_slots);
            left -= a.jokers;
        }
        allocations.retain(|a| a.jokers > 0);

        Self {
            jokers_available: available,
            eligible_missing: best.joker_eligible_missing,
            jokers_usable: usable,
            jokers_to_complete: best.tiles_needed - usable,
            with_jokers_completion: f64::from(best.tiles_matched + usable) / HAND_TILE_COUNT as f64,
            allocations,
        }
    }

    fn is_consistent(&self) -> bool {
        let allocated: u32 = self.allocations.iter().map(|a| u32::from(a.jokers)).sum();
        self.jokers_usable <= self.jokers_available
            && allocated == u32::from(self.jokers_usable)
            && self.allocations.iter().all(|a| a.jokers <= a.eligible_slots)
            && (0.0..=1.0).contains(&self.with_jokers_completion)
    }
}

/// 單種缺牌的剩餘可得張數
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileAvailability {
    pub tile: Tile,
    pub needed: u8,
    pub in_game: u8,
    pub discarded: u8,
    pub exposed: u8,
    /// 自己手中的張數，僅供參考，不計入 `remaining`
    pub held: u8,
    /// `max(0, in_game - discarded - exposed)`
    pub remaining: u8,
    /// `min(1, remaining / needed)`
    pub ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailabilityFacts {
    pub tiles: Vec<TileAvailability>,
    pub total_missing: u32,
    /// 仍可取得的缺牌數，每種牌以需要量為上限
    pub total_available: u32,
    /// `total_available / total_missing`；無缺牌時為 1
    pub availability_ratio: f64,
}

impl AvailabilityFacts {
    fn from_best(
        best: &TileMatchResult,
        hand: &TileCounts,
        discards: &TileCounts,
        exposed: &TileCounts,
    ) -> Self {
        let mut tiles: Vec<TileAvailability> = Vec::new();
        for tile in &best.missing_tiles {
            if let Some(entry) = tiles.iter_mut().find(|t| t.tile.same_kind(*tile)) {
                entry.needed += 1;
                continue;
            }
            let in_game = tile.copies_in_game();
            let discarded = discards.get(*tile);
            let exposed = exposed.get(*tile);
            let held = hand.get(*tile);
            let gone = u16::from(discarded) + u16::from(exposed);
            tiles.push(TileAvailability {
                tile: *tile,
                needed: 1,
                in_game,
                discarded,
                exposed,
                held,
                remaining: u16::from(in_game).saturating_sub(gone) as u8,
                ratio: 0.0,
            });
        }
        for t in &mut tiles {
            t.ratio = (f64::from(t.remaining) / f64::from(t.needed)).min(1.0);
        }

        let total_missing: u32 = tiles.iter().map(|t| u32::from(t.needed)).sum();
        let total_available: u32 = tiles
            .iter()
            .map(|t| u32::from(t.needed.min(t.remaining)))
            .sum();
        let availability_ratio = if total_missing == 0 {
            1.0
        } else {
            f64::from(total_available) / f64::from(total_missing)
        };

        Self {
            tiles,
            total_missing,
            total_available,
            availability_ratio,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub best_completion: f64,
    pub worst_completion: f64,
    pub average_completion: f64,
    pub with_jokers_completion: f64,
    pub variations_considered: usize,
    pub tiles_matched: u8,
    pub tiles_needed: u8,
}

/// 單一候選牌型的彙總事實
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternAnalysisFacts {
    pub pattern: PatternInfo,
    pub best: TileMatchResult,
    pub worst: TileMatchResult,
    /// 次佳變體（依最佳變體的排序規則，不含 best）
    pub alternates: Vec<TileMatchResult>,
    pub jokers: JokerFacts,
    pub availability: AvailabilityFacts,
    pub progress: ProgressSummary,
}

impl PatternAnalysisFacts {
    pub fn pattern_id(&self) -> &PatternId {
        &self.pattern.id
    }
}

impl CacheIntegrity for PatternAnalysisFacts {
    fn is_well_formed(&self) -> bool {
        self.best.is_consistent()
            && self.worst.is_consistent()
            && self.alternates.iter().all(TileMatchResult::is_consistent)
            && self.best.tiles_matched >= self.worst.tiles_matched
            && self.best.pattern_id == self.pattern.id
            && self.jokers.is_consistent()
            && self.jokers.jokers_available >= self.jokers.jokers_usable
            && (0.0..=1.0).contains(&self.progress.average_completion)
    }
}

// ============================================================================
// PatternAnalysisEngine
// ============================================================================

/// Engine 1
pub struct PatternAnalysisEngine {
    store: Arc<VariationStore>,
    cache: TtlCache<AnalysisKey, Vec<PatternAnalysisFacts>>,
    alternate_variations: usize,
}

impl PatternAnalysisEngine {
    pub fn new(store: Arc<VariationStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            cache: TtlCache::new("pattern_analysis", config.cache_ttl(), config.cache_max_entries),
            alternate_variations: config.alternate_variations,
        }
    }

    /// 分析手牌對各候選牌型的比對事實（讀穿式快取）
    ///
    /// 未知牌型或沒有變體的牌型以 warn 記錄後略過；
    /// 單一牌型計算 panic 時只略過該牌型。
    pub fn analyze(
        &self,
        hand: &[Tile],
        patterns: &[PatternId],
        context: &GameContext,
    ) -> Vec<PatternAnalysisFacts> {
        let key = analysis_key(hand, patterns, context);
        self.cache
            .get_or_insert_with(key, || self.compute(hand, patterns, context))
    }

    pub fn store(&self) -> &Arc<VariationStore> {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn compute(
        &self,
        hand: &[Tile],
        patterns: &[PatternId],
        context: &GameContext,
    ) -> Vec<PatternAnalysisFacts> {
        let started = Instant::now();
        let counts = TileCounts::from_tiles(hand);
        let jokers_available = context.jokers_in_hand.max(counts.get(Tile::Joker));
        let discards = context.discard_counts();
        let exposed = context.exposed_counts();

        let mut seen = HashSet::new();
        let mut facts = Vec::with_capacity(patterns.len());
        for id in patterns {
            if !seen.insert(id) {
                continue;
            }
            let Some(info) = self.store.pattern_info(id) else {
                warn!(pattern = %id, "unknown pattern skipped");
                continue;
            };
            let variations = self.store.variations(id);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                analyze_pattern(
                    info,
                    variations,
                    &counts,
                    jokers_available,
                    &discards,
                    &exposed,
                    self.alternate_variations,
                )
            }));
            match outcome {
                Ok(Some(f)) => facts.push(f),
                Ok(None) => warn!(pattern = %id, "pattern has no variations, skipped"),
                Err(payload) => {
                    warn!(pattern = %id, "pattern analysis panicked: {}", panic_message(&*payload))
                }
            }
        }

        debug!(
            patterns = facts.len(),
            hand = hand.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "pattern analysis computed"
        );
        facts
    }
}

/// 單一牌型的所有變體比對
///
/// 最佳變體：比對數最高，其次用完 Joker 後仍缺最少，再其次序號最小。
/// 最差變體為同一排序的最後一個。
pub fn analyze_pattern(
    info: &PatternInfo,
    variations: &[PatternVariation],
    hand: &TileCounts,
    jokers_available: u8,
    discards: &TileCounts,
    exposed: &TileCounts,
    alternate_count: usize,
) -> Option<PatternAnalysisFacts> {
    let mut results: Vec<TileMatchResult> = variations
        .iter()
        .map(|v| TileMatchResult::compute(hand, v))
        .collect();
    results.sort_by(|a, b| {
        b.tiles_matched
            .cmp(&a.tiles_matched)
            .then_with(|| {
                a.jokers_to_complete(jokers_available)
                    .cmp(&b.jokers_to_complete(jokers_available))
            })
            .then_with(|| a.sequence.cmp(&b.sequence))
    });

    let best = results.first()?.clone();
    let worst = results.last()?.clone();
    let average_completion =
        results.iter().map(|r| r.completion_ratio).sum::<f64>() / results.len() as f64;
    let alternates: Vec<TileMatchResult> = results
        .iter()
        .skip(1)
        .take(alternate_count)
        .cloned()
        .collect();

    let jokers = JokerFacts::from_best(&best, jokers_available);
    let availability = AvailabilityFacts::from_best(&best, hand, discards, exposed);
    let progress = ProgressSummary {
        best_completion: best.completion_ratio,
        worst_completion: worst.completion_ratio,
        average_completion,
        with_jokers_completion: jokers.with_jokers_completion,
        variations_considered: results.len(),
        tiles_matched: best.tiles_matched,
        tiles_needed: best.tiles_needed,
    };

    Some(PatternAnalysisFacts {
        pattern: info.clone(),
        best,
        worst,
        alternates,
        jokers,
        availability,
        progress,
    })
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::parse_tiles;

    fn engine() -> PatternAnalysisEngine {
        let store = Arc::new(VariationStore::builtin().unwrap());
        PatternAnalysisEngine::new(store, &EngineConfig::default())
    }

    fn hand(ids: &[&str]) -> Vec<Tile> {
        parse_tiles(ids).unwrap()
    }

    fn facts_for(engine: &PatternAnalysisEngine, tiles: &[Tile], id: &str, ctx: &GameContext) -> PatternAnalysisFacts {
        engine
            .analyze(tiles, &[PatternId::from(id)], ctx)
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let e = engine();
        let tiles = hand(&[
            "north", "north", "north", "north", "east", "east", "east", "west", "west", "west",
            "south", "south", "south", "south",
        ]);
        let f = facts_for(&e, &tiles, "WIND-1", &GameContext::default());
        assert_eq!(f.best.tiles_matched, 14);
        assert_eq!(f.best.tiles_needed, 0);
        assert!((f.best.completion_ratio - 1.0).abs() < EPSILON);
        assert!(f.best.missing_tiles.is_empty());
        assert_eq!(f.availability.total_missing, 0);
        assert!((f.availability.availability_ratio - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_missing_tiles_are_listed_per_copy() {
        let e = engine();
        let tiles = hand(&["north", "north", "east", "west", "south"]);
        let f = facts_for(&e, &tiles, "WIND-1", &GameContext::default());
        assert_eq!(f.best.tiles_matched, 5);
        assert_eq!(f.best.tiles_needed, 9);
        let norths = f
            .best
            .missing_tiles
            .iter()
            .filter(|t| t.to_string() == "north")
            .count();
        assert_eq!(norths, 2);
    }

    #[test]
    fn test_joker_allocation_respects_eligible_positions() {
        let e = engine();
        // SP-2 (NN EW SS 2025 2025) 不接受任何 Joker
        let tiles = hand(&["north", "joker", "joker", "joker"]);
        let f = facts_for(&e, &tiles, "SP-2", &GameContext::default());
        assert_eq!(f.jokers.jokers_available, 3);
        assert_eq!(f.jokers.jokers_usable, 0);
        assert_eq!(f.jokers.jokers_to_complete, f.best.tiles_needed);
        assert!(f.jokers.allocations.is_empty());

        // WIND-1 全部位置可用 Joker
        let f = facts_for(&e, &tiles, "WIND-1", &GameContext::default());
        assert_eq!(f.jokers.jokers_usable, 3);
        assert_eq!(f.jokers.jokers_to_complete, 13 - 3);
        assert!((f.jokers.with_jokers_completion - 4.0 / 14.0).abs() < EPSILON);
        for a in &f.jokers.allocations {
            assert!(a.jokers <= a.eligible_slots);
        }
    }

    #[test]
    fn test_context_jokers_count_when_larger() {
        let e = engine();
        let tiles = hand(&["north"]);
        let ctx = GameContext {
            jokers_in_hand: 2,
            ..GameContext::default()
        };
        let f = facts_for(&e, &tiles, "WIND-1", &ctx);
        assert_eq!(f.jokers.jokers_available, 2);
    }

    #[test]
    fn test_held_tiles_fill_non_joker_positions_first() {
        use crate::game::{expand, GroupDef, GroupKind, PatternDef, SuitRole, TileValue, Wind};

        let group = |kind, value| GroupDef {
            kind,
            value,
            suit: SuitRole::None,
            jokers: None,
        };
        // FFFF FF NNNN SSSS：前四張花可用 Joker，後兩張不可
        let def = PatternDef {
            year: None,
            section: "TEST".into(),
            line: 1,
            key: "FLOWERS".into(),
            display: "FFFF FF NNNN SSSS".into(),
            description: String::new(),
            points: 25,
            difficulty: Default::default(),
            concealed: false,
            groups: vec![
                group(GroupKind::Kong, TileValue::Flower),
                group(GroupKind::Pair, TileValue::Flower),
                group(GroupKind::Kong, TileValue::Wind(Wind::North)),
                group(GroupKind::Kong, TileValue::Wind(Wind::South)),
            ],
        };
        let variation = &expand(&def, 2025).unwrap()[0];
        let result = TileMatchResult::compute(&TileCounts::from_tiles(&hand(&["f1", "f3"])), variation);

        assert_eq!(result.tiles_matched, 2);
        assert!(result.filled[4] && result.filled[5]);
        assert_eq!(result.joker_eligible_missing, 12);
        assert_eq!(result.jokers_to_complete(12), 0);
    }

    #[test]
    fn test_availability_subtracts_discards_and_exposures() {
        let e = engine();
        let tiles = hand(&["north", "north"]);
        let mut ctx = GameContext::gameplay(50);
        ctx.discards = hand(&["north"]);
        ctx.opponents.push(
            crate::service::context::OpponentProfile::new("east")
                .with_exposed(hand(&["east", "east", "east"])),
        );
        let f = facts_for(&e, &tiles, "WIND-1", &ctx);

        let north = f
            .availability
            .tiles
            .iter()
            .find(|t| t.tile.to_string() == "north")
            .unwrap();
        // 4 - 1 張棄牌；手中的兩張不扣
        assert_eq!(north.needed, 2);
        assert_eq!(north.held, 2);
        assert_eq!(north.remaining, 3);
        assert!((north.ratio - 1.0).abs() < EPSILON);

        let east = f
            .availability
            .tiles
            .iter()
            .find(|t| t.tile.to_string() == "east")
            .unwrap();
        assert_eq!(east.remaining, 1);
        assert!((east.ratio - 1.0 / 3.0).abs() < EPSILON);
        assert_eq!(f.availability.total_missing, 12);
        assert!(f.availability.availability_ratio < 1.0);
    }

    #[test]
    fn test_best_variation_tie_breaks_by_sequence() {
        let e = engine();
        let f = facts_for(&e, &[], "LIKE-1", &GameContext::default());
        assert_eq!(f.best.tiles_matched, 0);
        assert_eq!(f.best.sequence, 1);
        assert!(f.alternates.iter().all(|a| a.sequence > 1));
    }

    #[test]
    fn test_empty_hand_yields_zero_completion() {
        let e = engine();
        let ids = e.store().candidate_patterns();
        let facts = e.analyze(&[], &ids, &GameContext::default());
        assert_eq!(facts.len(), ids.len());
        for f in &facts {
            assert_eq!(f.best.tiles_matched, 0);
            assert_eq!(f.progress.best_completion, 0.0);
        }
    }

    #[test]
    fn test_unknown_patterns_are_skipped() {
        let e = engine();
        let ids = vec![PatternId::from("NOPE"), PatternId::from("WIND-1"), PatternId::from("WIND-1")];
        let facts = e.analyze(&hand(&["north"]), &ids, &GameContext::default());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].pattern_id().as_str(), "WIND-1");
    }

    #[test]
    fn test_cache_hit_returns_identical_facts() {
        let e = engine();
        let tiles = hand(&["6B", "6B", "6B", "joker", "east"]);
        let ids = e.store().candidate_patterns();
        let ctx = GameContext::default();
        let cold = e.analyze(&tiles, &ids, &ctx);
        let mut reversed = tiles.clone();
        reversed.reverse();
        let warm = e.analyze(&reversed, &ids, &ctx);
        assert_eq!(cold, warm);
        assert_eq!(e.cache_stats().hits, 1);
    }

    #[test]
    fn test_facts_pass_integrity_check() {
        let e = engine();
        let tiles = hand(&["1D", "5D", "8D", "4B", "6B", "6B", "6B", "6C", "6C", "east", "south", "white", "f1", "joker"]);
        let facts = e.analyze(&tiles, &e.store().candidate_patterns(), &GameContext::default());
        assert!(facts.is_well_formed());
    }

    #[test]
    fn test_held_copies_do_not_reduce_remaining() {
        let e = engine();
        let f = facts_for(&e, &hand(&["north", "north"]), "WIND-1", &GameContext::default());
        let north = f
            .availability
            .tiles
            .iter()
            .find(|t| t.tile.to_string() == "north")
            .unwrap();
        assert_eq!(north.needed, 2);
        assert_eq!(north.remaining, 4);
        assert!((f.availability.availability_ratio - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_panicking_pattern_is_skipped_and_batch_continues() {
        use crate::game::Suit;

        let mut store = VariationStore::builtin().unwrap();
        let wind = PatternId::from("WIND-1");
        let mut broken = store.variations(&wind).to_vec();
        // 點數 0 的牌在計數時越界
        broken[0].tiles[0] = Tile::Number {
            suit: Suit::Dots,
            rank: 0,
        };
        store.replace_variations(&wind, broken);
        let e = PatternAnalysisEngine::new(Arc::new(store), &EngineConfig::default());

        let ids = vec![PatternId::from("WIND-2"), wind, PatternId::from("LIKE-1")];
        let facts = e.analyze(&hand(&["north", "east"]), &ids, &GameContext::default());
        let analyzed: Vec<&str> = facts.iter().map(|f| f.pattern_id().as_str()).collect();
        assert_eq!(analyzed, ["WIND-2", "LIKE-1"]);
        assert!(facts.is_well_formed());
    }
}
