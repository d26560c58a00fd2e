//! 手牌分析流程
//!
//! 依序執行 Engine 1 → 2 → 3，合併為單一結果，並持有整個流程的結果快取
//! （與 Engine 1 的快取各自獨立）。
//!
//! 觸發規則：重新分析只取決於 `AnalysisRequest`（手牌、牌型選擇、主牌型、
//! 情境）。`AnalysisSession` 只以請求的鍵判斷是否重算，分析結果本身
//! 永遠不是輸入。

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::analysis::{PatternAnalysisEngine, PatternAnalysisFacts};
use super::cache::{CacheIntegrity, CacheStats, TtlCache};
use super::context::{analysis_key, AnalysisKey, GameContext};
use super::ranking::{PatternRanking, PatternRankingEngine};
use super::recommend::{TileAction, TileRecommendation, TileRecommendationEngine};
use super::store::VariationStore;
use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::game::{parse_tiles, PatternId, Tile, TileCounts, HAND_TILE_COUNT};

// ============================================================================
// 請求
// ============================================================================

/// 要分析的牌型
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSelection {
    /// 全部牌型，只保留完成度達門檻者
    #[default]
    All,
    Explicit(Vec<PatternId>),
}

/// 分析請求（觸發輸入）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    hand: Vec<Tile>,
    selection: PatternSelection,
    primary: Option<PatternId>,
    context: GameContext,
}

impl AnalysisRequest {
    /// 驗證手牌後建立請求
    pub fn new(hand: Vec<Tile>, context: GameContext) -> Result<Self, ValidationError> {
        validate_hand(&hand)?;
        Ok(Self {
            hand,
            selection: PatternSelection::All,
            primary: None,
            context,
        })
    }

    /// 由原始牌 ID 建立；詞彙外的 ID 在此被拒絕
    pub fn from_ids<S: AsRef<str>>(ids: &[S], context: GameContext) -> Result<Self, ValidationError> {
        Self::new(parse_tiles(ids)?, context)
    }

    /// 指定牌型；空清單等同全部牌型
    pub fn with_patterns(mut self, patterns: Vec<PatternId>) -> Self {
        self.selection = if patterns.is_empty() {
            PatternSelection::All
        } else {
            PatternSelection::Explicit(patterns)
        };
        self
    }

    pub fn with_primary(mut self, primary: PatternId) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn hand(&self) -> &[Tile] {
        &self.hand
    }

    pub fn selection(&self) -> &PatternSelection {
        &self.selection
    }

    pub fn primary(&self) -> Option<&PatternId> {
        self.primary.as_ref()
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    /// 輸入鍵：手牌與牌型不分順序
    pub fn key(&self) -> RequestKey {
        let explicit: &[PatternId] = match &self.selection {
            PatternSelection::All => &[],
            PatternSelection::Explicit(ids) => ids,
        };
        RequestKey {
            analysis: analysis_key(&self.hand, explicit, &self.context),
            all_patterns: matches!(self.selection, PatternSelection::All),
            primary: self.primary.clone(),
        }
    }
}

/// 結果快取與 session 用的完整輸入鍵
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    analysis: AnalysisKey,
    all_patterns: bool,
    primary: Option<PatternId>,
}

/// 手牌最多 14 張，且每種牌不超過實際張數
pub fn validate_hand(hand: &[Tile]) -> Result<(), ValidationError> {
    if hand.len() > HAND_TILE_COUNT {
        return Err(ValidationError::HandTooLarge(hand.len()));
    }
    let counts = TileCounts::from_tiles(hand);
    for tile in hand {
        let count = counts.get(*tile);
        let max = tile.copies_in_game();
        if count > max {
            return Err(ValidationError::TooManyCopies {
                tile: tile.to_string(),
                count,
                max,
            });
        }
    }
    Ok(())
}

// ============================================================================
// 結果
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HandAnalysis {
    /// 第一名牌型的總分；沒有任何排名時為 0
    pub overall_score: f64,
    pub top_patterns: Vec<PatternRanking>,
    /// 完成度達門檻的牌型事實
    pub viable_patterns: Vec<PatternAnalysisFacts>,
    pub tile_recommendations: Vec<TileRecommendation>,
    pub strategic_advice: Vec<String>,
    /// Engine 1 原始輸出
    pub facts: Vec<PatternAnalysisFacts>,
    pub patterns_requested: usize,
    pub patterns_analyzed: usize,
}

impl HandAnalysis {
    pub fn top_pattern(&self) -> Option<&PatternRanking> {
        self.top_patterns.first()
    }

    pub fn recommendation_for(&self, tile: Tile) -> Option<&TileRecommendation> {
        self.tile_recommendations.iter().find(|r| r.tile == tile)
    }

    pub fn passes(&self) -> impl Iterator<Item = &TileRecommendation> + '_ {
        self.tile_recommendations
            .iter()
            .filter(|r| r.action == TileAction::Pass)
    }
}

impl CacheIntegrity for HandAnalysis {
    fn is_well_formed(&self) -> bool {
        let sorted = self
            .top_patterns
            .windows(2)
            .all(|w| w[0].total_score >= w[1].total_score);
        let overall_matches = match self.top_patterns.first() {
            Some(top) => top.total_score == self.overall_score,
            None => self.overall_score == 0.0,
        };
        sorted
            && overall_matches
            && (0.0..=100.0).contains(&self.overall_score)
            && self.facts.is_well_formed()
            && self.viable_patterns.is_well_formed()
            && self.patterns_analyzed == self.facts.len()
            && self.tile_recommendations.iter().all(|r| r.confidence <= 100)
    }
}

/// 兩層快取的統計
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineCacheStats {
    pub analysis: CacheStats,
    pub result: CacheStats,
}

// ============================================================================
// HandAnalyzer
// ============================================================================

pub struct HandAnalyzer {
    config: EngineConfig,
    store: Arc<VariationStore>,
    analysis: PatternAnalysisEngine,
    ranking: PatternRankingEngine,
    recommend: TileRecommendationEngine,
    cache: TtlCache<RequestKey, HandAnalysis>,
}

impl HandAnalyzer {
    pub fn new(store: Arc<VariationStore>, config: EngineConfig) -> Self {
        info!(
            patterns = store.len(),
            variations = store.variation_count(),
            ttl_secs = config.cache_ttl_secs,
            "hand analyzer ready"
        );
        Self {
            analysis: PatternAnalysisEngine::new(store.clone(), &config),
            ranking: PatternRankingEngine::new(&config),
            recommend: TileRecommendationEngine::new(&config),
            cache: TtlCache::new("hand_analysis", config.cache_ttl(), config.cache_max_entries),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<VariationStore> {
        &self.store
    }

    pub fn cache_stats(&self) -> PipelineCacheStats {
        PipelineCacheStats {
            analysis: self.analysis.cache_stats(),
            result: self.cache.stats(),
        }
    }

    pub fn clear_caches(&self) {
        self.analysis.clear_cache();
        self.cache.clear();
    }

    /// 完整分析（讀穿式結果快取）
    pub fn analyze(&self, request: &AnalysisRequest) -> HandAnalysis {
        self.cache
            .get_or_insert_with(request.key(), || self.run_pipeline(request))
    }

    fn run_pipeline(&self, request: &AnalysisRequest) -> HandAnalysis {
        let started = Instant::now();
        let hand = request.hand();
        let context = request.context();

        let patterns = match request.selection() {
            PatternSelection::All => self.store.candidate_patterns(),
            PatternSelection::Explicit(ids) => ids.clone(),
        };

        let facts = self.analysis.analyze(hand, &patterns, context);
        if facts.is_empty() && !patterns.is_empty() {
            warn!(requested = patterns.len(), "no pattern facts available, results degraded");
        }

        let viable_patterns: Vec<PatternAnalysisFacts> = facts
            .iter()
            .filter(|f| f.progress.best_completion >= self.config.viability_floor)
            .cloned()
            .collect();

        // 全部牌型模式只排名可行牌型；一個都沒有時退回全部
        let rank_input: &[PatternAnalysisFacts] = match request.selection() {
            PatternSelection::All if !viable_patterns.is_empty() => &viable_patterns,
            _ => &facts,
        };
        let ranked = {
            let reference = self.primary_facts(hand, request.primary(), &facts, context);
            self.ranking
                .rank_within(rank_input, &reference, request.primary())
        };
        let tile_recommendations = self.recommend.recommend(hand, &ranked, context);

        let strategic_advice = strategic_advice(hand, context, &ranked, &facts, &tile_recommendations);
        let overall_score = ranked.first().map(|r| r.total_score).unwrap_or(0.0);
        let top_patterns: Vec<PatternRanking> =
            ranked.into_iter().take(self.config.top_patterns).collect();

        debug!(
            hand = hand.len(),
            context = context.fingerprint(),
            analyzed = facts.len(),
            viable = viable_patterns.len(),
            overall_score,
            elapsed_us = started.elapsed().as_micros() as u64,
            "hand analysis pipeline complete"
        );

        HandAnalysis {
            overall_score,
            top_patterns,
            viable_patterns,
            tile_recommendations,
            strategic_advice,
            patterns_requested: patterns.len(),
            patterns_analyzed: facts.len(),
            facts,
        }
    }

    /// 切換判斷用的事實集合：主牌型不在本次分析範圍時另外分析它
    fn primary_facts<'a>(
        &self,
        hand: &[Tile],
        primary: Option<&PatternId>,
        facts: &'a [PatternAnalysisFacts],
        context: &GameContext,
    ) -> Cow<'a, [PatternAnalysisFacts]> {
        match primary {
            Some(id) if self.store.contains(id) && !facts.iter().any(|f| f.pattern_id() == id) => {
                Cow::Owned(self.analysis.analyze(hand, std::slice::from_ref(id), context))
            }
            _ => Cow::Borrowed(facts),
        }
    }
}

/// 由排名與建議整理出的文字建議
fn strategic_advice(
    hand: &[Tile],
    context: &GameContext,
    ranked: &[PatternRanking],
    facts: &[PatternAnalysisFacts],
    recommendations: &[TileRecommendation],
) -> Vec<String> {
    let mut advice = Vec::new();

    let Some(top) = ranked.first() else {
        if !hand.is_empty() {
            advice.push("No pattern analysis available; hold jokers and pairs".to_string());
        }
        return advice;
    };

    advice.push(format!(
        "Focus on {} ({}): {}/14 tiles, {} at {:.1}",
        top.pattern.id,
        top.pattern.display,
        top.best.tiles_matched,
        top.tier.as_str(),
        top.total_score
    ));

    if let Some(switch) = top.switch.as_ref().filter(|s| s.should_switch) {
        advice.push(format!(
            "Consider switching from {} to {} (+{:.1})",
            switch.current, switch.suggested, switch.score_delta
        ));
    }

    let jokers = context
        .jokers_in_hand
        .max(TileCounts::from_tiles(hand).get(Tile::Joker));
    if jokers > 0 {
        advice.push(format!(
            "{jokers} joker(s) in hand; save them for pungs, kongs and quints"
        ));
    }

    if let Some(top_facts) = facts.iter().find(|f| f.pattern_id() == top.pattern_id()) {
        let dead: Vec<String> = top_facts
            .availability
            .tiles
            .iter()
            .filter(|t| t.remaining == 0)
            .map(|t| t.tile.to_string())
            .collect();
        if !dead.is_empty() {
            advice.push(format!(
                "No copies of {} left for {}",
                dead.join(", "),
                top.pattern.id
            ));
        } else if top_facts.availability.availability_ratio < 0.5 {
            advice.push(format!(
                "Tiles for {} are running short ({:.0}% still available)",
                top.pattern.id,
                top_facts.availability.availability_ratio * 100.0
            ));
        }
    }

    if top.pattern.concealed {
        advice.push(format!(
            "{} is concealed; do not call tiles for exposures",
            top.pattern.id
        ));
    }

    if context.is_charleston() {
        let passes: Vec<String> = recommendations
            .iter()
            .filter(|r| r.action == TileAction::Pass)
            .map(|r| r.tile.to_string())
            .collect();
        if !passes.is_empty() {
            advice.push(format!("Pass {}", passes.join(", ")));
        }
    }

    advice
}

// ============================================================================
// AnalysisSession
// ============================================================================

/// 持有上一次的輸入鍵與結果；只有輸入改變時才重算
pub struct AnalysisSession {
    analyzer: Arc<HandAnalyzer>,
    last_key: Option<RequestKey>,
    last: Option<HandAnalysis>,
    runs: usize,
}

impl AnalysisSession {
    pub fn new(analyzer: Arc<HandAnalyzer>) -> Self {
        Self {
            analyzer,
            last_key: None,
            last: None,
            runs: 0,
        }
    }

    pub fn update(&mut self, request: &AnalysisRequest) -> &HandAnalysis {
        let key = request.key();
        if self.last_key.as_ref() != Some(&key) {
            self.last = None;
            self.last_key = Some(key);
        }
        let analyzer = &self.analyzer;
        let runs = &mut self.runs;
        self.last.get_or_insert_with(|| {
            *runs += 1;
            analyzer.analyze(request)
        })
    }

    pub fn current(&self) -> Option<&HandAnalysis> {
        self.last.as_ref()
    }

    /// 實際觸發 pipeline 的次數
    pub fn runs(&self) -> usize {
        self.runs
    }
}

// ============================================================================
// 單元測試
// ============================================================================
