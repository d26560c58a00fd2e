//! 對局情境
//!
//! 由外部提供、每次分析唯讀的輸入：階段、手中 Joker 數、牌牆剩餘、
//! 棄牌紀錄與各對手的明牌/棄牌快照。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::game::{PatternId, Tile, TileCounts};

/// 對局階段
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Charleston,
    #[default]
    Gameplay,
}

/// 對手快照（由外部協作者產生）
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub name: String,
    /// 已亮出的牌組
    #[serde(default)]
    pub exposed_sets: Vec<Vec<Tile>>,
    #[serde(default)]
    pub discards: Vec<Tile>,
}

impl OpponentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_exposed(mut self, set: Vec<Tile>) -> Self {
        self.exposed_sets.push(set);
        self
    }

    pub fn with_discards(mut self, tiles: Vec<Tile>) -> Self {
        self.discards.extend(tiles);
        self
    }

    pub fn exposed_tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.exposed_sets.iter().flatten()
    }
}

/// 分析情境
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameContext {
    pub phase: GamePhase,
    pub jokers_in_hand: u8,
    pub wall_remaining: u16,
    /// 全桌棄牌紀錄
    #[serde(default)]
    pub discards: Vec<Tile>,
    #[serde(default)]
    pub opponents: Vec<OpponentProfile>,
}

impl GameContext {
    pub fn charleston() -> Self {
        Self {
            phase: GamePhase::Charleston,
            ..Self::default()
        }
    }

    pub fn gameplay(wall_remaining: u16) -> Self {
        Self {
            phase: GamePhase::Gameplay,
            wall_remaining,
            ..Self::default()
        }
    }

    pub fn is_charleston(&self) -> bool {
        self.phase == GamePhase::Charleston
    }

    pub fn discard_counts(&self) -> TileCounts {
        TileCounts::from_tiles(&self.discards)
    }

    /// 所有對手的明牌
    pub fn exposed_counts(&self) -> TileCounts {
        TileCounts::from_tiles(self.opponents.iter().flat_map(|o| o.exposed_tiles()))
    }

    /// 已不可取得的牌：棄牌加上對手明牌
    pub fn visible_counts(&self) -> TileCounts {
        let mut counts = self.discard_counts();
        for opponent in &self.opponents {
            for tile in opponent.exposed_tiles() {
                counts.add(*tile);
            }
        }
        counts
    }

    /// 快取鍵用的正規化情境
    ///
    /// 棄牌、每個對手的明牌組與棄牌先排序，相同內容不同順序得到相同的鍵。
    /// 對手名稱與座位順序會出現在風險標註中，保留原樣。
    pub fn key(&self) -> ContextKey {
        let mut discards = self.discards.clone();
        discards.sort_unstable();

        let opponents = self
            .opponents
            .iter()
            .map(|o| {
                let mut exposed_sets: Vec<Vec<Tile>> = o
                    .exposed_sets
                    .iter()
                    .map(|set| {
                        let mut set = set.clone();
                        set.sort_unstable();
                        set
                    })
                    .collect();
                exposed_sets.sort_unstable();
                let mut discards = o.discards.clone();
                discards.sort_unstable();
                OpponentProfile {
                    name: o.name.clone(),
                    exposed_sets,
                    discards,
                }
            })
            .collect();

        ContextKey {
            phase: self.phase,
            jokers_in_hand: self.jokers_in_hand,
            wall_remaining: self.wall_remaining,
            discards,
            opponents,
        }
    }

    /// 情境鍵的 64 位元摘要（供日誌使用）
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.key().hash(&mut hasher);
        hasher.finish()
    }
}

/// 正規化後的情境，作為快取鍵的一部分
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey {
    phase: GamePhase,
    jokers_in_hand: u8,
    wall_remaining: u16,
    discards: Vec<Tile>,
    opponents: Vec<OpponentProfile>,
}

/// Engine 1 快取鍵：排序後的手牌、排序去重的牌型 ID 與正規化情境
///
/// 保存完整輸入而非摘要，雜湊碰撞不會讓不同輸入共用結果。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    hand: Vec<Tile>,
    patterns: Vec<PatternId>,
    context: ContextKey,
}

pub fn analysis_key(hand: &[Tile], patterns: &[PatternId], context: &GameContext) -> AnalysisKey {
    let mut tiles = hand.to_vec();
    tiles.sort_unstable();
    let mut ids = patterns.to_vec();
    ids.sort_unstable();
    ids.dedup();

    AnalysisKey {
        hand: tiles,
        patterns: ids,
        context: context.key(),
    }
}

// ============================================================================
// 單元測試
// ============================================================================
