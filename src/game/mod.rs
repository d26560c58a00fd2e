//! 遊戲核心模組
//!
//! 包含 American Mahjong (NMJL) 的靜態定義：
//! - `constants`: 牌數、計分範圍與門檻常量
//! - `tiles`: 牌、花色、風、箭與計數多重集合
//! - `pattern`: 牌型與組定義（封閉 enum）
//! - `variation`: 牌型展開為具體 14 張變體
//! - `wall`: 完整牌組與發牌

pub mod constants;
pub mod pattern;
pub mod tiles;
pub mod variation;
pub mod wall;

pub use constants::*;
pub use pattern::{
    Difficulty, GroupDef, GroupKind, PatternDef, PatternId, PatternInfo, SuitRole, TileValue,
};
pub use tiles::{parse_tiles, Dragon, Suit, Tile, TileCounts, Wind};
pub use variation::{expand, PatternVariation};
pub use wall::{deal_hand, full_tile_set};
