//! 遊戲常量定義

// ============================================================================
// 牌組常量
// ============================================================================

pub const HAND_TILE_COUNT: usize = 14;   // 一副完整牌型固定 14 張
pub const TILE_KIND_COUNT: usize = 36;   // 27 數牌 + 4 風 + 3 箭 + 花 + Joker
pub const NUMBER_KIND_COUNT: usize = 27; // 三門花色 x 1..=9
pub const COPIES_PER_TILE: u8 = 4;       // 數牌、風牌、箭牌各 4 張
pub const FLOWER_COPIES: u8 = 8;         // 花牌共 8 張（f1..f4 可互換）
pub const JOKER_COPIES: u8 = 8;          // Joker 共 8 張
pub const FULL_SET_SIZE: usize = 152;    // NMJL 標準牌組總數

// 各類牌在 kind index 中的起點
pub const WIND_KIND_START: usize = NUMBER_KIND_COUNT;
pub const DRAGON_KIND_START: usize = 31;
pub const FLOWER_KIND: usize = 34;
pub const JOKER_KIND: usize = 35;

// ============================================================================
// Engine 2 計分常量
// ============================================================================

pub const CURRENT_TILE_SCORE_MAX: f64 = 40.0;
pub const AVAILABILITY_SCORE_MAX: f64 = 50.0;
pub const PRIORITY_SCORE_MAX: f64 = 10.0;
pub const PRIORITY_SCORE_BASE: f64 = 5.0;

// 推薦等級門檻（totalScore）
pub const TIER_EXCELLENT: f64 = 80.0;
pub const TIER_GOOD: f64 = 65.0;
pub const TIER_FAIR: f64 = 45.0;
pub const TIER_POOR: f64 = 25.0;

// ============================================================================
// Engine 3 信心值 / 優先級
// ============================================================================

pub const JOKER_CONFIDENCE: u8 = 95;
pub const JOKER_PRIORITY: u8 = 10;
pub const COMPLETE_SET_CONFIDENCE: u8 = 95;
pub const COMPLETE_SET_PRIORITY: u8 = 9;
pub const TIER1_CONFIDENCE: u8 = 90;
pub const TIER1_PRIORITY: u8 = 9;
pub const TIER2_CONFIDENCE: u8 = 80;
pub const TIER2_PRIORITY: u8 = 7;
pub const TIER3_CONFIDENCE: u8 = 65;
pub const TIER3_PRIORITY: u8 = 6;
pub const FALLBACK_CONFIDENCE: u8 = 55;
pub const NEUTRAL_CONFIDENCE: u8 = 50;
pub const COMPLETE_SET_SIZE: u8 = 3;
