//! 完整牌組與發牌

use rand::seq::SliceRandom;
use rand::Rng;

use super::constants::{FULL_SET_SIZE, JOKER_COPIES};
use super::tiles::{Dragon, Suit, Tile, Wind};

/// 建立 NMJL 標準 152 張牌組
pub fn full_tile_set() -> Vec<Tile> {
    let mut set = Vec::with_capacity(FULL_SET_SIZE);
    for suit in Suit::all() {
        for rank in 1..=9 {
            set.extend([Tile::number(*suit, rank); 4]);
        }
    }
    for wind in Wind::all() {
        set.extend([Tile::Wind(*wind); 4]);
    }
    for dragon in Dragon::all() {
        set.extend([Tile::Dragon(*dragon); 4]);
    }
    // 花牌 f1..f4 各 2 張
    for n in 1..=4 {
        set.extend([Tile::Flower(n); 2]);
    }
    set.extend(std::iter::repeat(Tile::Joker).take(JOKER_COPIES as usize));
    set
}

/// 洗牌後發出 `count` 張（上限為整副牌）
pub fn deal_hand<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Tile> {
    let mut wall = full_tile_set();
    wall.shuffle(rng);
    wall.truncate(count.min(FULL_SET_SIZE));
    wall
}

// ============================================================================
// 單元測試
// ============================================================================
