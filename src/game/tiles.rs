//! 麻將牌定義
//!
//! 牌 ID 詞彙固定：`1D`..`9D`、`1B`..`9B`、`1C`..`9C`、四風
//! (`east` `south` `west` `north`)、三元 (`red` `green` `white`)、
//! 花牌 `f1`..`f4` 與 `joker`。

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::constants::{
    COPIES_PER_TILE, DRAGON_KIND_START, FLOWER_COPIES, FLOWER_KIND, JOKER_COPIES, JOKER_KIND,
    TILE_KIND_COUNT, WIND_KIND_START,
};
use crate::error::TileParseError;

/// 數牌花色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Dots,  // 筒 (D)
    Bams,  // 條 (B)
    Craks, // 萬 (C)
}

impl Suit {
    pub fn to_int(self) -> usize {
        match self {
            Suit::Dots => 0,
            Suit::Bams => 1,
            Suit::Craks => 2,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Suit::Dots => 'D',
            Suit::Bams => 'B',
            Suit::Craks => 'C',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'D' => Some(Suit::Dots),
            'B' => Some(Suit::Bams),
            'C' => Some(Suit::Craks),
            _ => None,
        }
    }

    pub fn all() -> &'static [Suit] {
        &[Suit::Dots, Suit::Bams, Suit::Craks]
    }
}

/// 風牌
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wind {
    East,
    South,
    West,
    North,
}

impl Wind {
    pub fn to_int(self) -> usize {
        match self {
            Wind::East => 0,
            Wind::South => 1,
            Wind::West => 2,
            Wind::North => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Wind::East => "east",
            Wind::South => "south",
            Wind::West => "west",
            Wind::North => "north",
        }
    }

    pub fn all() -> &'static [Wind] {
        &[Wind::East, Wind::South, Wind::West, Wind::North]
    }
}

/// 三元牌
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dragon {
    Red,
    Green,
    White, // 白板，年份牌型中的 "0"
}

impl Dragon {
    pub fn to_int(self) -> usize {
        match self {
            Dragon::Red => 0,
            Dragon::Green => 1,
            Dragon::White => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dragon::Red => "red",
            Dragon::Green => "green",
            Dragon::White => "white",
        }
    }

    pub fn all() -> &'static [Dragon] {
        &[Dragon::Red, Dragon::Green, Dragon::White]
    }

    /// 與花色對應的箭牌：筒配白、條配發、萬配中
    pub fn matching(suit: Suit) -> Self {
        match suit {
            Suit::Dots => Dragon::White,
            Suit::Bams => Dragon::Green,
            Suit::Craks => Dragon::Red,
        }
    }
}

/// 單張牌
///
/// 排序依變體順序：數牌（花色優先，再按點數）、風、箭、花、Joker。
/// Charleston 補足傳牌時以此順序作為同優先級的決勝規則。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tile {
    Number { suit: Suit, rank: u8 }, // rank: 1..=9
    Wind(Wind),
    Dragon(Dragon),
    Flower(u8), // 1..=4，比對時視為同一種
    Joker,
}

impl Tile {
    pub const JOKER: Tile = Tile::Joker;
    pub const FLOWER: Tile = Tile::Flower(1);

    pub const fn number(suit: Suit, rank: u8) -> Self {
        Tile::Number { suit, rank }
    }

    pub fn is_joker(self) -> bool {
        self == Tile::Joker
    }

    pub fn is_flower(self) -> bool {
        matches!(self, Tile::Flower(_))
    }

    pub fn suit(self) -> Option<Suit> {
        match self {
            Tile::Number { suit, .. } => Some(suit),
            _ => None,
        }
    }

    pub fn rank(self) -> Option<u8> {
        match self {
            Tile::Number { rank, .. } => Some(rank),
            _ => None,
        }
    }

    /// 比對用的種類索引 (0..36)
    ///
    /// 所有花牌共用同一索引。
    pub fn kind_index(self) -> usize {
        match self {
            Tile::Number { suit, rank } => suit.to_int() * 9 + (rank as usize - 1),
            Tile::Wind(w) => WIND_KIND_START + w.to_int(),
            Tile::Dragon(d) => DRAGON_KIND_START + d.to_int(),
            Tile::Flower(_) => FLOWER_KIND,
            Tile::Joker => JOKER_KIND,
        }
    }

    /// 由種類索引還原代表牌（花牌還原為 `f1`）
    pub fn from_kind_index(idx: usize) -> Option<Self> {
        match idx {
            0..=26 => Some(Tile::number(Suit::all()[idx / 9], (idx % 9) as u8 + 1)),
            27..=30 => Some(Tile::Wind(Wind::all()[idx - WIND_KIND_START])),
            31..=33 => Some(Tile::Dragon(Dragon::all()[idx - DRAGON_KIND_START])),
            FLOWER_KIND => Some(Tile::FLOWER),
            JOKER_KIND => Some(Tile::Joker),
            _ => None,
        }
    }

    /// 同種類牌（花牌互通）
    pub fn same_kind(self, other: Tile) -> bool {
        self.kind_index() == other.kind_index()
    }

    /// 整副牌中此種類的張數
    pub fn copies_in_game(self) -> u8 {
        match self {
            Tile::Flower(_) => FLOWER_COPIES,
            Tile::Joker => JOKER_COPIES,
            _ => COPIES_PER_TILE,
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tile::Number { suit, rank } => write!(f, "{}{}", rank, suit.letter()),
            Tile::Wind(w) => f.write_str(w.name()),
            Tile::Dragon(d) => f.write_str(d.name()),
            Tile::Flower(n) => write!(f, "f{}", n),
            Tile::Joker => f.write_str("joker"),
        }
    }
}

impl FromStr for Tile {
    type Err = TileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim();
        let err = || TileParseError(s.to_string());

        let lower = id.to_ascii_lowercase();
        let named = match lower.as_str() {
            "joker" => Some(Tile::Joker),
            "east" => Some(Tile::Wind(Wind::East)),
            "south" => Some(Tile::Wind(Wind::South)),
            "west" => Some(Tile::Wind(Wind::West)),
            "north" => Some(Tile::Wind(Wind::North)),
            "red" => Some(Tile::Dragon(Dragon::Red)),
            "green" => Some(Tile::Dragon(Dragon::Green)),
            "white" => Some(Tile::Dragon(Dragon::White)),
            "f1" => Some(Tile::Flower(1)),
            "f2" => Some(Tile::Flower(2)),
            "f3" => Some(Tile::Flower(3)),
            "f4" => Some(Tile::Flower(4)),
            _ => None,
        };
        if let Some(tile) = named {
            return Ok(tile);
        }

        // 數牌: "<1-9><D|B|C>"
        let mut chars = id.chars();
        let (Some(digit), Some(letter), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(err());
        };
        let rank = digit.to_digit(10).filter(|r| (1..=9).contains(r)).ok_or_else(err)? as u8;
        let suit = Suit::from_letter(letter).ok_or_else(err)?;
        Ok(Tile::number(suit, rank))
    }
}

impl Serialize for Tile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        id.parse().map_err(de::Error::custom)
    }
}

/// 解析一組牌 ID，遇到第一個非法 ID 即失敗
pub fn parse_tiles<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Tile>, TileParseError> {
    ids.iter().map(|id| id.as_ref().parse()).collect()
}

// ============================================================================
// TileCounts - 以種類索引計數的多重集合
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCounts([u8; TILE_KIND_COUNT]);

impl Default for TileCounts {
    fn default() -> Self {
        Self([0; TILE_KIND_COUNT])
    }
}

impl TileCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tiles<'a, I>(tiles: I) -> Self
    where
        I: IntoIterator<Item = &'a Tile>,
    {
        let mut counts = Self::new();
        for tile in tiles {
            counts.add(*tile);
        }
        counts
    }

    pub fn add(&mut self, tile: Tile) {
        let slot = &mut self.0[tile.kind_index()];
        *slot = slot.saturating_add(1);
    }

    /// 移除一張；不存在時回傳 false
    pub fn remove(&mut self, tile: Tile) -> bool {
        let slot = &mut self.0[tile.kind_index()];
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub fn get(&self, tile: Tile) -> u8 {
        self.0[tile.kind_index()]
    }

    pub fn get_kind(&self, kind: usize) -> u8 {
        self.0.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|&c| c as usize).sum()
    }

    /// 非零種類 (kind index, count)
    pub fn iter(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(k, c)| (k, *c))
    }
}

// ============================================================================
// 單元測試
// ============================================================================
