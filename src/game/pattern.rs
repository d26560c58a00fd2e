//! 牌型定義
//!
//! NMJL 卡片上的每一行是一個具名牌型，由若干組 (group) 構成。
//! 組的種類與取值都是封閉的 enum，語料中出現未知種類會在反序列化時直接失敗，
//! 不會被默默忽略。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tiles::{Dragon, Wind};

/// 牌型識別碼（語料中的 hand key）
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub String);

impl PatternId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatternId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// 牌型難度
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// 組的種類
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Single,   // 1 張
    Pair,     // 2 張相同
    Pung,     // 3 張相同
    Kong,     // 4 張相同
    Quint,    // 5 張相同（需 Joker）
    Sequence, // 依取值展開的不同牌，如 NEWS、2025
}

impl GroupKind {
    /// 相同牌組的張數；Sequence 由取值決定
    pub fn size(self) -> Option<usize> {
        match self {
            GroupKind::Single => Some(1),
            GroupKind::Pair => Some(2),
            GroupKind::Pung => Some(3),
            GroupKind::Kong => Some(4),
            GroupKind::Quint => Some(5),
            GroupKind::Sequence => None,
        }
    }

    /// NMJL 規則：三張以上的組才能用 Joker
    pub fn allows_jokers_by_default(self) -> bool {
        self.size().map_or(false, |n| n >= 3)
    }
}

/// 組的取值
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileValue {
    /// 固定點數（需花色）
    Number(u8),
    /// 多選一點數，每個選項各自展開一個變體
    Choice(Vec<u8>),
    /// 同號：整個牌型共用一個 1..=9 的點數
    Like,
    /// 連號：起點 + 偏移
    Run(u8),
    Flower,
    Wind(Wind),
    /// NEWS 四風（僅用於 sequence）
    Winds,
    Dragon(Dragon),
    /// 三元各一（僅用於 sequence）
    Dragons,
    /// 與組花色對應的箭牌
    MatchingDragon,
    /// 逐位展開的數字串，"0" 代表白板，如 "2025"（僅用於 sequence）
    Digits(String),
}

/// 花色角色：同一變體內不同角色必為不同花色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitRole {
    #[default]
    None,
    First,
    Second,
    Third,
}

impl SuitRole {
    pub fn index(self) -> Option<usize> {
        match self {
            SuitRole::None => None,
            SuitRole::First => Some(0),
            SuitRole::Second => Some(1),
            SuitRole::Third => Some(2),
        }
    }
}

/// 牌型中的一組
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
    pub kind: GroupKind,
    pub value: TileValue,
    #[serde(default)]
    pub suit: SuitRole,
    /// 覆寫預設 Joker 規則
    #[serde(default)]
    pub jokers: Option<bool>,
}

impl GroupDef {
    pub fn jokers_allowed(&self) -> bool {
        self.jokers
            .unwrap_or_else(|| self.kind.allows_jokers_by_default())
    }
}

/// 語料中的牌型定義
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    /// 未填時沿用語料頂層年份
    #[serde(default)]
    pub year: Option<u16>,
    pub section: String,
    pub line: u16,
    pub key: String,
    pub display: String,
    #[serde(default)]
    pub description: String,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub concealed: bool,
    pub groups: Vec<GroupDef>,
}

impl PatternDef {
    pub fn id(&self) -> PatternId {
        PatternId::new(self.key.clone())
    }

    pub fn info(&self, default_year: u16) -> PatternInfo {
        PatternInfo {
            id: self.id(),
            year: self.year.unwrap_or(default_year),
            section: self.section.clone(),
            line: self.line,
            display: self.display.clone(),
            description: self.description.clone(),
            points: self.points,
            difficulty: self.difficulty,
            concealed: self.concealed,
        }
    }
}

/// 牌型的唯讀摘要（不含組定義）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatternInfo {
    pub id: PatternId,
    pub year: u16,
    pub section: String,
    pub line: u16,
    pub display: String,
    pub description: String,
    pub points: u32,
    pub difficulty: Difficulty,
    pub concealed: bool,
}

// ============================================================================
// 單元測試
// ============================================================================
