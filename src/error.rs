//! 錯誤類型
//!
//! - `TileParseError`: 牌 ID 不在固定詞彙內
//! - `CorpusError`: 牌型語料缺失或格式錯誤（載入時即失敗）
//! - `ValidationError`: 分析請求在進入 pipeline 前被拒絕

use thiserror::Error;

/// 無法解析的牌 ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tile id: {0:?}")]
pub struct TileParseError(pub String);

/// 語料載入錯誤
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed corpus json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corpus contains no patterns")]
    Empty,

    #[error("duplicate pattern key {0}")]
    DuplicatePattern(String),

    #[error("pattern {pattern}, group {group}: {reason}")]
    InvalidGroup {
        pattern: String,
        group: usize,
        reason: String,
    },

    #[error("pattern {pattern} expands to {count} tiles, expected 14")]
    TileCount { pattern: String, count: usize },
}

/// 輸入驗證錯誤
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Tile(#[from] TileParseError),

    #[error("hand has {0} tiles, at most 14 allowed")]
    HandTooLarge(usize),

    #[error("hand holds {count} copies of {tile}, only {max} exist")]
    TooManyCopies { tile: String, count: u8, max: u8 },
}
