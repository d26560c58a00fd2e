//! NMJL American Mahjong 手牌分析引擎
//!
//! - `game`: 牌、牌型定義與變體展開等靜態資料
//! - `service`: 變體庫、快取與三個分析引擎
//! - `config` / `error`: 設定與錯誤類型

pub mod config;
pub mod error;
pub mod game;
pub mod service;

pub use config::EngineConfig;
pub use error::{CorpusError, TileParseError, ValidationError};
pub use service::{AnalysisRequest, AnalysisSession, GameContext, HandAnalysis, HandAnalyzer, VariationStore};
