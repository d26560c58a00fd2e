//! 牌型變體庫
//!
//! 載入一次、之後唯讀，可在任意數量的並行分析間共享。
//! 語料缺失或格式錯誤時在載入階段直接失敗。

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::error::CorpusError;
use crate::game::{expand, PatternDef, PatternId, PatternInfo, PatternVariation};

/// 內建 2025 卡片語料
const BUILTIN_CORPUS: &str = include_str!("../../data/nmjl-card-2025.json");

#[derive(Deserialize)]
struct CorpusFile {
    year: u16,
    patterns: Vec<PatternDef>,
}

/// 唯讀的牌型變體庫
#[derive(Debug)]
pub struct VariationStore {
    year: u16,
    patterns: Vec<PatternInfo>,
    index: HashMap<PatternId, usize>,
    variations: Vec<Vec<PatternVariation>>,
}

impl VariationStore {
    /// 載入內建語料
    pub fn builtin() -> Result<Self, CorpusError> {
        Self::from_json(BUILTIN_CORPUS)
    }

    /// 非同步讀取外部語料檔
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let file: CorpusFile = serde_json::from_str(json)?;
        Self::from_defs(file.year, file.patterns)
    }

    /// 由牌型定義建立（並行展開，結果順序與定義順序一致）
    pub fn from_defs(year: u16, defs: Vec<PatternDef>) -> Result<Self, CorpusError> {
        if defs.is_empty() {
            return Err(CorpusError::Empty);
        }

        let mut keys = HashSet::new();
        for def in &defs {
            if !keys.insert(def.key.as_str()) {
                return Err(CorpusError::DuplicatePattern(def.key.clone()));
            }
        }

        let variations: Vec<Vec<PatternVariation>> = defs
            .par_iter()
            .map(|def| expand(def, year))
            .collect::<Result<_, _>>()?;

        let patterns: Vec<PatternInfo> = defs.iter().map(|def| def.info(year)).collect();
        let index = patterns
            .iter()
            .enumerate()
            .map(|(i, info)| (info.id.clone(), i))
            .collect();

        let store = Self {
            year,
            patterns,
            index,
            variations,
        };
        info!(
            year,
            patterns = store.len(),
            variations = store.variation_count(),
            "pattern corpus loaded"
        );
        Ok(store)
    }

    /// 某牌型的所有變體；未知牌型回傳空切片
    pub fn variations(&self, id: &PatternId) -> &[PatternVariation] {
        self.index
            .get(id)
            .map(|&i| self.variations[i].as_slice())
            .unwrap_or(&[])
    }

    /// 所有候選牌型（依語料順序）
    pub fn candidate_patterns(&self) -> Vec<PatternId> {
        self.patterns.iter().map(|p| p.id.clone()).collect()
    }

    pub fn pattern_info(&self, id: &PatternId) -> Option<&PatternInfo> {
        self.index.get(id).map(|&i| &self.patterns[i])
    }

    pub fn patterns(&self) -> &[PatternInfo] {
        &self.patterns
    }

    pub fn contains(&self, id: &PatternId) -> bool {
        self.index.contains_key(id)
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    /// 牌型數
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn variation_count(&self) -> usize {
        self.variations.iter().map(Vec::len).sum()
    }

    /// 直接替換某牌型的變體（測試注入損壞資料用）
    #[cfg(test)]
    pub(crate) fn replace_variations(&mut self, id: &PatternId, variations: Vec<PatternVariation>) {
        if let Some(&i) = self.index.get(id) {
            self.variations[i] = variations;
        }
    }
}

// ============================================================================
// 單元測試
// ============================================================================
