//! 引擎設定
//!
//! 預設值可由 `NMJL_*` 環境變數或 JSON 文件覆寫。

use std::time::Duration;

use serde::Deserialize;

/// 分析引擎設定
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 快取存活秒數（Engine 1 與 orchestrator 共用）
    pub cache_ttl_secs: u64,
    /// 每個快取的最大項目數，超過時淘汰最舊項目
    pub cache_max_entries: usize,
    /// 完成度低於此值的牌型不列入可行分析
    pub viability_floor: f64,
    /// 替代牌型需超過目前主牌型分數的比例才建議切換
    pub switch_margin: f64,
    /// 結果中保留的推薦牌型數
    pub top_patterns: usize,
    /// 每個牌型保留的次佳變體數（Tier 2 使用）
    pub alternate_variations: usize,
    /// Tier 3 檢查的後續牌型數
    pub tier3_depth: usize,
    /// 對手風險標註門檻
    pub risk_threshold: f64,
    /// Charleston 每輪需傳出的張數
    pub charleston_pass_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            viability_floor: 0.4,
            switch_margin: 0.15,
            top_patterns: 5,
            alternate_variations: 4,
            tier3_depth: 3,
            risk_threshold: 0.5,
            charleston_pass_count: 3,
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// 從 JSON 文件解析，缺少的欄位使用預設值
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 以環境變數覆寫預設值；無法解析的值沿用預設
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|s| s.trim().parse().ok())
        }

        if let Some(v) = parsed(lookup("NMJL_CACHE_TTL_SECS")) {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = parsed(lookup("NMJL_CACHE_MAX_ENTRIES")) {
            self.cache_max_entries = v;
        }
        if let Some(v) = parsed::<f64>(lookup("NMJL_VIABILITY_FLOOR")) {
            self.viability_floor = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed::<f64>(lookup("NMJL_SWITCH_MARGIN")) {
            self.switch_margin = v.max(0.0);
        }
        if let Some(v) = parsed(lookup("NMJL_TOP_PATTERNS")) {
            self.top_patterns = v;
        }
        if let Some(v) = parsed(lookup("NMJL_ALTERNATE_VARIATIONS")) {
            self.alternate_variations = v;
        }
        if let Some(v) = parsed(lookup("NMJL_TIER3_DEPTH")) {
            self.tier3_depth = v;
        }
        if let Some(v) = parsed::<f64>(lookup("NMJL_RISK_THRESHOLD")) {
            self.risk_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed(lookup("NMJL_CHARLESTON_PASS_COUNT")) {
            self.charleston_pass_count = v;
        }
    }
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.charleston_pass_count, 3);
        assert!((config.viability_floor - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"top_patterns": 3, "switch_margin": 0.25}"#).unwrap();
        assert_eq!(config.top_patterns, 3);
        assert!((config.switch_margin - 0.25).abs() < 1e-9);
        assert_eq!(config.cache_max_entries, 256);
    }

    #[test]
    fn test_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("NMJL_CACHE_TTL_SECS", "60"),
            ("NMJL_TOP_PATTERNS", "many"),
            ("NMJL_VIABILITY_FLOOR", "1.7"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.top_patterns, 5);
        assert!((config.viability_floor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overrides_cover_engine_depths() {
        let vars: HashMap<&str, &str> = [
            ("NMJL_ALTERNATE_VARIATIONS", "6"),
            ("NMJL_TIER3_DEPTH", "2"),
            ("NMJL_CHARLESTON_PASS_COUNT", " 2 "),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.alternate_variations, 6);
        assert_eq!(config.tier3_depth, 2);
        assert_eq!(config.charleston_pass_count, 2);
        assert_eq!(config.top_patterns, 5);
    }
}
