//! 系统设置字典

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 系统设置键
pub mod keys {
    /// 分销模式
    pub const DISTRIBUTION_TYPE: &str = "DistributionType";
    /// 成为分销商的条件类型
    pub const DISTRIBUTION_CONDITION: &str = "DistributionCondition";
    /// 消费金额条件的门槛
    pub const DISTRIBUTION_MONEY: &str = "DistributionMoney";
}

/// 单个设置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// 设置快照，每次处理消息时重新加载
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDictionary {
    entries: HashMap<String, ConfigEntry>,
}

impl ConfigDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.entries.insert(
            key.clone(),
            ConfigEntry {
                key,
                value: value.into(),
            },
        );
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    /// 读取整数设置，缺失或无法解析时返回默认值
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_int() {
        let config = ConfigDictionary::new()
            .with(keys::DISTRIBUTION_TYPE, " 3 ")
            .with(keys::DISTRIBUTION_CONDITION, "abc");

        assert_eq!(config.get_int(keys::DISTRIBUTION_TYPE, 0), 3);
        assert_eq!(config.get_int(keys::DISTRIBUTION_CONDITION, 0), 0);
        assert_eq!(config.get_int(keys::DISTRIBUTION_MONEY, 7), 7);
        assert_eq!(config.len(), 2);
    }
}
