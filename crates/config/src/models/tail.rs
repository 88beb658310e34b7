use std::time::Duration;

use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 日志跟踪参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TailConfig {
    /// 没有新数据时的轮询间隔（秒）
    pub poll_interval_seconds: u64,
    /// 每次分页读取的字节数
    pub page_length: usize,
    /// 小于该字节数的返回视为没有新数据
    pub min_content_bytes: usize,
    /// 每个数据源以及合并输出的通道容量
    pub channel_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            page_length: 5000,
            min_content_bytes: 5,
            channel_capacity: 1,
        }
    }
}

impl TailConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl ConfigValidator for TailConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.poll_interval_seconds,
            "tail.poll_interval_seconds",
        )?;
        ValidationUtils::validate_count(self.page_length, "tail.page_length", 1024 * 1024)?;
        ValidationUtils::validate_count(self.channel_capacity, "tail.channel_capacity", 1024)?;
        ValidationUtils::validate_count(
            self.min_content_bytes,
            "tail.min_content_bytes",
            self.page_length,
        )?;
        Ok(())
    }
}

/// 读取失败时的重试策略
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// 基础重试间隔（毫秒）
    pub base_interval_ms: u64,
    /// 最大重试间隔（毫秒）
    pub max_interval_ms: u64,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
    /// 连续失败的最大重试次数
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 200,
            max_interval_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            max_retries: 10,
        }
    }
}

impl ConfigValidator for RetryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.base_interval_ms == 0 {
            return Err(crate::ConfigError::Validation(
                "retry.base_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_interval_ms < self.base_interval_ms {
            return Err(crate::ConfigError::Validation(
                "retry.max_interval_ms must not be less than retry.base_interval_ms".to_string(),
            ));
        }
        ValidationUtils::validate_range_f64(
            self.backoff_multiplier,
            "retry.backoff_multiplier",
            1.0,
            10.0,
        )?;
        ValidationUtils::validate_range_f64(self.jitter_factor, "retry.jitter_factor", 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_config_default() {
        let config = TailConfig::default();
        assert_eq!(config.page_length, 5000);
        assert_eq!(config.min_content_bytes, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tail_config_validation() {
        let mut invalid = TailConfig::default();
        invalid.poll_interval_seconds = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = TailConfig::default();
        invalid.min_content_bytes = 6000;
        assert!(invalid.validate().is_err());

        let mut invalid = TailConfig::default();
        invalid.min_content_bytes = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = TailConfig::default();
        invalid.channel_capacity = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_retry_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());

        let mut invalid = RetryConfig::default();
        invalid.max_interval_ms = 10;
        assert!(invalid.validate().is_err());

        let mut invalid = RetryConfig::default();
        invalid.jitter_factor = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = RetryConfig::default();
        invalid.backoff_multiplier = 0.5;
        assert!(invalid.validate().is_err());
    }
}
