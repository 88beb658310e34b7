use std::time::Duration;

use mesoslog_config::RetryConfig;

/// 指数退避 + 随机抖动，带最大重试次数
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 连续失败 `failures` 次之后是否还允许重试
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.config.max_retries
    }

    /// 第 `attempt` 次重试（从 0 开始）之前的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_interval = self.config.base_interval_ms as f64;
        let max_interval = self.config.max_interval_ms as f64;
        let multiplier = self.config.backoff_multiplier;
        let jitter_factor = self.config.jitter_factor;

        // 计算指数退避间隔
        let exponential_interval = base_interval * multiplier.powi(attempt.min(64) as i32);

        // 限制最大间隔
        let capped_interval = exponential_interval.min(max_interval);

        // 添加随机抖动以避免多个跟踪任务同时重试
        let jitter = capped_interval * jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        // 上下限颠倒时以上限为准，不能 panic
        let final_interval = (capped_interval + jitter)
            .max(base_interval)
            .min(max_interval);

        Duration::from_millis(final_interval as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter_factor: f64) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            base_interval_ms: 100,
            max_interval_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter_factor,
            max_retries: 3,
        })
    }

    #[test]
    fn test_exponential_delay_without_jitter() {
        let policy = policy(0.0);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        // 超过上限后保持最大间隔
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = policy(0.5);
        for attempt in 0..6 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= Duration::from_millis(100), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_000), "{delay:?}");
        }
    }

    #[test]
    fn test_inverted_bounds_fall_back_to_max_interval() {
        let policy = RetryPolicy::new(RetryConfig {
            base_interval_ms: 500,
            max_interval_ms: 100,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
            max_retries: 3,
        });
        for attempt in 0..4 {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_retry_budget() {
        let policy = policy(0.0);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }
}
