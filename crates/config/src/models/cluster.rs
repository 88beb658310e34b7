use std::time::Duration;

use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 集群入口（任一 master 节点）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MasterConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5050,
        }
    }
}

impl ConfigValidator for MasterConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.host, "master.host")?;
        ValidationUtils::validate_port(self.port, "master.port")?;
        Ok(())
    }
}

/// 节点文件服务端点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub files_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { files_port: 5051 }
    }
}

impl ConfigValidator for AgentConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_port(self.files_port, "agent.files_port")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ConfigValidator for HttpConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "http.request_timeout_seconds",
        )
    }
}
