use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 侦察流程中的错误类型
#[derive(Debug, Error)]
pub enum ReconError {
    /// 目标域名不合法
    #[error("无效的目标域名: {0:?}")]
    InvalidDomain(String),

    /// 配置数值不合法（线程数、超时等）
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    /// 必需的外部工具不存在
    #[error("未找到必需的工具: {0}")]
    ToolMissing(String),

    /// 输出目录无法创建
    #[error("无法创建输出目录 {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("DNS解析错误: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// 查询成功但没有任何地址记录
    #[error("{0} 无解析结果")]
    NotResolved(String),

    #[error("HTTP请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 外部工具执行失败
    #[error("{tool} 执行失败: {message}")]
    Collaborator { tool: String, message: String },

    #[error("{0} 超时 ({1:?})")]
    Timeout(String, Duration),

    /// 用户中断
    #[error("用户中断")]
    Interrupted,
}

impl ReconError {
    /// 是否属于流程开始前的致命配置错误
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReconError::InvalidDomain(_)
                | ReconError::InvalidConfig(_)
                | ReconError::ToolMissing(_)
                | ReconError::OutputDir { .. }
        )
    }

    pub(crate) fn collaborator(tool: &str, message: impl Into<String>) -> Self {
        ReconError::Collaborator {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
