//! 规则引擎错误类型

use crate::models::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无效的输入: {0}")]
    InvalidInput(String),

    #[error("规则表达式结构错误: {0}")]
    MalformedExpression(String),

    #[error("规则节点未找到: id={0}")]
    NodeNotFound(NodeId),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 获取错误码，供外部 API 层映射为响应状态
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::MalformedExpression(_) => "MALFORMED_EXPRESSION",
            Self::NodeNotFound(_) => "NODE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedExpression(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
