//! 资格规则引擎
//!
//! 把 `age > 30 and (department == 'sales' or city == 'ny')` 这样的布尔规则字符串
//! 解析为二叉规则树，并对用户记录求值，支持：
//! - 规则分词和基于栈的建树
//! - 多条规则的 OR 合并
//! - 不短路的规则树评估及评估追踪
//! - 规则树的自底向上持久化

pub mod builder;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod service;
pub mod store;
pub mod tokenizer;

pub use builder::TreeBuilder;
pub use compiler::RuleCompiler;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{EvaluationResult, FieldValue, Node, NodeId, OperandNode, OperatorNode, Record};
pub use operators::{Comparator, LogicalOperator};
pub use service::RuleEngine;
pub use store::{InMemoryNodeStore, NodeStore, NodeType, PersistedNode, StoredNode};
pub use tokenizer::{Token, Tokenizer};

/// 使用默认配置解析规则字符串
pub fn parse(rule: &str) -> Result<Option<Node>> {
    RuleCompiler::new().parse(rule)
}

/// 使用默认配置解析并用 OR 合并多条规则
pub fn combine<S: AsRef<str>>(rules: &[S]) -> Result<Option<Node>> {
    RuleCompiler::new().combine(rules)
}

/// 使用默认配置评估规则树
pub fn evaluate(tree: Option<&Node>, record: &Record) -> Result<bool> {
    RuleExecutor::new().evaluate(tree, record)
}
