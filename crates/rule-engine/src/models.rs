//! 规则引擎领域模型

use crate::error::{Result, RuleError};
use crate::operators::LogicalOperator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// 持久化层分配的节点标识
pub type NodeId = i64;

/// 规则树节点（逻辑操作符或条件叶子）
///
/// 每个子节点只归属一个父节点，树中不存在共享和环。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Operator(OperatorNode),
    Operand(OperandNode),
}

/// 逻辑节点，最多两个子节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorNode {
    pub operator: LogicalOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<Node>>,
}

/// 逐层摘下子节点再释放，避免深树递归析构耗尽调用栈
impl Drop for OperatorNode {
    fn drop(&mut self) {
        let mut pending: Vec<Box<Node>> =
            self.left.take().into_iter().chain(self.right.take()).collect();

        while let Some(mut node) = pending.pop() {
            if let Node::Operator(op) = &mut *node {
                pending.extend(op.left.take());
                pending.extend(op.right.take());
            }
        }
    }
}

/// 条件叶子，如 "age > 30"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandNode {
    pub value: String,
}

impl Node {
    pub fn operand(condition: impl Into<String>) -> Self {
        Self::Operand(OperandNode {
            value: condition.into(),
        })
    }

    pub fn operator(operator: LogicalOperator, left: Option<Node>, right: Option<Node>) -> Self {
        Self::Operator(OperatorNode {
            operator,
            left: left.map(Box::new),
            right: right.map(Box::new),
        })
    }

    pub fn and(left: Node, right: Node) -> Self {
        Self::operator(LogicalOperator::And, Some(left), Some(right))
    }

    pub fn or(left: Node, right: Node) -> Self {
        Self::operator(LogicalOperator::Or, Some(left), Some(right))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Operand(_))
    }

    /// 树的深度（单个叶子为 1），用显式栈遍历避免深树递归
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1)];

        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Self::Operator(op) = node {
                for child in [&op.left, &op.right].into_iter().flatten() {
                    stack.push((&**child, depth + 1));
                }
            }
        }

        max_depth
    }

    /// 按从左到右的顺序收集所有条件字符串
    pub fn conditions(&self) -> Vec<&str> {
        let mut conditions = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            match node {
                Self::Operand(leaf) => conditions.push(leaf.value.as_str()),
                Self::Operator(op) => {
                    // 先压右再压左，出栈顺序即从左到右
                    if let Some(right) = &op.right {
                        stack.push(right);
                    }
                    if let Some(left) = &op.left {
                        stack.push(left);
                    }
                }
            }
        }

        conditions
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(leaf) => write!(f, "{}", leaf.value),
            Self::Operator(op) => {
                write!(f, "(")?;
                match &op.left {
                    Some(left) => write!(f, "{}", left)?,
                    None => write!(f, "_")?,
                }
                write!(f, " {} ", op.operator)?;
                match &op.right {
                    Some(right) => write!(f, "{}", right)?,
                    None => write!(f, "_")?,
                }
                write!(f, ")")
            }
        }
    }
}

/// 记录中的字段值，只区分整数和字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// 同类型按原生顺序比较，类型不同返回 None
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "string",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// 评估用的数据记录：字段名到值的映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 字符串创建
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// 从 JSON 对象创建
    ///
    /// 只保留整数和字符串字段；其他类型的字段被跳过，评估时等同于字段不存在。
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            RuleError::InvalidInput(format!("记录必须是 JSON 对象，实际为 {}", json_type(value)))
        })?;

        let mut fields = HashMap::with_capacity(map.len());
        for (key, v) in map {
            match v {
                Value::String(s) => {
                    fields.insert(key.clone(), FieldValue::Text(s.clone()));
                }
                Value::Number(n) => match n.as_i64() {
                    Some(i) => {
                        fields.insert(key.clone(), FieldValue::Integer(i));
                    }
                    None => debug!(field = %key, "跳过非整数数值字段"),
                },
                other => debug!(field = %key, value_type = json_type(other), "跳过不支持的字段类型"),
            }
        }

        Ok(Self { fields })
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self {
            matched: false,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self::new()
    }
}
