//! 规则节点存储
//!
//! 定义持久化层契约（自底向上保存、按标识加载），并提供基于 DashMap 的线程安全内存实现。
//! 子节点总是先于父节点保存，所以子节点的标识一定小于父节点。

use crate::error::{Result, RuleError};
use crate::executor::DEFAULT_MAX_TREE_DEPTH;
use crate::models::{Node, NodeId};
use crate::operators::LogicalOperator;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Operator,
    Operand,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator => write!(f, "operator"),
            Self::Operand => write!(f, "operand"),
        }
    }
}

/// 带存储标识的节点，保存后返回给调用方用于传输
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub operator: Option<LogicalOperator>,
    pub value: Option<String>,
    pub left: Option<Box<PersistedNode>>,
    pub right: Option<Box<PersistedNode>>,
}

/// 存储中的一行节点记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub operator: Option<LogicalOperator>,
    pub value: Option<String>,
    pub left_id: Option<NodeId>,
    pub right_id: Option<NodeId>,
    pub created_at: DateTime<Utc>,
}

/// 持久化层契约
#[cfg_attr(test, mockall::automock)]
pub trait NodeStore: Send + Sync {
    /// 自底向上保存整棵树，返回带标识的树
    fn save(&self, tree: &Node) -> Result<PersistedNode>;

    /// 按标识重建以该节点为根的树
    fn load(&self, id: NodeId) -> Result<Node>;
}

/// 内存节点存储
///
/// 保存和加载都会检查树深度，超过上限的树不会被递归处理。
#[derive(Clone)]
pub struct InMemoryNodeStore {
    nodes: Arc<DashMap<NodeId, StoredNode>>,
    next_id: Arc<AtomicI64>,
    max_tree_depth: usize,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    /// 当前存储的节点数量
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// 获取单行记录
    pub fn get(&self, id: NodeId) -> Option<StoredNode> {
        self.nodes.get(&id).map(|r| r.value().clone())
    }

    /// 删除节点及其所有子节点，返回删除的行数
    #[instrument(skip(self))]
    pub fn delete(&self, id: NodeId) -> Result<usize> {
        let Some((_, row)) = self.nodes.remove(&id) else {
            warn!("删除不存在的节点: {}", id);
            return Err(RuleError::NodeNotFound(id));
        };

        let mut removed = 1;
        let mut pending: Vec<NodeId> = row.left_id.into_iter().chain(row.right_id).collect();
        while let Some(child) = pending.pop() {
            if let Some((_, row)) = self.nodes.remove(&child) {
                removed += 1;
                pending.extend(row.left_id.into_iter().chain(row.right_id));
            }
        }

        info!("节点已删除: {} (共 {} 行)", id, removed);
        Ok(removed)
    }

    /// 清空所有节点
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.nodes.len();
        self.nodes.clear();
        info!("已清空 {} 个节点", count);
    }

    fn allocate_id(&self) -> NodeId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn save_node(&self, node: &Node) -> PersistedNode {
        let persisted = match node {
            Node::Operand(leaf) => PersistedNode {
                id: self.allocate_id(),
                node_type: NodeType::Operand,
                operator: None,
                value: Some(leaf.value.clone()),
                left: None,
                right: None,
            },
            Node::Operator(op) => {
                // 先保存子节点，再为父节点分配标识
                let left = op.left.as_deref().map(|child| Box::new(self.save_node(child)));
                let right = op.right.as_deref().map(|child| Box::new(self.save_node(child)));
                PersistedNode {
                    id: self.allocate_id(),
                    node_type: NodeType::Operator,
                    operator: Some(op.operator),
                    value: None,
                    left,
                    right,
                }
            }
        };

        self.nodes.insert(
            persisted.id,
            StoredNode {
                id: persisted.id,
                node_type: persisted.node_type,
                operator: persisted.operator,
                value: persisted.value.clone(),
                left_id: persisted.left.as_ref().map(|n| n.id),
                right_id: persisted.right.as_ref().map(|n| n.id),
                created_at: Utc::now(),
            },
        );

        persisted
    }

    fn load_node(&self, id: NodeId, depth: usize) -> Result<Node> {
        if depth > self.max_tree_depth {
            return Err(RuleError::malformed(format!(
                "节点 {} 所在规则树深度超过上限 {}",
                id, self.max_tree_depth
            )));
        }

        // 先克隆出行数据，避免递归期间持有分片锁
        let row = self.get(id).ok_or(RuleError::NodeNotFound(id))?;

        match row.node_type {
            NodeType::Operand => {
                if row.left_id.is_some() || row.right_id.is_some() {
                    return Err(RuleError::malformed(format!("条件节点 {} 不应有子节点", id)));
                }
                let value = row
                    .value
                    .ok_or_else(|| RuleError::malformed(format!("条件节点 {} 缺少条件", id)))?;
                Ok(Node::operand(value))
            }
            NodeType::Operator => {
                let operator = row.operator.ok_or_else(|| {
                    RuleError::malformed(format!("逻辑节点 {} 缺少操作符", id))
                })?;
                let left = row
                    .left_id
                    .map(|child| self.load_child(id, child, depth + 1))
                    .transpose()?;
                let right = row
                    .right_id
                    .map(|child| self.load_child(id, child, depth + 1))
                    .transpose()?;
                Ok(Node::operator(operator, left, right))
            }
        }
    }

    fn load_child(&self, parent: NodeId, child: NodeId, depth: usize) -> Result<Node> {
        if child >= parent {
            return Err(RuleError::malformed(format!(
                "节点 {} 的子节点 {} 标识不小于父节点",
                parent, child
            )));
        }

        match self.load_node(child, depth) {
            Err(RuleError::NodeNotFound(missing)) => Err(RuleError::malformed(format!(
                "节点 {} 引用的子节点 {} 不存在",
                parent, missing
            ))),
            other => other,
        }
    }

    #[cfg(test)]
    fn insert_raw(&self, row: StoredNode) {
        self.nodes.insert(row.id, row);
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for InMemoryNodeStore {
    #[instrument(skip(self, tree))]
    fn save(&self, tree: &Node) -> Result<PersistedNode> {
        let depth = tree.depth();
        if depth > self.max_tree_depth {
            warn!("拒绝保存过深的规则树: depth={}", depth);
            return Err(RuleError::malformed(format!(
                "规则树深度 {} 超过上限 {}",
                depth, self.max_tree_depth
            )));
        }

        let persisted = self.save_node(tree);
        info!("规则树已保存: root_id={}", persisted.id);
        Ok(persisted)
    }

    #[instrument(skip(self))]
    fn load(&self, id: NodeId) -> Result<Node> {
        self.load_node(id, 1)
    }
}
