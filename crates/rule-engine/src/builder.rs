//! 规则树构建器
//!
//! 用一个"当前节点"槽位加一个挂起栈把词法单元序列构造成单棵布尔表达式树。
//! 括号嵌套通过显式栈处理而不是函数递归，嵌套深度和树深度上限由调用方配置。
//!
//! 构建规则：
//! - `(`：挂起当前节点（可能为空），从空节点开始新的子表达式
//! - `)`：弹出挂起节点，把刚完成的子表达式挂到它的空闲子节点上
//! - `and` / `or`：新建逻辑节点，当前节点成为其左子节点
//! - 连续的非括号、非关键字单元合并为一个条件叶子，挂到逻辑节点的右侧
//!
//! 没有优先级，`a or b and c` 得到 `AND(OR(a, b), c)`。
//! 每形成一个节点都会更新深度，`a or b or ...` 这样的长链同样受树深度上限约束。

use crate::error::{Result, RuleError};
use crate::executor::DEFAULT_MAX_TREE_DEPTH;
use crate::models::Node;
use crate::operators::LogicalOperator;
use crate::tokenizer::Token;
use std::mem;

/// 默认括号嵌套深度上限
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

/// 规则树构建器
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    max_nesting_depth: usize,
    max_tree_depth: usize,
}

impl TreeBuilder {
    pub fn new(max_nesting_depth: usize) -> Self {
        Self {
            max_nesting_depth,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    pub fn max_tree_depth(&self) -> usize {
        self.max_tree_depth
    }

    /// 构建规则树，空的单元序列返回 None
    pub fn build(&self, tokens: &[Token]) -> Result<Option<Node>> {
        let mut state = BuildState::new(self.max_nesting_depth, self.max_tree_depth);
        let mut iter = tokens.iter().peekable();

        while let Some(token) = iter.next() {
            match token {
                Token::LParen => state.open()?,
                Token::RParen => state.close()?,
                Token::Keyword(op) => state.keyword(*op)?,
                Token::Word(_) | Token::Symbol(_) => {
                    let mut parts = vec![token.to_string()];
                    while let Some(next) = iter.next_if(|t| t.is_operand_part()) {
                        parts.push(next.to_string());
                    }
                    state.operand(parts.join(" "))?;
                }
            }
        }

        state.finish()
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NESTING_DEPTH)
    }
}

/// 构建过程中的状态机
struct BuildState {
    current: Option<Node>,
    /// current 的深度，为空时是 0
    depth: usize,
    suspended: Vec<(Option<Node>, usize)>,
    max_nesting_depth: usize,
    max_tree_depth: usize,
}

impl BuildState {
    fn new(max_nesting_depth: usize, max_tree_depth: usize) -> Self {
        Self {
            current: None,
            depth: 0,
            suspended: Vec::new(),
            max_nesting_depth,
            max_tree_depth,
        }
    }

    fn check_depth(&self, depth: usize) -> Result<usize> {
        if depth > self.max_tree_depth {
            return Err(RuleError::malformed(format!(
                "规则树深度超过上限 {}",
                self.max_tree_depth
            )));
        }
        Ok(depth)
    }

    fn open(&mut self) -> Result<()> {
        if self.suspended.len() >= self.max_nesting_depth {
            return Err(RuleError::malformed(format!(
                "括号嵌套深度超过上限 {}",
                self.max_nesting_depth
            )));
        }

        let depth = mem::take(&mut self.depth);
        self.suspended.push((self.current.take(), depth));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let finished = self.current.take();
        let finished_depth = mem::take(&mut self.depth);
        let (parent, parent_depth) = self
            .suspended
            .pop()
            .ok_or_else(|| RuleError::malformed("右括号没有匹配的左括号"))?;

        match parent {
            Some(parent) => {
                let depth = if finished.is_some() {
                    self.check_depth(parent_depth.max(finished_depth + 1))?
                } else {
                    parent_depth
                };
                self.current = Some(Self::attach(parent, finished)?);
                self.depth = depth;
            }
            None => {
                self.current = finished;
                self.depth = finished_depth;
            }
        }

        Ok(())
    }

    /// 把子表达式挂到挂起节点的空闲位置：左侧优先，否则右侧
    fn attach(parent: Node, child: Option<Node>) -> Result<Node> {
        let Some(child) = child else {
            // 空括号 "()"，没有可挂载的内容
            return Ok(parent);
        };

        match parent {
            Node::Operator(mut op) => {
                if op.left.is_none() {
                    op.left = Some(Box::new(child));
                } else if op.right.is_none() {
                    op.right = Some(Box::new(child));
                } else {
                    return Err(RuleError::malformed(format!(
                        "子表达式 '{}' 无处挂载: {} 节点的左右子节点均已存在",
                        child, op.operator
                    )));
                }
                Ok(Node::Operator(op))
            }
            Node::Operand(leaf) => Err(RuleError::malformed(format!(
                "子表达式 '{}' 前缺少 and/or，无法挂载到条件 '{}'",
                child, leaf.value
            ))),
        }
    }

    fn keyword(&mut self, operator: LogicalOperator) -> Result<()> {
        let depth = self.check_depth(self.depth + 1)?;
        self.current = Some(Node::operator(operator, self.current.take(), None));
        self.depth = depth;
        Ok(())
    }

    fn operand(&mut self, condition: String) -> Result<()> {
        let leaf = Node::operand(condition);

        self.current = match self.current.take() {
            None => {
                self.depth = 1;
                Some(leaf)
            }
            Some(Node::Operator(mut op)) if op.right.is_none() => {
                self.depth = self.check_depth(self.depth.max(2))?;
                op.right = Some(Box::new(leaf));
                Some(Node::Operator(op))
            }
            Some(existing) => {
                return Err(RuleError::malformed(format!(
                    "条件 '{}' 前缺少 and/or，已有表达式 '{}' 会被丢弃",
                    leaf, existing
                )));
            }
        };

        Ok(())
    }

    fn finish(self) -> Result<Option<Node>> {
        if !self.suspended.is_empty() {
            return Err(RuleError::malformed(format!(
                "存在 {} 个未闭合的左括号",
                self.suspended.len()
            )));
        }

        Ok(self.current)
    }
}
