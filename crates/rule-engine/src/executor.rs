//! 规则执行器
//!
//! 递归遍历规则树并对记录求值，返回匹配结果和评估追踪信息。
//! 逻辑节点的左右子树总是都会被评估，不做短路。

use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::models::{EvaluationResult, Node, OperatorNode, Record};
use std::time::Instant;

/// 默认规则树深度上限
pub const DEFAULT_MAX_TREE_DEPTH: usize = 1024;

/// 规则执行器
#[derive(Debug, Clone)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
    /// 递归深度上限，超过即视为结构错误
    max_tree_depth: usize,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_max_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    /// 只返回是否匹配
    pub fn evaluate(&self, tree: Option<&Node>, record: &Record) -> Result<bool> {
        self.execute(tree, record).map(|result| result.matched)
    }

    /// 执行规则评估
    ///
    /// 规则树缺失属于调用方的前置条件错误，返回错误而不是 false。
    pub fn execute(&self, tree: Option<&Node>, record: &Record) -> Result<EvaluationResult> {
        let tree = tree.ok_or_else(|| RuleError::malformed("没有可评估的规则树"))?;
        let start = Instant::now();

        let mut result = EvaluationResult::new();
        let mut path = String::from("root");
        let matched = self.evaluate_node(tree, record, &mut result, &mut path, 1)?;
        result.matched = matched;
        result.evaluation_time_ms = start.elapsed().as_millis() as i64;

        Ok(result)
    }

    fn evaluate_node(
        &self,
        node: &Node,
        record: &Record,
        result: &mut EvaluationResult,
        path: &mut String,
        depth: usize,
    ) -> Result<bool> {
        if depth > self.max_tree_depth {
            return Err(RuleError::malformed(format!(
                "规则树深度超过上限 {}",
                self.max_tree_depth
            )));
        }

        match node {
            Node::Operand(leaf) => Ok(self.evaluate_condition(&leaf.value, record, result, path)),
            Node::Operator(op) => self.evaluate_operator(op, record, result, path, depth),
        }
    }

    fn evaluate_condition(
        &self,
        condition: &str,
        record: &Record,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        let matched = ConditionEvaluator::evaluate(condition, record);

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: {} => {}",
                path,
                condition,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        if matched {
            result
                .matched_conditions
                .push(format!("{}: {}", path, condition));
        }

        matched
    }

    /// 评估逻辑节点，缺失的子节点按 false 处理
    fn evaluate_operator(
        &self,
        op: &OperatorNode,
        record: &Record,
        result: &mut EvaluationResult,
        path: &mut String,
        depth: usize,
    ) -> Result<bool> {
        let left = self.evaluate_child(op.left.as_deref(), ".left", record, result, path, depth)?;
        let right =
            self.evaluate_child(op.right.as_deref(), ".right", record, result, path, depth)?;

        let matched = op.operator.apply(left, right);

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: {} (left={}, right={}) => {}",
                path,
                op.operator,
                left,
                right,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        Ok(matched)
    }

    /// 在共享的路径缓冲区上追加分支名，评估完成后截断回原长度
    fn evaluate_child(
        &self,
        child: Option<&Node>,
        branch: &str,
        record: &Record,
        result: &mut EvaluationResult,
        path: &mut String,
        depth: usize,
    ) -> Result<bool> {
        let Some(child) = child else {
            return Ok(false);
        };

        let len = path.len();
        path.push_str(branch);
        let matched = self.evaluate_node(child, record, result, path, depth + 1);
        path.truncate(len);
        matched
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::LogicalOperator;

    fn leaf(condition: &str) -> Node {
        Node::operand(condition)
    }

    #[test]
    fn test_single_leaf() {
        let executor = RuleExecutor::new();
        let record = Record::new().with("age", 35);

        assert!(executor.evaluate(Some(&leaf("age > 30")), &record).unwrap());
        assert!(!executor.evaluate(Some(&leaf("age > 40")), &record).unwrap());
    }

    #[test]
    fn test_leaf_against_empty_record() {
        let executor = RuleExecutor::new();
        assert!(!executor.evaluate(Some(&leaf("age > 30")), &Record::new()).unwrap());
    }

    #[test]
    fn test_truth_tables() {
        let executor = RuleExecutor::new();
        let record = Record::new().with("x", 1);
        let t = || leaf("x == 1");
        let f = || leaf("x == 2");

        let cases = [
            (t(), t(), true, true),
            (t(), f(), false, true),
            (f(), t(), false, true),
            (f(), f(), false, false),
        ];

        for (left, right, and_expected, or_expected) in cases {
            let and = Node::and(left.clone(), right.clone());
            let or = Node::or(left, right);
            assert_eq!(executor.evaluate(Some(&and), &record).unwrap(), and_expected);
            assert_eq!(executor.evaluate(Some(&or), &record).unwrap(), or_expected);
        }
    }

    #[test]
    fn test_no_short_circuit() {
        let tree = Node::and(leaf("age > 40"), leaf("age > 20"));
        let record = Record::new().with("age", 35);

        let result = RuleExecutor::new()
            .with_trace()
            .execute(Some(&tree), &record)
            .unwrap();

        assert!(!result.matched);
        // 左侧不满足，右侧依然被评估
        assert!(result
            .evaluation_trace
            .iter()
            .any(|t| t == "root.right: age > 20 => MATCHED"));
        assert_eq!(result.matched_conditions, vec!["root.right: age > 20"]);
        assert_eq!(
            result.evaluation_trace.last().unwrap(),
            "root: AND (left=false, right=true) => NOT_MATCHED"
        );
    }

    #[test]
    fn test_missing_children_count_as_false() {
        let executor = RuleExecutor::new();
        let record = Record::new().with("age", 35);

        let or = Node::operator(LogicalOperator::Or, None, Some(leaf("age > 30")));
        assert!(executor.evaluate(Some(&or), &record).unwrap());

        let and = Node::operator(LogicalOperator::And, Some(leaf("age > 30")), None);
        assert!(!executor.evaluate(Some(&and), &record).unwrap());

        let empty = Node::operator(LogicalOperator::Or, None, None);
        assert!(!executor.evaluate(Some(&empty), &record).unwrap());
    }

    #[test]
    fn test_paths_of_nested_conditions() {
        let tree = Node::or(
            Node::and(leaf("x == 1"), leaf("y == 2")),
            Node::and(leaf("x == 3"), leaf("y == 2")),
        );
        let record = Record::new().with("x", 1).with("y", 2);

        let result = RuleExecutor::new().execute(Some(&tree), &record).unwrap();
        assert!(result.matched);
        assert_eq!(
            result.matched_conditions,
            vec![
                "root.left.left: x == 1",
                "root.left.right: y == 2",
                "root.right.right: y == 2"
            ]
        );
    }

    #[test]
    fn test_absent_tree_is_error() {
        let err = RuleExecutor::new().evaluate(None, &Record::new()).unwrap_err();
        assert!(matches!(err, RuleError::MalformedExpression(_)));
    }

    #[test]
    fn test_tree_depth_limit() {
        let mut tree = leaf("x == 1");
        for _ in 0..10 {
            tree = Node::or(tree, leaf("x == 2"));
        }
        let record = Record::new().with("x", 1);

        assert!(RuleExecutor::new().with_max_depth(11).evaluate(Some(&tree), &record).unwrap());

        let err = RuleExecutor::new()
            .with_max_depth(10)
            .evaluate(Some(&tree), &record)
            .unwrap_err();
        assert!(err.to_string().contains("深度"));
    }

    #[test]
    fn test_trace_disabled_by_default() {
        let result = RuleExecutor::new()
            .execute(Some(&leaf("age > 30")), &Record::new().with("age", 31))
            .unwrap();
        assert!(result.matched);
        assert!(result.evaluation_trace.is_empty());
        assert!(result.evaluation_time_ms >= 0);
    }
}
