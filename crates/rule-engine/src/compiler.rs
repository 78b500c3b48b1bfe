//! 规则编译器
//!
//! 把规则字符串解析成内存中的规则树，并支持把多条规则用 OR 合并成一棵树。

use crate::builder::{TreeBuilder, DEFAULT_MAX_NESTING_DEPTH};
use crate::error::{Result, RuleError};
use crate::executor::DEFAULT_MAX_TREE_DEPTH;
use crate::models::Node;
use crate::tokenizer::Tokenizer;
use serde_json::Value;
use tracing::debug;

/// 规则编译器
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    builder: TreeBuilder,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::with_max_nesting_depth(DEFAULT_MAX_NESTING_DEPTH)
    }

    pub fn with_max_nesting_depth(max_nesting_depth: usize) -> Self {
        Self::with_limits(max_nesting_depth, DEFAULT_MAX_TREE_DEPTH)
    }

    /// 同时指定括号嵌套深度和树深度上限
    pub fn with_limits(max_nesting_depth: usize, max_tree_depth: usize) -> Self {
        Self {
            builder: TreeBuilder::new(max_nesting_depth).with_max_tree_depth(max_tree_depth),
        }
    }

    /// 解析规则字符串，空规则返回 None
    pub fn parse(&self, rule: &str) -> Result<Option<Node>> {
        let tokens = Tokenizer::tokenize(rule);
        let tree = self.builder.build(&tokens)?;

        debug!(rule, tokens = tokens.len(), depth = tree.as_ref().map(Node::depth), "规则已解析");
        Ok(tree)
    }

    /// 从 JSON 值解析规则，值必须是字符串
    pub fn parse_value(&self, rule: &Value) -> Result<Option<Node>> {
        match rule.as_str() {
            Some(rule) => self.parse(rule),
            None => Err(RuleError::InvalidInput(format!(
                "规则必须是字符串: {}",
                rule
            ))),
        }
    }

    /// 逐条解析后从左到右用 OR 合并
    ///
    /// 第一棵树作为累积结果，之后每棵树 t 生成 `OR(累积结果, t)`。
    /// 空输入返回 None；解析为空树的规则被跳过。
    /// 合并后的树同样受树深度上限约束。
    pub fn combine<S: AsRef<str>>(&self, rules: &[S]) -> Result<Option<Node>> {
        let max_tree_depth = self.builder.max_tree_depth();
        let mut root: Option<Node> = None;
        let mut depth = 0;

        for rule in rules {
            let Some(tree) = self.parse(rule.as_ref())? else {
                continue;
            };

            let tree_depth = tree.depth();
            root = Some(match root {
                None => {
                    depth = tree_depth;
                    tree
                }
                Some(acc) => {
                    depth = depth.max(tree_depth) + 1;
                    if depth > max_tree_depth {
                        return Err(RuleError::malformed(format!(
                            "合并后的规则树深度超过上限 {}",
                            max_tree_depth
                        )));
                    }
                    Node::or(acc, tree)
                }
            });
        }

        debug!(rules = rules.len(), combined = root.is_some(), "规则已合并");
        Ok(root)
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let compiler = RuleCompiler::new();
        let tree = compiler.parse("age > 30 and age < 40").unwrap().unwrap();
        assert_eq!(tree, Node::and(Node::operand("age > 30"), Node::operand("age < 40")));
    }

    #[test]
    fn test_parse_value_requires_string() {
        let compiler = RuleCompiler::new();

        let err = compiler.parse_value(&json!(42)).unwrap_err();
        assert!(matches!(err, RuleError::InvalidInput(_)));

        let err = compiler.parse_value(&json!(null)).unwrap_err();
        assert!(matches!(err, RuleError::InvalidInput(_)));

        let tree = compiler.parse_value(&json!("age > 30")).unwrap();
        assert_eq!(tree, Some(Node::operand("age > 30")));
    }

    #[test]
    fn test_parse_respects_nesting_limit() {
        let compiler = RuleCompiler::with_max_nesting_depth(1);
        assert!(compiler.parse("(a > 1)").is_ok());
        assert!(matches!(
            compiler.parse("((a > 1))").unwrap_err(),
            RuleError::MalformedExpression(_)
        ));
    }

    #[test]
    fn test_parse_respects_tree_depth_limit() {
        let compiler = RuleCompiler::with_limits(32, 2);
        assert!(compiler.parse("a > 1 or b > 2").is_ok());
        assert!(matches!(
            compiler.parse("a > 1 or b > 2 or c > 3").unwrap_err(),
            RuleError::MalformedExpression(_)
        ));
    }

    #[test]
    fn test_combine_respects_tree_depth_limit() {
        let compiler = RuleCompiler::with_limits(32, 3);

        // OR(OR(a, b), c) 深度为 3
        assert_eq!(
            compiler.combine(&["a > 1", "b > 2", "c > 3"]).unwrap().unwrap().depth(),
            3
        );

        let err = compiler.combine(&["a > 1", "b > 2", "c > 3", "d > 4"]).unwrap_err();
        assert!(matches!(err, RuleError::MalformedExpression(_)));

        // 单条规则本身较深时也计入
        let err = compiler
            .combine(&["a > 1 and b > 2 and c > 3", "d > 4"])
            .unwrap_err();
        assert!(matches!(err, RuleError::MalformedExpression(_)));
    }

    #[test]
    fn test_combine_many_rules_rejected_with_default_limit() {
        let rules = vec!["a > 1"; 5_000];
        let err = RuleCompiler::new().combine(&rules).unwrap_err();
        assert!(matches!(err, RuleError::MalformedExpression(_)));
    }

    #[test]
    fn test_combine_left_fold() {
        let compiler = RuleCompiler::new();
        let tree = compiler
            .combine(&["a > 1", "b > 2", "c > 3"])
            .unwrap()
            .unwrap();

        assert_eq!(
            tree,
            Node::or(
                Node::or(Node::operand("a > 1"), Node::operand("b > 2")),
                Node::operand("c > 3")
            )
        );
    }

    #[test]
    fn test_combine_single_rule() {
        let compiler = RuleCompiler::new();
        let tree = compiler.combine(&["age > 30 and age < 40"]).unwrap().unwrap();
        assert_eq!(tree, compiler.parse("age > 30 and age < 40").unwrap().unwrap());
    }

    #[test]
    fn test_combine_empty() {
        let compiler = RuleCompiler::new();
        let rules: [&str; 0] = [];
        assert!(compiler.combine(&rules).unwrap().is_none());
        assert!(compiler.combine(&["", "  "]).unwrap().is_none());
    }

    #[test]
    fn test_combine_skips_empty_rules() {
        let compiler = RuleCompiler::new();
        let tree = compiler.combine(&["", "a > 1", "", "b > 2"]).unwrap().unwrap();
        assert_eq!(tree, Node::or(Node::operand("a > 1"), Node::operand("b > 2")));
    }

    #[test]
    fn test_combine_propagates_errors() {
        let compiler = RuleCompiler::new();
        let rules = vec!["a > 1".to_string(), "(b > 2".to_string()];
        assert!(matches!(
            compiler.combine(&rules).unwrap_err(),
            RuleError::MalformedExpression(_)
        ));
    }
}
