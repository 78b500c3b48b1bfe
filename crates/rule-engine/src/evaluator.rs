//! 条件评估器
//!
//! 解析叶子节点上的条件字符串（`<字段> <比较符> <字面量>`）并对记录求值。
//! 字段缺失、比较符未知、类型不匹配、条件无法解析都视为条件不满足，返回 false。

use crate::models::{FieldValue, Record};
use crate::operators::Comparator;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static CONDITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\w+)\s*([><=!]+)\s*([0-9]+|'[^']*'|"[^"]*"|\w+)"#)
        .expect("条件正则表达式无效")
});

/// 解析后的条件，各部分借用自原始字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCondition<'a> {
    pub field: &'a str,
    pub symbol: &'a str,
    pub literal: &'a str,
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 按语法拆分条件，不匹配时返回 None
    pub fn parse(condition: &str) -> Option<ParsedCondition<'_>> {
        let caps = CONDITION_REGEX.captures(condition)?;
        Some(ParsedCondition {
            field: caps.get(1)?.as_str(),
            symbol: caps.get(2)?.as_str(),
            literal: caps.get(3)?.as_str(),
        })
    }

    /// 解析字面量：纯数字为整数，否则去掉一对首尾引号作为字符串
    ///
    /// 超出 i64 范围的数字无法表示，返回 None。
    pub fn resolve_literal(raw: &str) -> Option<FieldValue> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse::<i64>().ok().map(FieldValue::Integer);
        }

        Some(FieldValue::Text(Self::strip_quotes(raw).to_string()))
    }

    fn strip_quotes(raw: &str) -> &str {
        for quote in ['\'', '"'] {
            if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
                return &raw[1..raw.len() - 1];
            }
        }
        raw
    }

    /// 评估条件字符串
    pub fn evaluate(condition: &str, record: &Record) -> bool {
        let Some(parsed) = Self::parse(condition) else {
            debug!(condition, "条件不符合语法，视为不满足");
            return false;
        };

        let Some(expected) = Self::resolve_literal(parsed.literal) else {
            debug!(condition, literal = parsed.literal, "字面量超出整数范围，视为不满足");
            return false;
        };

        let field_value = record.get(parsed.field);
        debug!(
            field = parsed.field,
            operator = parsed.symbol,
            expected = %expected,
            actual = ?field_value,
            "Evaluating condition"
        );

        // 字段不存在时返回 false
        let Some(field_value) = field_value else {
            return false;
        };

        match Comparator::from_symbol(parsed.symbol) {
            Some(comparator) => Self::compare(field_value, comparator, &expected),
            None => {
                debug!(operator = parsed.symbol, "未知的比较符，视为不满足");
                false
            }
        }
    }

    /// 同类型比较；整数与字符串之间的比较一律不满足
    pub fn compare(field_value: &FieldValue, comparator: Comparator, expected: &FieldValue) -> bool {
        match field_value.compare(expected) {
            Some(ordering) => comparator.matches(ordering),
            None => {
                debug!(
                    expected = expected.type_name(),
                    actual = field_value.type_name(),
                    "类型不匹配，视为不满足"
                );
                false
            }
        }
    }
}
