//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Neq,
}

impl Comparator {
    /// 从符号解析，不认识的符号返回 None
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            "==" => Some(Self::Eq),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            "!=" => Some(Self::Neq),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Neq => "!=",
        }
    }

    /// 按比较结果判定是否满足
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Gte => ordering != Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Neq => ordering != Ordering::Equal,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// 关键字匹配不区分大小写
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    pub fn apply(&self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_from_symbol() {
        for symbol in [">", "<", "==", ">=", "<=", "!="] {
            let cmp = Comparator::from_symbol(symbol).unwrap();
            assert_eq!(cmp.to_string(), symbol);
        }
        assert_eq!(Comparator::from_symbol("="), None);
        assert_eq!(Comparator::from_symbol("=>"), None);
        assert_eq!(Comparator::from_symbol("!"), None);
    }

    #[test]
    fn test_comparator_matches() {
        assert!(Comparator::Gte.matches(Ordering::Equal));
        assert!(Comparator::Gte.matches(Ordering::Greater));
        assert!(!Comparator::Gt.matches(Ordering::Equal));
        assert!(Comparator::Neq.matches(Ordering::Less));
        assert!(!Comparator::Lte.matches(Ordering::Greater));
    }

    #[test]
    fn test_keyword_case_insensitive() {
        assert_eq!(LogicalOperator::from_keyword("and"), Some(LogicalOperator::And));
        assert_eq!(LogicalOperator::from_keyword("AnD"), Some(LogicalOperator::And));
        assert_eq!(LogicalOperator::from_keyword("OR"), Some(LogicalOperator::Or));
        assert_eq!(LogicalOperator::from_keyword("order"), None);
    }

    #[test]
    fn test_logical_serde_uppercase() {
        let json = serde_json::to_string(&LogicalOperator::Or).unwrap();
        assert_eq!(json, "\"OR\"");
    }
}
