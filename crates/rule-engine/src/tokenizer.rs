//! 规则字符串分词器
//!
//! 把 `age > 30 and department == 'sales'` 这样的规则拆成扁平的词法单元序列。
//! 分词在输入的小写副本上进行，字段名、字面量和关键字都以小写形式出现。

use crate::operators::LogicalOperator;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(|\)|'[^']*'|"[^"]*"|\w+|[><=!]+"#).expect("分词正则表达式无效")
});

/// 词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    Keyword(LogicalOperator),
    /// 字段名、数字或字面量（带引号的字面量保留引号）
    Word(String),
    /// 比较符号串，如 `>=`、`==`，也可能是 `=>` 这样的非法组合
    Symbol(String),
}

impl Token {
    /// 是否属于条件的一部分（非括号、非关键字）
    pub fn is_operand_part(&self) -> bool {
        matches!(self, Self::Word(_) | Self::Symbol(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Keyword(op) => write!(f, "{}", op),
            Self::Word(s) | Self::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// 分词器
pub struct Tokenizer;

impl Tokenizer {
    /// 分词；不属于任何词法单元的字符（空白、其他标点）被跳过
    pub fn tokenize(input: &str) -> Vec<Token> {
        let lowered = input.to_lowercase();
        TOKEN_REGEX
            .find_iter(&lowered)
            .map(|m| Self::classify(m.as_str()))
            .collect()
    }

    fn classify(text: &str) -> Token {
        match text {
            "(" => Token::LParen,
            ")" => Token::RParen,
            _ if text.starts_with(['>', '<', '=', '!']) => Token::Symbol(text.to_string()),
            _ => match LogicalOperator::from_keyword(text) {
                Some(op) => Token::Keyword(op),
                None => Token::Word(text.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    fn symbol(s: &str) -> Token {
        Token::Symbol(s.to_string())
    }

    #[test]
    fn test_simple_condition() {
        assert_eq!(
            Tokenizer::tokenize("age > 30"),
            vec![word("age"), symbol(">"), word("30")]
        );
    }

    #[test]
    fn test_condition_without_spaces() {
        assert_eq!(
            Tokenizer::tokenize("age>=30"),
            vec![word("age"), symbol(">="), word("30")]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = Tokenizer::tokenize("a > 1 AND b < 2 Or c == 3");
        assert_eq!(tokens[3], Token::Keyword(LogicalOperator::And));
        assert_eq!(tokens[7], Token::Keyword(LogicalOperator::Or));
    }

    #[test]
    fn test_keyword_inside_word_is_not_keyword() {
        assert_eq!(
            Tokenizer::tokenize("order == 'android'"),
            vec![word("order"), symbol("=="), word("'android'")]
        );
    }

    #[test]
    fn test_parentheses_and_quotes() {
        assert_eq!(
            Tokenizer::tokenize("(city == 'New York')"),
            vec![
                Token::LParen,
                word("city"),
                symbol("=="),
                word("'new york'"),
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_fields_and_literals_lowercased() {
        assert_eq!(
            Tokenizer::tokenize("Department == 'Sales' AND Age > 30"),
            vec![
                word("department"),
                symbol("=="),
                word("'sales'"),
                Token::Keyword(LogicalOperator::And),
                word("age"),
                symbol(">"),
                word("30")
            ]
        );
    }

    #[test]
    fn test_double_quoted_literal() {
        assert_eq!(
            Tokenizer::tokenize(r#"name != "bob""#),
            vec![word("name"), symbol("!="), word("\"bob\"")]
        );
    }

    #[test]
    fn test_unknown_characters_skipped() {
        assert_eq!(
            Tokenizer::tokenize("age ~ 30;"),
            vec![word("age"), word("30")]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(Tokenizer::tokenize("").is_empty());
        assert!(Tokenizer::tokenize("   ").is_empty());
    }

    #[test]
    fn test_token_display() {
        let rendered: Vec<String> = Tokenizer::tokenize("(a>1 or b)")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, vec!["(", "a", ">", "1", "OR", "b", ")"]);
    }
}
