//! Unit string parsing.
//!
//! Unit strings in CF metadata are written many ways (`mmol/m^2/s`,
//! `mmol m-2 s-1`, `mmol / m**2 / s`). They are tokenised and reduced to a
//! product of registry symbols with integer exponents, so all of those forms
//! compare equal.
//!
//! ```text
//! expr   = term (('/' | 'per') term)*
//! term   = factor (('*' | '·' | ' ') factor)*
//! factor = (symbol | '(' expr ')') (('^' | '**')? integer)?
//! ```

use super::dimension::Dimension;
use super::registry::UNIT_REGISTRY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty unit string")]
    EmptyUnit,
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("invalid exponent '{0}'")]
    InvalidExponent(String),
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unit string ends unexpectedly")]
    UnexpectedEnd,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol(String),
    Integer(i32),
    Caret,
    Times,
    Divide,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '/' => {
                tokens.push(Token::Divide);
                i += 1;
            }
            '·' => {
                tokens.push(Token::Times);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Times);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '-' | '+' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i32>()
                    .map_err(|_| ParseError::InvalidExponent(text.clone()))?;
                tokens.push(Token::Integer(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                split_trailing_exponent(&word, &mut tokens);
            }
            other => return Err(ParseError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

/// `m2` is `m^2`, unless the whole word is itself a registered symbol.
fn split_trailing_exponent(word: &str, tokens: &mut Vec<Token>) {
    if word.eq_ignore_ascii_case("per") {
        tokens.push(Token::Divide);
        return;
    }

    let digits_at = word.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_at == word.len() || UNIT_REGISTRY.lookup(word).is_some() {
        tokens.push(Token::Symbol(word.to_string()));
        return;
    }

    tokens.push(Token::Symbol(word[..digits_at].to_string()));
    tokens.push(Token::Caret);
    let exp = word[digits_at..].parse::<i32>().unwrap_or(1);
    tokens.push(Token::Integer(exp));
}

/// A unit reduced to symbols and integer exponents.
///
/// `mmol/m^2/s` is stored as `{mmol: 1, m: -2, s: -1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParsedUnit {
    components: BTreeMap<String, i32>,
}

impl ParsedUnit {
    #[must_use]
    pub fn dimensionless() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_components(components: BTreeMap<String, i32>) -> Self {
        Self {
            components: components.into_iter().filter(|(_, e)| *e != 0).collect(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::EmptyUnit);
        }
        if input == "1" || input.eq_ignore_ascii_case("dimensionless") {
            return Ok(Self::dimensionless());
        }

        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let unit = parser.expression()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(unit),
            Some(Token::Close) => Err(ParseError::UnbalancedParenthesis),
            Some(_) => Err(ParseError::UnexpectedEnd),
        }
    }

    #[must_use]
    pub fn components(&self) -> &BTreeMap<String, i32> {
        &self.components
    }

    pub fn dimension(&self) -> Result<Dimension, ParseError> {
        self.components
            .iter()
            .try_fold(Dimension::DIMENSIONLESS, |acc, (symbol, &exp)| {
                let info = UNIT_REGISTRY
                    .lookup(symbol)
                    .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
                Ok(acc * info.dimension.powi(exp))
            })
    }

    pub fn to_si_factor(&self) -> Result<f64, ParseError> {
        self.components
            .iter()
            .try_fold(1.0, |acc, (symbol, &exp)| {
                let info = UNIT_REGISTRY
                    .lookup(symbol)
                    .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
                Ok(acc * info.to_si_factor.powi(exp))
            })
    }

    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut components = self.components.clone();
        for (symbol, exp) in &other.components {
            *components.entry(symbol.clone()).or_insert(0) += exp;
        }
        Self::from_components(components)
    }

    #[must_use]
    pub fn divide(&self, other: &Self) -> Self {
        self.multiply(&other.pow(-1))
    }

    #[must_use]
    pub fn pow(&self, exp: i32) -> Self {
        Self::from_components(
            self.components
                .iter()
                .map(|(k, v)| (k.clone(), v * exp))
                .collect(),
        )
    }

    /// Canonical form: positive exponents, then `/`, then negative ones.
    #[must_use]
    pub fn normalized(&self) -> String {
        let render = |parts: Vec<(&String, i32)>| {
            parts
                .into_iter()
                .map(|(s, e)| if e == 1 { s.clone() } else { format!("{s}^{e}") })
                .collect::<Vec<_>>()
                .join(" ")
        };

        let numerator: Vec<_> = self
            .components
            .iter()
            .filter(|(_, &e)| e > 0)
            .map(|(s, &e)| (s, e))
            .collect();
        let denominator: Vec<_> = self
            .components
            .iter()
            .filter(|(_, &e)| e < 0)
            .map(|(s, &e)| (s, -e))
            .collect();

        match (numerator.is_empty(), denominator.is_empty()) {
            (true, true) => "1".to_string(),
            (false, true) => render(numerator),
            (true, false) => format!("1 / {}", render(denominator)),
            (false, false) => format!("{} / {}", render(numerator), render(denominator)),
        }
    }
}

impl fmt::Display for ParsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> Result<ParsedUnit, ParseError> {
        let mut unit = self.term()?;
        while self.peek() == Some(&Token::Divide) {
            self.pos += 1;
            unit = unit.divide(&self.term()?);
        }
        Ok(unit)
    }

    fn term(&mut self) -> Result<ParsedUnit, ParseError> {
        let mut unit = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Times) => {
                    self.pos += 1;
                    unit = unit.multiply(&self.factor()?);
                }
                Some(Token::Symbol(_)) | Some(Token::Open) => {
                    unit = unit.multiply(&self.factor()?);
                }
                _ => return Ok(unit),
            }
        }
    }

    fn factor(&mut self) -> Result<ParsedUnit, ParseError> {
        let base = match self.next() {
            Some(Token::Symbol(symbol)) => {
                ParsedUnit::from_components(BTreeMap::from([(symbol, 1)]))
            }
            Some(Token::Open) => {
                let inner = self.expression()?;
                if self.next() != Some(Token::Close) {
                    return Err(ParseError::UnbalancedParenthesis);
                }
                inner
            }
            // Numerator of "1/s"
            Some(Token::Integer(1)) => ParsedUnit::dimensionless(),
            Some(Token::Integer(value)) => {
                return Err(ParseError::InvalidExponent(value.to_string()))
            }
            Some(Token::Close) => return Err(ParseError::UnbalancedParenthesis),
            _ => return Err(ParseError::UnexpectedEnd),
        };

        let explicit = self.peek() == Some(&Token::Caret);
        if explicit {
            self.pos += 1;
        }
        match self.peek() {
            Some(Token::Integer(exp)) => {
                let exp = *exp;
                self.pos += 1;
                Ok(base.pow(exp))
            }
            _ if explicit => Err(ParseError::UnexpectedEnd),
            _ => Ok(base),
        }
    }
}
