//! Rule DSL parser.
//!
//! Recursive descent parser for custom rule-set entries. Converts text to AST
//! with error messages carrying the character offset and the expected/found token.
//!
//! ```text
//! AND(CROSS_ABOVE(EMA_SHORT, EMA_LONG), BELOW(RSI, 70), AT_LEAST(volume, 50000))
//! ```

use crate::domain::error::ParseError;
use crate::domain::rule::{IndicatorField, Operand, Rule};

const INDICATORS: [(&str, IndicatorField); 7] = [
    ("EMA_SHORT", IndicatorField::EmaShort),
    ("EMA_LONG", IndicatorField::EmaLong),
    ("EMA_TREND", IndicatorField::EmaTrend),
    ("RSI", IndicatorField::Rsi),
    ("MACD_LINE", IndicatorField::MacdLine),
    ("MACD_SIGNAL", IndicatorField::MacdSignal),
    ("ATR", IndicatorField::Atr),
];

#[derive(Clone, Copy)]
enum Comparison {
    CrossAbove,
    CrossBelow,
    Above,
    Below,
    AtLeast,
}

const COMPARISONS: [(&str, Comparison); 5] = [
    ("CROSS_ABOVE", Comparison::CrossAbove),
    ("CROSS_BELOW", Comparison::CrossBelow),
    ("ABOVE", Comparison::Above),
    ("BELOW", Comparison::Below),
    ("AT_LEAST", Comparison::AtLeast),
];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        let operand = match word.as_str() {
            "open" => Operand::Open,
            "high" => Operand::High,
            "low" => Operand::Low,
            "close" => Operand::Close,
            "volume" => Operand::Volume,
            other => match INDICATORS.iter().find(|(name, _)| *name == other) {
                Some((_, field)) => Operand::Indicator(*field),
                None => {
                    return Err(ParseError {
                        message: format!(
                            "expected price field or indicator (EMA_SHORT, EMA_LONG, EMA_TREND, RSI, MACD_LINE, MACD_SIGNAL, ATR), found '{}'",
                            word
                        ),
                        position: self.pos,
                    });
                }
            },
        };
        self.pos += word.len();
        Ok(operand)
    }

    fn parse_comparison(&mut self, comparison: Comparison) -> Result<Rule, ParseError> {
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        Ok(match comparison {
            Comparison::CrossAbove => Rule::CrossAbove { left, right },
            Comparison::CrossBelow => Rule::CrossBelow { left, right },
            Comparison::Above => Rule::Above { left, right },
            Comparison::Below => Rule::Below { left, right },
            Comparison::AtLeast => Rule::AtLeast { left, right },
        })
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_char('(')?;
        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    /// Comma-separated rule list for AND / OR, at least two entries.
    fn parse_rule_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(ParseError {
                message: format!("{} requires at least 2 rules", keyword),
                position: self.pos,
            });
        }
        Ok(rules)
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.peek_word();

        if let Some((_, comparison)) = COMPARISONS.iter().find(|(name, _)| *name == word) {
            self.pos += word.len();
            return self.parse_comparison(*comparison);
        }

        match word.as_str() {
            "BETWEEN" => {
                self.pos += word.len();
                self.parse_between()
            }
            "AND" => {
                self.pos += word.len();
                Ok(Rule::And(self.parse_rule_list("AND")?))
            }
            "OR" => {
                self.pos += word.len();
                Ok(Rule::Or(self.parse_rule_list("OR")?))
            }
            "NOT" => {
                self.pos += word.len();
                self.expect_char('(')?;
                let rule = self.parse_rule()?;
                self.expect_char(')')?;
                Ok(Rule::Not(Box::new(rule)))
            }
            _ => Err(ParseError {
                message: format!("expected rule, found '{}'", word),
                position: start,
            }),
        }
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    Parser::new(input).parse()
}
