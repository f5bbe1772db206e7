//! Built-in parsers for numbers, booleans, characters, strings, and fixed word sets.

use command_tree_contract::{ArgValue, TypeKey};

use super::ArgumentParser;
use crate::{
    context::CommandContext,
    error::{ParseFailure, ParseFailureReason, RegistrationError},
    tokens::TokenQueue,
};

fn head<'a>(input: &'a TokenQueue) -> Result<&'a str, ParseFailure> {
    input
        .peek()
        .ok_or_else(|| ParseFailure::new(ParseFailureReason::NoInput, input.position()))
}

/// Integer parser with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerParser {
    min: i64,
    max: i64,
}

impl IntegerParser {
    /// Creates a parser accepting `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidRange`] when `min > max`.
    pub fn new(min: i64, max: i64) -> Result<Self, RegistrationError> {
        if min > max {
            return Err(RegistrationError::InvalidRange {
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(Self { min, max })
    }

    /// Full value range of an integral type key, `None` for other keys.
    pub fn type_bounds(key: &TypeKey) -> Option<(i64, i64)> {
        match key.canonical() {
            TypeKey::Byte => Some((i8::MIN.into(), i8::MAX.into())),
            TypeKey::Short => Some((i16::MIN.into(), i16::MAX.into())),
            TypeKey::Integer => Some((i32::MIN.into(), i32::MAX.into())),
            TypeKey::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Inclusive lower bound.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Inclusive upper bound.
    pub fn max(&self) -> i64 {
        self.max
    }

    fn accepts(&self, raw: &str) -> Option<i64> {
        raw.parse::<i64>()
            .ok()
            .filter(|value| (self.min..=self.max).contains(value))
    }

    /// In range and spelled the way the value prints, so `-0` or `07` are never offered.
    fn is_canonical(&self, raw: &str) -> bool {
        self.accepts(raw).is_some_and(|value| value.to_string() == raw)
    }
}

impl<C> ArgumentParser<C> for IntegerParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        let token = head(input)?;
        let Some(value) = self.accepts(token) else {
            return Err(ParseFailure::new(
                ParseFailureReason::Number {
                    input: token.to_string(),
                    min: self.min.to_string(),
                    max: self.max.to_string(),
                },
                input.position(),
            ));
        };
        input.pop();
        Ok(ArgValue::Int(value))
    }

    fn suggestions(&self, _context: &CommandContext<C>, input: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !input.is_empty() {
            if self.accepts(input).is_none() && input != "-" {
                return out;
            }
            if self.is_canonical(input) {
                out.push(input.to_string());
            }
        }
        for digit in 0..=9 {
            let candidate = format!("{input}{digit}");
            if self.is_canonical(&candidate) && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        out
    }
}

/// Floating point parser with inclusive bounds; non-finite input is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatParser {
    min: f64,
    max: f64,
}

impl FloatParser {
    /// Creates a parser accepting `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidRange`] when `min > max` or a bound is NaN.
    pub fn new(min: f64, max: f64) -> Result<Self, RegistrationError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(RegistrationError::InvalidRange {
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(Self { min, max })
    }

    /// Full finite range of a floating point type key, `None` for other keys.
    pub fn type_bounds(key: &TypeKey) -> Option<(f64, f64)> {
        match key.canonical() {
            TypeKey::Float => Some((f32::MIN.into(), f32::MAX.into())),
            TypeKey::Double => Some((f64::MIN, f64::MAX)),
            _ => None,
        }
    }
}

impl<C> ArgumentParser<C> for FloatParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        let token = head(input)?;
        let parsed = token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= self.min && *value <= self.max);
        let Some(value) = parsed else {
            return Err(ParseFailure::new(
                ParseFailureReason::Number {
                    input: token.to_string(),
                    min: self.min.to_string(),
                    max: self.max.to_string(),
                },
                input.position(),
            ));
        };
        input.pop();
        Ok(ArgValue::Float(value))
    }
}

const STRICT_BOOLEANS: [(&str, bool); 2] = [("true", true), ("false", false)];
const LIBERAL_BOOLEANS: [(&str, bool); 6] = [
    ("true", true),
    ("false", false),
    ("yes", true),
    ("no", false),
    ("on", true),
    ("off", false),
];

/// Boolean parser; liberal mode also accepts `yes/no/on/off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanParser {
    liberal: bool,
}

impl BooleanParser {
    /// Creates a boolean parser.
    pub fn new(liberal: bool) -> Self {
        Self { liberal }
    }

    fn words(&self) -> &'static [(&'static str, bool)] {
        if self.liberal {
            &LIBERAL_BOOLEANS
        } else {
            &STRICT_BOOLEANS
        }
    }
}

impl<C> ArgumentParser<C> for BooleanParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        let token = head(input)?;
        let lowered = token.to_lowercase();
        let Some((_, value)) = self.words().iter().find(|(word, _)| *word == lowered) else {
            return Err(ParseFailure::new(
                ParseFailureReason::Boolean {
                    input: token.to_string(),
                },
                input.position(),
            ));
        };
        input.pop();
        Ok(ArgValue::Bool(*value))
    }

    fn suggestions(&self, _context: &CommandContext<C>, input: &str) -> Vec<String> {
        let lowered = input.to_lowercase();
        self.words()
            .iter()
            .map(|(word, _)| *word)
            .filter(|word| word.starts_with(&lowered))
            .map(str::to_string)
            .collect()
    }
}

/// Single character parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharParser;

impl<C> ArgumentParser<C> for CharParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        let token = head(input)?;
        let mut chars = token.chars();
        let (Some(value), None) = (chars.next(), chars.next()) else {
            return Err(ParseFailure::new(
                ParseFailureReason::Char {
                    input: token.to_string(),
                },
                input.position(),
            ));
        };
        input.pop();
        Ok(ArgValue::Char(value))
    }
}

/// String parser reading one token, or every remaining token in greedy mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringParser {
    greedy: bool,
}

impl StringParser {
    /// Reads exactly one token.
    pub fn single() -> Self {
        Self { greedy: false }
    }

    /// Joins every remaining token with one space.
    pub fn greedy() -> Self {
        Self { greedy: true }
    }

    /// Whether the parser consumes the rest of the input.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }
}

impl<C> ArgumentParser<C> for StringParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        head(input)?;
        if self.greedy {
            return Ok(ArgValue::Text(input.drain().join(" ")));
        }
        let token = input.pop().unwrap_or_default();
        Ok(ArgValue::Text(token))
    }
}

/// Accepts one word of a fixed set, ignoring case, and binds its canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceParser {
    choices: Vec<String>,
}

impl ChoiceParser {
    /// Creates a parser for `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidParameter`] for an empty set.
    pub fn new<I, S>(choices: I) -> Result<Self, RegistrationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = choices.into_iter().map(Into::into).collect::<Vec<_>>();
        if choices.is_empty() {
            return Err(RegistrationError::InvalidParameter {
                key: "choices".to_string(),
                message: "at least one choice is required".to_string(),
            });
        }
        Ok(Self { choices })
    }
}

impl<C> ArgumentParser<C> for ChoiceParser {
    fn parse(
        &self,
        _context: &CommandContext<C>,
        input: &mut TokenQueue,
    ) -> Result<ArgValue, ParseFailure> {
        let token = head(input)?;
        let Some(choice) = self
            .choices
            .iter()
            .find(|choice| choice.eq_ignore_ascii_case(token))
            .cloned()
        else {
            return Err(ParseFailure::new(
                ParseFailureReason::Choice {
                    input: token.to_string(),
                    choices: self.choices.clone(),
                },
                input.position(),
            ));
        };
        input.pop();
        Ok(ArgValue::Text(choice))
    }

    fn suggestions(&self, _context: &CommandContext<C>, input: &str) -> Vec<String> {
        let lowered = input.to_lowercase();
        self.choices
            .iter()
            .filter(|choice| choice.to_lowercase().starts_with(&lowered))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_one<P: ArgumentParser<()>>(parser: &P, raw: &str) -> Result<ArgValue, ParseFailure> {
        let mut queue = TokenQueue::from_input(raw);
        parser.parse(&CommandContext::new(()), &mut queue)
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let parser = IntegerParser::new(1, 10).expect("range");
        assert_eq!(parse_one(&parser, "1"), Ok(ArgValue::Int(1)));
        assert_eq!(parse_one(&parser, "10"), Ok(ArgValue::Int(10)));
        assert!(matches!(
            parse_one(&parser, "11").map_err(|failure| failure.reason),
            Err(ParseFailureReason::Number { .. })
        ));
        assert!(parse_one(&parser, "0").is_err());
        assert!(parse_one(&parser, "ten").is_err());
    }

    #[test]
    fn inverted_integer_range_is_rejected() {
        assert_eq!(
            IntegerParser::new(5, 1),
            Err(RegistrationError::InvalidRange {
                min: "5".to_string(),
                max: "1".to_string(),
            })
        );
    }

    #[test]
    fn failed_parse_leaves_queue_untouched() {
        let parser = IntegerParser::new(0, 5).expect("range");
        let mut queue = TokenQueue::from_input("9 2");
        let failure = parser
            .parse(&CommandContext::new(()), &mut queue)
            .expect_err("out of range");
        assert_eq!(failure.position, 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn integer_suggestions_stay_in_range() {
        let parser = IntegerParser::new(0, 25).expect("range");
        let context = CommandContext::new(());
        assert_eq!(
            ArgumentParser::<()>::suggestions(&parser, &context, "2"),
            vec!["2", "20", "21", "22", "23", "24", "25"]
        );
        assert!(ArgumentParser::<()>::suggestions(&parser, &context, "x").is_empty());
    }

    #[test]
    fn integer_suggestions_skip_non_canonical_spellings() {
        let parser = IntegerParser::new(0, 25).expect("range");
        let context = CommandContext::new(());
        assert!(ArgumentParser::<()>::suggestions(&parser, &context, "-").is_empty());
        assert_eq!(ArgumentParser::<()>::suggestions(&parser, &context, "0"), vec!["0"]);

        let signed = IntegerParser::new(-5, 5).expect("range");
        assert_eq!(
            ArgumentParser::<()>::suggestions(&signed, &context, "-"),
            vec!["-1", "-2", "-3", "-4", "-5"]
        );
    }

    #[test]
    fn float_rejects_non_finite_values() {
        let parser = FloatParser::new(f64::MIN, f64::MAX).expect("range");
        assert_eq!(parse_one(&parser, "2.5"), Ok(ArgValue::Float(2.5)));
        assert!(parse_one(&parser, "NaN").is_err());
        assert!(parse_one(&parser, "inf").is_err());
    }

    #[test]
    fn liberal_booleans_accept_words() {
        let parser = BooleanParser::new(true);
        assert_eq!(parse_one(&parser, "On"), Ok(ArgValue::Bool(true)));
        assert_eq!(parse_one(&parser, "no"), Ok(ArgValue::Bool(false)));
        assert!(parse_one(&BooleanParser::new(false), "yes").is_err());
    }

    #[test]
    fn greedy_string_joins_remaining_tokens() {
        let mut queue = TokenQueue::from_input("hello big world");
        let value = StringParser::greedy()
            .parse(&CommandContext::new(()), &mut queue)
            .expect("greedy");
        assert_eq!(value, ArgValue::Text("hello big world".to_string()));
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_queue_reports_no_input() {
        let failure = parse_one(&StringParser::single(), "").expect_err("empty");
        assert_eq!(failure.reason, ParseFailureReason::NoInput);
    }

    #[test]
    fn choices_bind_canonical_spelling() {
        let parser = ChoiceParser::new(["Fast", "Slow"]).expect("choices");
        assert_eq!(
            parse_one(&parser, "fast"),
            Ok(ArgValue::Text("Fast".to_string()))
        );
        assert!(parse_one(&parser, "medium").is_err());
    }

    #[test]
    fn char_parser_needs_exactly_one_character() {
        assert_eq!(parse_one(&CharParser, "x"), Ok(ArgValue::Char('x')));
        assert!(parse_one(&CharParser, "xy").is_err());
    }
}
