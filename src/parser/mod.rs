//! Rule text parser
//!
//! Parses textual fuzzy rules into explicit antecedent trees:
//!
//! ```text
//! rule    := "IF" expr "THEN" ident "IS" ident
//! expr    := term ("OR" term)*
//! term    := factor ("AND" factor)*
//! factor  := "(" expr ")" | ident "IS" ident
//! ident   := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! Keywords are case-insensitive and AND binds tighter than OR. The parser
//! only checks syntax; variable and set names are resolved when the rule is
//! added to a rule base.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{eof, map, not, recognize, verify},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::{EngineError, ErrorCode};
use crate::fuzzy::{Antecedent, Consequent, Rule};

const KEYWORDS: [&str; 5] = ["if", "then", "and", "or", "is"];

/// Rule text error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleSyntaxError {
    #[error("syntax error at position {position} in rule '{text}': {message}")]
    Syntax {
        position: usize,
        message: String,
        text: String,
    },

    #[error("empty rule text")]
    Empty,
}

impl From<RuleSyntaxError> for EngineError {
    fn from(err: RuleSyntaxError) -> Self {
        let position = match &err {
            RuleSyntaxError::Syntax { position, .. } => Some(*position),
            RuleSyntaxError::Empty => None,
        };
        let mut out = EngineError::new(ErrorCode::RuleSyntax, err.to_string())
            .with_hint("expected: IF <variable> IS <set> [AND|OR ...] THEN <variable> IS <set>");
        if let Some(position) = position {
            out = out.with_context("position", position.to_string());
        }
        out
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Skip leading whitespace before `inner`
fn lexeme<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(multispace0, inner)
}

/// A keyword not directly followed by an identifier character
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    lexeme(terminated(tag_no_case(kw), not(satisfy(is_ident_char))))
}

/// Identifier that is not a keyword
fn ident(input: &str) -> IResult<&str, &str> {
    lexeme(verify(
        recognize(pair(take_while1(is_ident_start), take_while(is_ident_char))),
        |word: &str| !is_keyword(word),
    ))(input)
}

// ============================================================================
// Grammar
// ============================================================================

/// `variable IS set`
fn proposition(input: &str) -> IResult<&str, (&str, &str)> {
    map(tuple((ident, keyword("is"), ident)), |(variable, _, set)| (variable, set))(input)
}

fn factor(input: &str) -> IResult<&str, Antecedent> {
    alt((
        delimited(lexeme(char('(')), expr, lexeme(char(')'))),
        map(proposition, |(variable, set)| Antecedent::is(variable, set)),
    ))(input)
}

fn term(input: &str) -> IResult<&str, Antecedent> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(preceded(keyword("and"), factor))(input)?;
    Ok((input, rest.into_iter().fold(first, Antecedent::and)))
}

fn expr(input: &str) -> IResult<&str, Antecedent> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(preceded(keyword("or"), term))(input)?;
    Ok((input, rest.into_iter().fold(first, Antecedent::or)))
}

fn rule(input: &str) -> IResult<&str, Rule> {
    map(
        tuple((
            keyword("if"),
            expr,
            keyword("then"),
            proposition,
            lexeme(eof),
        )),
        |(_, antecedent, _, (variable, set), _)| Rule::new(antecedent, Consequent::new(variable, set)),
    )(input)
}

// ============================================================================
// Public API
// ============================================================================

/// Parse `IF ... THEN variable IS set`
pub fn parse_rule(text: &str) -> Result<Rule, RuleSyntaxError> {
    run(text, rule, "expected IF <condition> THEN <variable> IS <set>")
}

/// Parse a bare antecedent expression such as `speed IS high AND distance IS close`
pub fn parse_antecedent(text: &str) -> Result<Antecedent, RuleSyntaxError> {
    run(
        text,
        |input| terminated(expr, lexeme(eof))(input),
        "expected <variable> IS <set> joined by AND/OR",
    )
}

fn run<'a, O>(
    text: &'a str,
    mut parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
    expectation: &str,
) -> Result<O, RuleSyntaxError> {
    if text.trim().is_empty() {
        return Err(RuleSyntaxError::Empty);
    }
    match parser(text) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(RuleSyntaxError::Syntax {
            position: text.len() - e.input.len(),
            message: expectation.to_string(),
            text: text.to_string(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(RuleSyntaxError::Syntax {
            position: text.len(),
            message: "unexpected end of input".to_string(),
            text: text.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_rejects_keywords() {
        assert_eq!(ident("  speed rest").unwrap(), (" rest", "speed"));
        assert!(ident("then").is_err());
        assert_eq!(ident("island").unwrap().1, "island");
    }

    #[test]
    fn test_parse_simple_rule() {
        let rule = parse_rule("IF distance IS close AND speed IS high THEN action IS brake").unwrap();
        assert_eq!(
            rule.antecedent,
            Antecedent::is("distance", "close").and(Antecedent::is("speed", "high"))
        );
        assert_eq!(rule.consequent, Consequent::new("action", "brake"));
        assert_eq!(rule.weight, 1.0);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let a = parse_rule("if road_condition is poor then action is brake").unwrap();
        let b = parse_rule("If road_condition Is poor THEN action iS brake").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let ante = parse_antecedent("a IS x OR b IS y AND c IS z").unwrap();
        assert_eq!(
            ante,
            Antecedent::is("a", "x").or(Antecedent::is("b", "y").and(Antecedent::is("c", "z")))
        );
    }

    #[test]
    fn test_parentheses_group() {
        let ante = parse_antecedent("(a IS x OR b IS y) AND c IS z").unwrap();
        assert_eq!(
            ante,
            Antecedent::is("a", "x").or(Antecedent::is("b", "y")).and(Antecedent::is("c", "z"))
        );
    }

    #[test]
    fn test_display_round_trip() {
        let text = "IF distance IS close AND (speed IS high OR speed IS medium) THEN action IS brake";
        let rule = parse_rule(text).unwrap();
        assert_eq!(rule.to_string(), text);
        assert_eq!(parse_rule(&rule.to_string()).unwrap(), rule);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_rule("   ").unwrap_err(), RuleSyntaxError::Empty);

        for bad in [
            "distance IS close THEN action IS brake",
            "IF distance IS close",
            "IF distance close THEN action IS brake",
            "IF (distance IS close THEN action IS brake",
            "IF distance IS close THEN action IS brake extra",
            "IF distance IS close AND THEN action IS brake",
        ] {
            let err = parse_rule(bad).unwrap_err();
            assert!(matches!(err, RuleSyntaxError::Syntax { .. }), "accepted: {}", bad);
        }
    }

    #[test]
    fn test_error_converts_to_engine_error() {
        let err: EngineError = parse_rule("IF x THEN y").unwrap_err().into();
        assert_eq!(err.code, ErrorCode::RuleSyntax);
        assert!(err.is_declaration_error());
        assert!(err.hint.is_some());
    }
}
