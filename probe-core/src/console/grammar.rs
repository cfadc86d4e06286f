#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the probe console.
//!
//! `regal` splits a line into a bounded token stream; the command table in
//! [`catalog`](super::catalog) then decides which argument shape follows the
//! keyword. Literal values are decoded with `winnow` combinators.

use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::ascii::dec_int;
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;

use super::catalog::{self, ArgSpec, CommandTag};
use crate::config::ConfigField;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Optionally signed decimal literal.
    #[regex(r"-?[0-9]+")]
    Integer,
    /// Keyword, field name or flag word (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_]*")]
    Ident,
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError<'a> {
    Empty,
    UnknownCommand(&'a str),
    UnexpectedToken {
        expected: &'static str,
        found: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownField(&'a str),
    InvalidValue {
        lexeme: &'a str,
        span: Range<usize>,
    },
    InvalidToken {
        lexeme: &'a str,
        span: Range<usize>,
    },
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::Empty => f.write_str("empty command"),
            GrammarError::UnknownCommand(name) => write!(f, "unknown command `{name}`"),
            GrammarError::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found `{found}` at {span:?}"),
            GrammarError::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarError::UnknownField(name) => write!(f, "unknown field `{name}`"),
            GrammarError::InvalidValue { lexeme, span } => {
                write!(f, "invalid value `{lexeme}` at {span:?}")
            }
            GrammarError::InvalidToken { lexeme, span } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        match token {
            Some(token) if token.kind != TokenKind::Eol => GrammarError::UnexpectedToken {
                expected,
                found: token.lexeme,
                span: token.span.clone(),
            },
            _ => GrammarError::UnexpectedEnd { expected },
        }
    }

    fn invalid_value(token: &Token<'a>) -> Self {
        GrammarError::InvalidValue {
            lexeme: token.lexeme,
            span: token.span.clone(),
        }
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Arm,
    Disarm,
    Enable(bool),
    Trigger,
    Clear,
    Feedback(i64),
    Set { field: ConfigField, value: i64 },
    Get(ConfigField),
    Config,
    Tick(u32),
    Status,
    Reset,
    Check(Option<&'a str>),
    Help(Option<&'a str>),
}

/// Tokenize the provided line.
///
/// # Errors
///
/// Returns [`LexError::TooManyTokens`] when the line exceeds [`MAX_TOKENS`].
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: buffer.len() + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
///
/// # Errors
///
/// Returns [`ParseError`] for unknown keywords, malformed arguments or
/// trailing input.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::InvalidToken {
            lexeme: token.lexeme,
            span: token.span.clone(),
        }));
    }

    let mut input = tokens.as_slice();
    let command = command(&mut input).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = input.split_first() {
        if token.kind == TokenKind::Eol {
            input = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

type Input<'src, 'slice> = &'slice [Token<'src>];

fn command<'src>(input: &mut Input<'src, '_>) -> Result<Command<'src>, GrammarError<'src>> {
    let keyword = match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            token
        }
        Some((token, _)) if token.kind != TokenKind::Eol => {
            return Err(GrammarError::unexpected("command keyword", Some(token)));
        }
        _ => return Err(GrammarError::Empty),
    };

    let spec =
        catalog::find(keyword.lexeme).ok_or(GrammarError::UnknownCommand(keyword.lexeme))?;

    let command = match (spec.tag, spec.args) {
        (CommandTag::Feedback, ArgSpec::Integer) => Command::Feedback(integer_argument(input)?),
        (CommandTag::Enable, ArgSpec::Flag) => Command::Enable(flag_argument(input)?),
        (CommandTag::Set, ArgSpec::Assignment) => {
            let (field, value) = assignment(input)?;
            Command::Set { field, value }
        }
        (CommandTag::Get, ArgSpec::Field) => Command::Get(field_name(input)?),
        (CommandTag::Tick, ArgSpec::Count { default }) => Command::Tick(count(input, default)?),
        (CommandTag::Check, ArgSpec::Topic) => Command::Check(topic(input)),
        (CommandTag::Help, ArgSpec::Topic) => Command::Help(topic(input)),
        (CommandTag::Arm, _) => Command::Arm,
        (CommandTag::Disarm, _) => Command::Disarm,
        (CommandTag::Trigger, _) => Command::Trigger,
        (CommandTag::Clear, _) => Command::Clear,
        (CommandTag::Config, _) => Command::Config,
        (CommandTag::Status, _) => Command::Status,
        (CommandTag::Reset, _) => Command::Reset,
        (_, _) => return Err(GrammarError::unexpected(spec.usage, input.first())),
    };

    Ok(command)
}

fn expect_kind<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    kind: TokenKind,
    expected: &'static str,
) -> Result<&'slice Token<'src>, GrammarError<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token)
        }
        other => Err(GrammarError::unexpected(expected, other.map(|(token, _)| token))),
    }
}

fn integer_argument<'src>(input: &mut Input<'src, '_>) -> Result<i64, GrammarError<'src>> {
    let token = expect_kind(input, TokenKind::Integer, "integer")?;
    decode_integer(token)
}

fn flag_argument<'src>(input: &mut Input<'src, '_>) -> Result<bool, GrammarError<'src>> {
    let value = match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Integer => {
            *input = rest;
            match decode_integer(token)? {
                0 => 0,
                1 => 1,
                _ => return Err(GrammarError::invalid_value(token)),
            }
        }
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            flag_word()
                .parse(token.lexeme)
                .map_err(|_| GrammarError::invalid_value(token))?
        }
        other => {
            return Err(GrammarError::unexpected(
                "on or off",
                other.map(|(token, _)| token),
            ));
        }
    };
    Ok(value != 0)
}

fn field_name<'src>(input: &mut Input<'src, '_>) -> Result<ConfigField, GrammarError<'src>> {
    let token = expect_kind(input, TokenKind::Ident, "field name")?;
    ConfigField::from_name(token.lexeme).ok_or(GrammarError::UnknownField(token.lexeme))
}

fn assignment<'src>(
    input: &mut Input<'src, '_>,
) -> Result<(ConfigField, i64), GrammarError<'src>> {
    let field = field_name(input)?;
    expect_kind(input, TokenKind::Equals, "`=`")?;

    let value = match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Integer => {
            *input = rest;
            decode_integer(token)?
        }
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            flag_word()
                .parse(token.lexeme)
                .map_err(|_| GrammarError::invalid_value(token))?
        }
        other => {
            return Err(GrammarError::unexpected(
                "integer or flag word",
                other.map(|(token, _)| token),
            ));
        }
    };

    Ok((field, value))
}

fn count<'src>(input: &mut Input<'src, '_>, default: u32) -> Result<u32, GrammarError<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Integer => {
            *input = rest;
            let value = decode_integer(token)?;
            u32::try_from(value).map_err(|_| GrammarError::invalid_value(token))
        }
        _ => Ok(default),
    }
}

fn topic<'src>(input: &mut Input<'src, '_>) -> Option<&'src str> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Some(token.lexeme)
        }
        _ => None,
    }
}

fn decode_integer<'src>(token: &Token<'src>) -> Result<i64, GrammarError<'src>> {
    integer()
        .parse(token.lexeme)
        .map_err(|_| GrammarError::invalid_value(token))
}

fn integer<'a>() -> impl Parser<&'a str, i64, ContextError> {
    dec_int::<&'a str, i64, ContextError>
}

fn flag_word<'a>() -> impl Parser<&'a str, i64, ContextError> {
    alt((
        "true".value(1_i64),
        "on".value(1_i64),
        "false".value(0_i64),
        "off".value(0_i64),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_ok("arm"), Command::Arm);
        assert_eq!(parse_ok("disarm\r\n"), Command::Disarm);
        assert_eq!(parse_ok("enable off"), Command::Enable(false));
        assert_eq!(parse_ok("Enable 1"), Command::Enable(true));
        assert_eq!(parse_ok("  trigger  "), Command::Trigger);
        assert_eq!(parse_ok("clear"), Command::Clear);
        assert_eq!(parse_ok("status"), Command::Status);
        assert_eq!(parse_ok("RESET"), Command::Reset);
        assert_eq!(parse_ok("config"), Command::Config);
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_ok("set trig_out_voltage=-1200"),
            Command::Set {
                field: ConfigField::TrigOutVoltage,
                value: -1_200,
            }
        );
        assert_eq!(
            parse_ok("set auto_rearm_enable = on"),
            Command::Set {
                field: ConfigField::AutoRearmEnable,
                value: 1,
            }
        );
        assert_eq!(
            parse_ok("set monitor_enable=false"),
            Command::Set {
                field: ConfigField::MonitorEnable,
                value: 0,
            }
        );
    }

    #[test]
    fn tick_count_defaults_to_one() {
        assert_eq!(parse_ok("tick"), Command::Tick(1));
        assert_eq!(parse_ok("tick 250"), Command::Tick(250));
        assert!(matches!(
            parse("tick -3"),
            Err(ParseError::Grammar(GrammarError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn parses_optional_topics() {
        assert_eq!(parse_ok("help"), Command::Help(None));
        assert_eq!(parse_ok("help set"), Command::Help(Some("set")));
        assert_eq!(parse_ok("check ds1120a"), Command::Check(Some("ds1120a")));
        assert_eq!(
            parse_ok("get cooldown_interval"),
            Command::Get(ConfigField::CooldownInterval)
        );
        assert_eq!(parse_ok("feedback -450"), Command::Feedback(-450));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            parse("fire"),
            Err(ParseError::Grammar(GrammarError::UnknownCommand("fire")))
        );
        assert_eq!(
            parse("set cooldown=5"),
            Err(ParseError::Grammar(GrammarError::UnknownField("cooldown")))
        );
        assert!(matches!(
            parse("set monitor_enable=maybe"),
            Err(ParseError::Grammar(GrammarError::InvalidValue {
                lexeme: "maybe",
                ..
            }))
        ));
    }

    #[test]
    fn rejects_missing_and_trailing_arguments() {
        assert_eq!(
            parse("feedback"),
            Err(ParseError::Grammar(GrammarError::UnexpectedEnd {
                expected: "integer",
            }))
        );
        assert!(matches!(
            parse("arm now"),
            Err(ParseError::Grammar(GrammarError::UnexpectedToken {
                expected: "end of command",
                found: "now",
                ..
            }))
        ));
        assert_eq!(parse(""), Err(ParseError::Grammar(GrammarError::Empty)));
        assert_eq!(parse("\n"), Err(ParseError::Grammar(GrammarError::Empty)));
    }

    #[test]
    fn integer_overflow_is_an_invalid_value() {
        assert!(matches!(
            parse("feedback 99999999999999999999"),
            Err(ParseError::Grammar(GrammarError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn enable_takes_a_flag() {
        assert!(matches!(
            parse("enable maybe"),
            Err(ParseError::Grammar(GrammarError::InvalidValue { lexeme: "maybe", .. }))
        ));
        assert!(matches!(
            parse("enable 2"),
            Err(ParseError::Grammar(GrammarError::InvalidValue { lexeme: "2", .. }))
        ));
        assert_eq!(
            parse("enable"),
            Err(ParseError::Grammar(GrammarError::UnexpectedEnd {
                expected: "on or off",
            }))
        );
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("arm$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
        assert!(matches!(
            parse("arm$"),
            Err(ParseError::Grammar(GrammarError::InvalidToken { lexeme: "$", .. }))
        ));
    }
}
