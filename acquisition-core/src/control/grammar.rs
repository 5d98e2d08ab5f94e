#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the acquisition control line.
//!
//! The lexer uses `regal` to produce a bounded token stream; the parser composes
//! `winnow` combinators over those tokens and then converts literal lexemes into
//! typed values. Keywords are matched case-insensitively.
//!
//! ```text
//! start | stop | reset | status
//! timing <ch> [open=<dur>] [delay=<dur>] [read=<n>|<dur>]
//! enable <ch> | disable <ch>
//! fault clear
//! help [topic]
//! ```

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::any;

use crate::config::ReadWindow;

/// Maximum number of tokens produced per control line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;
/// Assignments accepted by a single `timing` command.
pub const MAX_TIMING_ASSIGNMENTS: usize = 3;

/// Lexical token kinds recognized by the control grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Equals sign for key/value assignments.
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
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
        lexeme: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                lexeme,
                span,
                ..
            } => write!(f, "expected {expected}, found `{}` at {span:?}", lexeme.escape_debug()),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) if tok.kind != TokenKind::Eol => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: tok.kind,
                    lexeme: tok.lexeme,
                    span: tok.span.clone(),
                },
                _ => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }

    /// Byte range of the offending input, when there is one.
    #[must_use]
    pub fn span(&self) -> Option<Range<usize>> {
        match &self.kind {
            GrammarErrorKind::UnexpectedToken { span, .. }
            | GrammarErrorKind::InvalidInteger { span }
            | GrammarErrorKind::InvalidDuration { span }
            | GrammarErrorKind::InvalidToken { span, .. } => Some(span.clone()),
            GrammarErrorKind::UnexpectedEnd { .. } => None,
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
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Stop,
    Reset,
    Status,
    Timing(TimingCommand),
    Enable(u8),
    Disable(u8),
    FaultClear,
    Help(HelpCommand<'a>),
}

/// Partial timing update; unset fields keep their configured value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimingCommand {
    pub channel: u8,
    pub led_on: Option<Duration>,
    pub settle: Option<Duration>,
    pub read: Option<ReadWindow>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

type Input<'src, 'slice> = &'slice [Token<'src>];
type TokenResult<O> = Result<O, ErrMode<ContextError>>;

/// `key=value` pair inside a `timing` command, still as raw tokens.
#[derive(Clone, Debug)]
struct Assignment<'src> {
    key: Token<'src>,
    value: Token<'src>,
}

/// Tokenize the provided line.
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
            processed: MAX_TOKENS + 1,
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

/// Parse a control command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut input = tokens.as_slice();
    let command = command(&mut input).map_err(ParseError::Grammar)?;

    match input.iter().find(|token| token.kind != TokenKind::Eol) {
        Some(token) => Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        ))),
        None => Ok(command),
    }
}

/// Matches one token of `kind` without consuming anything on a mismatch.
fn token<'src, 'slice>(kind: TokenKind) -> impl FnMut(&mut Input<'src, 'slice>) -> TokenResult<Token<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        any.verify_map(|candidate: Token<'src>| (candidate.kind == kind).then_some(candidate))
            .parse_next(input)
    }
}

fn assignment<'src, 'slice>(input: &mut Input<'src, 'slice>) -> TokenResult<Assignment<'src>>
where
    'src: 'slice,
{
    let (key, _, value) = (
        token(TokenKind::Ident),
        token(TokenKind::Equals),
        alt((token(TokenKind::Duration), token(TokenKind::Integer))),
    )
        .parse_next(input)?;
    Ok(Assignment { key, value })
}

fn expect<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    kind: TokenKind,
    label: &'static str,
) -> Result<Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    token(kind)
        .parse_next(input)
        .map_err(|_| GrammarError::unexpected(label, input.first()))
}

fn command<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Result<Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    let snapshot = *input;
    let keyword = expect(input, TokenKind::Ident, "command keyword")?;

    match_keyword(keyword.lexeme, input).unwrap_or_else(|| {
        *input = snapshot;
        Err(GrammarError::unexpected("command keyword", Some(&keyword)))
    })
}

fn match_keyword<'src, 'slice>(
    keyword: &str,
    input: &mut Input<'src, 'slice>,
) -> Option<Result<Command<'src>, GrammarError<'src>>>
where
    'src: 'slice,
{
    let is = |name: &str| keyword.eq_ignore_ascii_case(name);

    let command = if is("start") {
        Ok(Command::Start)
    } else if is("stop") {
        Ok(Command::Stop)
    } else if is("reset") {
        Ok(Command::Reset)
    } else if is("status") {
        Ok(Command::Status)
    } else if is("timing") {
        timing(input).map(Command::Timing)
    } else if is("enable") {
        channel_number(input).map(Command::Enable)
    } else if is("disable") {
        channel_number(input).map(Command::Disable)
    } else if is("fault") {
        fault(input)
    } else if is("help") {
        help(input).map(Command::Help)
    } else {
        return None;
    };

    Some(command)
}

fn channel_number<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Result<u8, GrammarError<'src>>
where
    'src: 'slice,
{
    let token = expect(input, TokenKind::Integer, "channel number")?;
    parse_integer(&token)
}

fn timing<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Result<TimingCommand, GrammarError<'src>>
where
    'src: 'slice,
{
    let mut command = TimingCommand {
        channel: channel_number(input)?,
        ..TimingCommand::default()
    };

    let mut assignments: HeaplessVec<Assignment<'src>, MAX_TIMING_ASSIGNMENTS> = HeaplessVec::new();
    while let Ok(Some(next)) = opt(assignment).parse_next(input) {
        if assignments.push(next).is_err() {
            return Err(GrammarError::unexpected("end of command", input.first()));
        }
    }

    if assignments.is_empty() {
        return Err(GrammarError::unexpected("timing assignment", input.first()));
    }

    for Assignment { key, value } in &assignments {
        if key.lexeme.eq_ignore_ascii_case("open") {
            command.led_on = Some(duration_value(value)?);
        } else if key.lexeme.eq_ignore_ascii_case("delay") {
            command.settle = Some(duration_value(value)?);
        } else if key.lexeme.eq_ignore_ascii_case("read") {
            command.read = Some(match value.kind {
                TokenKind::Integer => ReadWindow::Samples(parse_integer(value)?),
                _ => ReadWindow::Duration(parse_duration(value)?),
            });
        } else {
            return Err(GrammarError::unexpected("open, delay or read", Some(key)));
        }
    }

    Ok(command)
}

fn fault<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Result<Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    let action = expect(input, TokenKind::Ident, "clear")?;
    if action.lexeme.eq_ignore_ascii_case("clear") {
        Ok(Command::FaultClear)
    } else {
        Err(GrammarError::unexpected("clear", Some(&action)))
    }
}

fn help<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Result<HelpCommand<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    let topic = opt(token(TokenKind::Ident))
        .parse_next(input)
        .map_err(|_| GrammarError::unexpected("topic", input.first()))?;
    Ok(HelpCommand {
        topic: topic.map(|token| token.lexeme),
    })
}

fn duration_value<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    match token.kind {
        TokenKind::Duration => parse_duration(token),
        _ => Err(GrammarError::unexpected("duration", Some(token))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u8, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u8>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
