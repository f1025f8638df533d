//! Splits SPICE text into logical lines of tokens.

use std::iter::Peekable;
use std::vec::IntoIter;

use arcstr::ArcStr;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1, take_while};
use nom::sequence::preceded;
use nom::IResult;
use thiserror::Error;

use super::Substr;

const CONTINUATION: char = '+';
const META_PREFIX: &str = "*.";

/// A SPICE token.
///
/// Tokens keep the case of the input text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Token {
    /// A word starting with a dot, such as `.subckt` or `.ends`.
    Directive(Substr),
    /// A metadata directive such as `*.PININFO`, without the `*.` prefix.
    MetaDirective(Substr),
    /// Any other word.
    Ident(Substr),
    /// `=`.
    Equals,
}

impl Token {
    pub(crate) fn try_ident(&self) -> Result<&Substr, super::ParserError> {
        match self {
            Self::Ident(x) => Ok(x),
            _ => Err(super::ParserError::UnexpectedToken(self.clone())),
        }
    }
}

/// A lexical error.
#[derive(Debug, Clone, Error)]
#[error("{message} on line {line}: `{text}`")]
pub struct TokenizerError {
    /// The 1-based line number.
    pub line: usize,
    /// What went wrong.
    pub message: ArcStr,
    /// The offending line.
    pub text: Substr,
}

#[inline]
fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

#[inline]
fn is_separator(c: char) -> bool {
    is_blank(c) || c == '='
}

fn word(input: &str) -> IResult<&str, &str> {
    preceded(take_while(is_blank), alt((tag("="), take_till1(is_separator))))(input)
}

/// Appends the tokens of one physical line to `tokens`, stopping at a comment.
fn lex(line: &Substr, tokens: &mut Vec<Token>) {
    let mut rest = line.as_str();
    while let Ok((tail, w)) = word(rest) {
        rest = tail;
        let w = Substr::from(line.substr_from(w));
        let token = if w.as_str() == "=" {
            Token::Equals
        } else if tokens.is_empty() && w.starts_with(META_PREFIX) {
            Token::MetaDirective(Substr::from(w.substr(META_PREFIX.len()..)))
        } else if w.starts_with(['*', '$']) {
            break;
        } else if w.starts_with('.') {
            Token::Directive(w)
        } else {
            Token::Ident(w)
        };
        tokens.push(token);
    }
}

/// Yields logical lines, joining `+` continuations and dropping comments.
pub(crate) struct Lexer {
    lines: Peekable<IntoIter<(usize, Substr)>>,
}

impl Lexer {
    pub(crate) fn new(data: &Substr) -> Self {
        let lines: Vec<(usize, Substr)> = data
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, Substr::from(data.substr_from(line))))
            .collect();
        Self {
            lines: lines.into_iter().peekable(),
        }
    }

    /// Returns the tokens of the next logical line that has any.
    pub(crate) fn next_line(&mut self) -> Result<Option<Vec<Token>>, TokenizerError> {
        while let Some((number, line)) = self.lines.next() {
            if line.trim_start().starts_with(CONTINUATION) {
                return Err(TokenizerError {
                    line: number,
                    message: arcstr::literal!("line continuation without a preceding line"),
                    text: line,
                });
            }
            let mut tokens = Vec::new();
            lex(&line, &mut tokens);
            if tokens.is_empty() {
                continue;
            }
            while let Some((_, next)) = self
                .lines
                .next_if(|(_, l)| l.trim_start().starts_with(CONTINUATION))
            {
                let body = &next.trim_start()[CONTINUATION.len_utf8()..];
                lex(&Substr::from(next.substr_from(body)), &mut tokens);
            }
            return Ok(Some(tokens));
        }
        Ok(None)
    }
}
