//! Cypher lexer: splits query text into structural tokens.
//!
//! The lexer is a small state machine over `char_indices`: structural text,
//! quoted string literal, backtick identifier, and comment. Literal content is
//! kept verbatim in a single token so later stages can never mistake it for a
//! keyword. Comments are dropped.
//!
//! Lexing never fails. Unterminated literals and comments are recorded as
//! [`Defect`]s and reported by the structural stage of the validator, so the
//! mutation scan still sees every structural token that precedes the defect.

use std::iter::Peekable;
use std::str::CharIndices;

/// Byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword.
    Word,
    /// Backtick-quoted identifier, backticks included.
    Quoted,
    /// Single- or double-quoted string, quotes included.
    StringLiteral,
    Number,
    /// `$name`, dollar included.
    Parameter,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Source text of the token, byte-for-byte.
    pub text: String,
    /// Whitespace or a comment separated this token from the previous one.
    pub spaced: bool,
}

impl Token {
    /// Structural word equal to `keyword`, ignoring ASCII case.
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    /// Identifier name with backticks removed; `None` for non-identifiers.
    pub fn identifier(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.clone()),
            TokenKind::Quoted => {
                let inner = self
                    .text
                    .strip_prefix('`')
                    .and_then(|s| s.strip_suffix('`'))
                    .unwrap_or(&self.text[1..]);
                Some(inner.replace("``", "`"))
            }
            _ => None,
        }
    }
}

/// Structural defect found while lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defect {
    UnterminatedString { start: usize },
    UnterminatedIdentifier { start: usize },
    UnterminatedComment { start: usize },
}

impl Defect {
    pub fn describe(&self) -> String {
        match self {
            Self::UnterminatedString { start } => {
                format!("Unterminated string literal starting at byte {start}")
            }
            Self::UnterminatedIdentifier { start } => {
                format!("Unterminated backtick identifier starting at byte {start}")
            }
            Self::UnterminatedComment { start } => {
                format!("Unterminated block comment starting at byte {start}")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub defects: Vec<Defect>,
}

const TWO_CHAR_PUNCT: [&str; 8] = ["->", "<-", "<>", "<=", ">=", "=~", "+=", ".."];

/// Tokenize a Cypher query string.
pub fn tokenize(input: &str) -> Lexed {
    let mut out = Lexed::default();
    let mut chars = input.char_indices().peekable();
    let mut spaced = false;

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
                spaced = true;
            }

            '/' if next_is(&chars, '*') => {
                chars.next();
                chars.next();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == '*' && matches!(chars.peek(), Some(&(_, '/'))) {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    out.defects.push(Defect::UnterminatedComment { start: pos });
                }
                spaced = true;
            }

            '/' if next_is(&chars, '/') => {
                while chars.peek().is_some_and(|&(_, c)| c != '\n') {
                    chars.next();
                }
                spaced = true;
            }

            '\'' | '"' => {
                chars.next();
                let mut end = None;
                while let Some((i, c)) = chars.next() {
                    if c == '\\' {
                        chars.next();
                    } else if c == ch {
                        end = Some(i + c.len_utf8());
                        break;
                    }
                }
                let end = end.unwrap_or_else(|| {
                    out.defects.push(Defect::UnterminatedString { start: pos });
                    input.len()
                });
                push(&mut out, input, TokenKind::StringLiteral, pos, end, &mut spaced);
            }

            '`' => {
                chars.next();
                let mut end = None;
                while let Some((i, c)) = chars.next() {
                    if c == '`' {
                        // `` is an escaped backtick inside the identifier.
                        if matches!(chars.peek(), Some(&(_, '`'))) {
                            chars.next();
                            continue;
                        }
                        end = Some(i + 1);
                        break;
                    }
                }
                let end = end.unwrap_or_else(|| {
                    out.defects.push(Defect::UnterminatedIdentifier { start: pos });
                    input.len()
                });
                push(&mut out, input, TokenKind::Quoted, pos, end, &mut spaced);
            }

            c if c.is_ascii_digit() => {
                let end = scan_number(&mut chars, input.len());
                push(&mut out, input, TokenKind::Number, pos, end, &mut spaced);
            }

            '$' => {
                chars.next();
                let end = scan_word(&mut chars, pos + 1, input.len());
                let kind = if end > pos + 1 {
                    TokenKind::Parameter
                } else {
                    TokenKind::Punct
                };
                push(&mut out, input, kind, pos, end, &mut spaced);
            }

            c if c.is_alphabetic() || c == '_' => {
                let end = scan_word(&mut chars, pos, input.len());
                push(&mut out, input, TokenKind::Word, pos, end, &mut spaced);
            }

            _ => {
                chars.next();
                let mut end = pos + ch.len_utf8();
                if let Some(&(_, next)) = chars.peek() {
                    let pair: String = [ch, next].iter().collect();
                    if TWO_CHAR_PUNCT.contains(&pair.as_str()) {
                        chars.next();
                        end += next.len_utf8();
                    }
                }
                push(&mut out, input, TokenKind::Punct, pos, end, &mut spaced);
            }
        }
    }

    out
}

/// Whether `name` can be written without backticks.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Render `name` as a Cypher identifier, backtick-quoting when needed.
pub fn render_identifier(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn next_is(chars: &Peekable<CharIndices<'_>>, expected: char) -> bool {
    matches!(chars.clone().nth(1), Some((_, c)) if c == expected)
}

fn push(out: &mut Lexed, input: &str, kind: TokenKind, start: usize, end: usize, spaced: &mut bool) {
    out.tokens.push(Token {
        kind,
        span: Span { start, end },
        text: input[start..end].to_string(),
        spaced: *spaced,
    });
    *spaced = false;
}

/// Consume identifier characters; returns the end offset.
fn scan_word(chars: &mut Peekable<CharIndices<'_>>, start: usize, len: usize) -> usize {
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            chars.next();
            end = i + c.len_utf8();
        } else {
            return end;
        }
    }
    end.min(len)
}

/// Consume an integer or decimal literal (with optional exponent).
fn scan_number(chars: &mut Peekable<CharIndices<'_>>, len: usize) -> usize {
    let mut ahead = chars.clone();
    if let (Some((_, '0')), Some((_, 'x' | 'X' | 'o' | 'O'))) = (ahead.next(), ahead.next()) {
        // Radix literal: the prefix and every following word character.
        chars.next();
        chars.next();
        while let Some(&(i, c)) = chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                return i;
            }
            chars.next();
        }
        return len;
    }

    let mut end = len;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while let Some(&(i, c)) = chars.peek() {
        let next = chars.clone().nth(1).map(|(_, n)| n);
        let accept = c.is_ascii_digit()
            || (c == '.' && !seen_dot && !seen_exp && next.is_some_and(|n| n.is_ascii_digit()))
            || ((c == 'e' || c == 'E')
                && !seen_exp
                && next.is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+'));
        if !accept {
            end = i;
            break;
        }
        if c == '.' {
            seen_dot = true;
        }
        chars.next();
        if c == 'e' || c == 'E' {
            seen_exp = true;
            if let Some(&(_, sign)) = chars.peek() {
                if sign == '-' || sign == '+' {
                    chars.next();
                }
            }
        }
    }
    end
}
