/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use crate::errors::WisniaError;

/// Integer literals must fit in a signed 32-bit value; the upper bound is
/// inclusive (`2147483647` is valid, `2147483648` is not).
const MAX_INT_LITERAL: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ident(String),
    // keywords
    Fn,
    Class,
    New,
    Def,
    Rem,
    If,
    Elif,
    Else,
    While,
    For,
    Foreach,
    In,
    Return,
    Break,
    Continue,
    Print,
    Read,
    TypeInt,
    TypeFloat,
    TypeBool,
    TypeString,
    TypeVoid,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Arrow,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

fn keyword(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "fn" => Fn,
        "class" => Class,
        "new" => New,
        "def" => Def,
        "rem" => Rem,
        "if" => If,
        "elif" => Elif,
        "else" => Else,
        "while" => While,
        "for" => For,
        "for_each" => Foreach,
        "in" => In,
        "return" => Return,
        "break" => Break,
        "continue" => Continue,
        "print" => Print,
        "read" => Read,
        "int" => TypeInt,
        "float" => TypeFloat,
        "bool" => TypeBool,
        "string" => TypeString,
        "void" => TypeVoid,
        "true" => Bool(true),
        "false" => Bool(false),
        _ => return None,
    })
}

/// A hand-rolled scanner over the source text, producing a flat token
/// stream. Errors are split into two kinds: [`WisniaError::Lexer`] for a
/// character (or literal) the scanner cannot tokenize at all — an
/// unrecognized byte, an unterminated string or block comment, a numeric
/// literal followed directly by non-numeric "garbage" — and
/// [`WisniaError::Token`] for a literal that scans cleanly but fails a
/// post-hoc validity check, namely a 32-bit integer overflow.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source: source.as_bytes(), pos: 0, line: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, WisniaError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), WisniaError> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(WisniaError::lexer(
                                    start_line,
                                    "unterminated block comment",
                                ));
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token, WisniaError> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, line });
        };

        if c.is_ascii_digit() {
            return self.scan_number(line);
        }
        if c == b'"' {
            return self.scan_string(line);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return self.scan_ident_or_keyword(line);
        }

        use TokenKind::*;
        let kind = match c {
            b'+' => {
                self.advance();
                Plus
            }
            b'-' => {
                self.advance();
                if self.peek() == Some(b'>') {
                    self.advance();
                    Arrow
                } else {
                    Minus
                }
            }
            b'*' => {
                self.advance();
                Star
            }
            b'/' => {
                self.advance();
                Slash
            }
            b'=' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Eq
                } else {
                    Assign
                }
            }
            b'!' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Neq
                } else {
                    Bang
                }
            }
            b'<' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Le
                } else {
                    Lt
                }
            }
            b'>' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ge
                } else {
                    Gt
                }
            }
            b'&' => {
                self.advance();
                if self.peek() == Some(b'&') {
                    self.advance();
                    AndAnd
                } else {
                    return Err(WisniaError::lexer(line, "expected '&&'"));
                }
            }
            b'|' => {
                self.advance();
                if self.peek() == Some(b'|') {
                    self.advance();
                    OrOr
                } else {
                    return Err(WisniaError::lexer(line, "expected '||'"));
                }
            }
            b'(' => {
                self.advance();
                LParen
            }
            b')' => {
                self.advance();
                RParen
            }
            b'{' => {
                self.advance();
                LBrace
            }
            b'}' => {
                self.advance();
                RBrace
            }
            b',' => {
                self.advance();
                Comma
            }
            b';' => {
                self.advance();
                Semicolon
            }
            b':' => {
                self.advance();
                Colon
            }
            b'.' => {
                self.advance();
                Dot
            }
            other => {
                return Err(WisniaError::lexer(
                    line,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        Ok(Token { kind, line })
    }

    fn scan_number(&mut self, line: usize) -> Result<Token, WisniaError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();

        // A literal directly followed by an identifier character (e.g.
        // `123abc`, `1.2.3`) is a malformed literal, not a literal
        // immediately followed by an unrelated token.
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == b'_')
            || (self.peek() == Some(b'.') && !is_float)
        {
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'.') {
                self.advance();
            }
            let full = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
            return Err(WisniaError::lexer(line, format!("numeric literal with trailing garbage '{full}'")));
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| WisniaError::token(line, format!("invalid float literal '{text}'")))?;
            Ok(Token { kind: TokenKind::Float(value), line })
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| WisniaError::token(line, format!("invalid integer literal '{text}'")))?;
            if value > MAX_INT_LITERAL {
                return Err(WisniaError::token(
                    line,
                    format!("integer literal '{text}' exceeds the 32-bit signed maximum"),
                ));
            }
            Ok(Token { kind: TokenKind::Int(value), line })
        }
    }

    fn scan_string(&mut self, line: usize) -> Result<Token, WisniaError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(WisniaError::lexer(line, "unterminated string literal")),
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'"') => value.push('"'),
                        Some(b'\\') => value.push('\\'),
                        Some(other) => value.push(other as char),
                        None => return Err(WisniaError::lexer(line, "unterminated string literal")),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c as char);
                }
            }
        }
        Ok(Token { kind: TokenKind::Str(value), line })
    }

    fn scan_ident_or_keyword(&mut self, line: usize) -> Result<Token, WisniaError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let kind = keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        Ok(Token { kind, line })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(kinds("fn main"), vec![TokenKind::Fn, TokenKind::Ident("main".into()), TokenKind::Eof]);
    }

    #[test]
    fn scans_two_char_operators_before_one_char() {
        assert_eq!(
            kinds("a == b != c <= d >= e -> f"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Eq,
                TokenKind::Ident("b".into()),
                TokenKind::Neq,
                TokenKind::Ident("c".into()),
                TokenKind::Le,
                TokenKind::Ident("d".into()),
                TokenKind::Ge,
                TokenKind::Ident("e".into()),
                TokenKind::Arrow,
                TokenKind::Ident("f".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_int_and_float_literals() {
        assert_eq!(kinds("42 3.14"), vec![TokenKind::Int(42), TokenKind::Float(3.14), TokenKind::Eof]);
    }

    #[test]
    fn int_literal_at_32_bit_max_is_accepted() {
        assert_eq!(kinds("2147483647"), vec![TokenKind::Int(2147483647), TokenKind::Eof]);
    }

    #[test]
    fn int_literal_exceeding_32_bit_max_is_a_token_error() {
        let err = Lexer::new("2147483648").tokenize().unwrap_err();
        assert!(matches!(err, WisniaError::Token { .. }));
    }

    #[test]
    fn scans_string_literal_with_escapes() {
        assert_eq!(kinds(r#""hi\n""#), vec![TokenKind::Str("hi\n".into()), TokenKind::Eof]);
    }

    #[test]
    fn string_literal_payload_preserves_embedded_newline() {
        let tokens = kinds(r#""a\nb""#);
        assert_eq!(tokens, vec![TokenKind::Str("a\nb".into()), TokenKind::Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let tokens = Lexer::new("a\nb\nc").tokenize().unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn line_comment_runs_to_end_of_line() {
        assert_eq!(
            kinds("a // comment here\nb"),
            vec![TokenKind::Ident("a".into()), TokenKind::Ident("b".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn block_comment_is_skipped() {
        assert_eq!(
            kinds("a /* comment \n spanning lines */ b"),
            vec![TokenKind::Ident("a".into()), TokenKind::Ident("b".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment_is_a_lexer_error() {
        let err = Lexer::new("a /* never closed").tokenize().unwrap_err();
        assert!(matches!(err, WisniaError::Lexer { .. }));
    }

    #[test]
    fn unterminated_string_is_a_lexer_error() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(err, WisniaError::Lexer { .. }));
    }

    #[test]
    fn unknown_character_is_a_lexer_error() {
        let err = Lexer::new("@").tokenize().unwrap_err();
        assert!(matches!(err, WisniaError::Lexer { .. }));
    }

    #[test]
    fn numeric_literal_with_trailing_garbage_is_a_lexer_error() {
        let err = Lexer::new("123abc").tokenize().unwrap_err();
        assert!(matches!(err, WisniaError::Lexer { .. }));
    }
}
