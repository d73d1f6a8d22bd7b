use std::iter::FusedIterator;

use log::{debug, info};
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and" => TokenType::AND,
    b"class" => TokenType::CLASS,
    b"else" => TokenType::ELSE,
    b"false" => TokenType::FALSE,
    b"fun" => TokenType::FUN,
    b"for" => TokenType::FOR,
    b"if" => TokenType::IF,
    b"nil" => TokenType::NIL,
    b"or" => TokenType::OR,
    b"print" => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super" => TokenType::SUPER,
    b"this" => TokenType::THIS,
    b"true" => TokenType::TRUE,
    b"var" => TokenType::VAR,
    b"while" => TokenType::WHILE,
};

/// Single-pass maximal-munch scanner over raw source bytes.
///
/// Yields `Result<Token>`: lexical errors come out as `Err` items in
/// sequence with the tokens, so the caller can keep scanning after an error.
/// The stream always ends with one `EOF` token.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    source: &'a [u8],
    start: usize,
    curr_ptr: usize,
    line: usize,
    emitted_eof: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        info!("Initializing Scanner with buffer of {} bytes", source.len());
        Self {
            source,
            start: 0,
            curr_ptr: 0,
            line: 1,
            emitted_eof: false,
        }
    }

    /// Scans one lexeme.  `Ok(None)` means the lexeme produces no token
    /// (whitespace, comments); the caller keeps scanning.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let byte: u8 = self.advance();

        let token_type = match byte {
            b'(' => TokenType::LEFT_PAREN,

            b')' => TokenType::RIGHT_PAREN,

            b'{' => TokenType::LEFT_BRACE,

            b'}' => TokenType::RIGHT_BRACE,

            b',' => TokenType::COMMA,

            b'.' => TokenType::DOT,

            b'-' => TokenType::MINUS,

            b'+' => TokenType::PLUS,

            b';' => TokenType::SEMICOLON,

            b'*' => TokenType::STAR,

            b'!' => {
                if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }

            b'=' => {
                if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }

            b'<' => {
                if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }

            b'>' => {
                if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'/' => {
                if self.match_byte(b'/') {
                    debug!("Skipping comment on line {}", self.line);
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                    return Ok(None);
                } else {
                    TokenType::SLASH
                }
            }

            b'"' => self.scan_string()?,

            b'0'..=b'9' => self.scan_number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),

            _ => {
                debug!(
                    "Unexpected character '{}' at line {}",
                    byte as char, self.line
                );

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", byte as char),
                ));
            }
        };

        Ok(Some(token_type))
    }

    /// Strings are delimited by double quotes and may span lines.  Escape
    /// sequences are not interpreted; a backslash is an ordinary byte.
    fn scan_string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        // Closing quote.
        self.advance();

        let literal =
            String::from_utf8_lossy(&self.source[self.start + 1..self.curr_ptr - 1]).into_owned();

        debug!("Scanned string literal: {}", literal);

        Ok(TokenType::STRING(literal))
    }

    fn scan_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing dot without a fractional digit is not part of the number.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = String::from_utf8_lossy(&self.source[self.start..self.curr_ptr]);
        let number: f64 = text.parse().unwrap_or(0.0);

        debug!("Scanned number: {}", number);

        TokenType::NUMBER(number)
    }

    fn scan_identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        let text: &[u8] = &self.source[self.start..self.curr_ptr];

        match KEYWORDS.get(text) {
            Some(token_type) => token_type.clone(),
            None => TokenType::IDENTIFIER,
        }
    }

    #[inline]
    fn advance(&mut self) -> u8 {
        let byte = self.source[self.curr_ptr];
        self.curr_ptr += 1;
        byte
    }

    #[inline]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.curr_ptr] != expected {
            false
        } else {
            self.curr_ptr += 1;
            true
        }
    }

    #[inline]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.curr_ptr]
        }
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        if self.curr_ptr + 1 >= self.source.len() {
            0
        } else {
            self.source[self.curr_ptr + 1]
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.curr_ptr >= self.source.len()
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_at_end() {
                if self.emitted_eof {
                    return None;
                }

                self.emitted_eof = true;

                debug!("Reached EOF at line {}", self.line);

                return Some(Ok(Token::new(TokenType::EOF, String::new(), self.line)));
            }

            self.start = self.curr_ptr;

            match self.scan_token() {
                Ok(Some(token_type)) => {
                    let lexeme =
                        String::from_utf8_lossy(&self.source[self.start..self.curr_ptr])
                            .into_owned();

                    return Some(Ok(Token::new(token_type, lexeme, self.line)));
                }

                // Whitespace or comment: keep scanning.
                Ok(None) => continue,

                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl FusedIterator for Scanner<'_> {}
