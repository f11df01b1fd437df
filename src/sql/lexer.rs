/// SQL Lexer - converts SQL text into tokens

use super::token::{Keyword, Token, TokenType};
use crate::error::{Result, SyntaxError};

/// Tokenize a complete SQL source. The result always ends with exactly one `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    input: Vec<char>,
    position: usize,
    byte_offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.chars().collect(),
            position: 0,
            byte_offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                break;
            }
            let ch = self.current_char();
            let next = self.peek_char();
            if (ch == '-' && next == Some('-')) || (ch == '/' && next == Some('/')) {
                self.skip_line_comment();
            } else if ch == '/' && next == Some('*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }

        let start = self.byte_offset;
        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, "", start, line, column));
        }

        let ch = self.current_char();

        let token_type = match ch {
            '\'' | '"' => self.read_string(ch)?,
            '`' => self.read_quoted_identifier()?,
            '0'..='9' => self.read_number(),
            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),

            '=' => self.single(TokenType::Eq),
            '<' => {
                self.advance();
                match self.current_char() {
                    '=' => {
                        self.advance();
                        if self.current_char() == '>' {
                            self.advance();
                            TokenType::NullSafeEq
                        } else {
                            TokenType::Le
                        }
                    }
                    '>' => self.single(TokenType::Ne),
                    '<' => self.single(TokenType::ShiftLeft),
                    _ => TokenType::Lt,
                }
            }
            '>' => {
                self.advance();
                match self.current_char() {
                    '=' => self.single(TokenType::Ge),
                    '>' => self.single(TokenType::ShiftRight),
                    _ => TokenType::Gt,
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(TokenType::Ne)
                } else {
                    TokenType::Bang
                }
            }
            '|' => {
                self.advance();
                if self.current_char() == '|' {
                    self.single(TokenType::DoublePipe)
                } else {
                    TokenType::Pipe
                }
            }
            '&' => {
                self.advance();
                if self.current_char() == '&' {
                    self.single(TokenType::DoubleAmpersand)
                } else {
                    TokenType::Ampersand
                }
            }
            '+' => self.single(TokenType::Plus),
            '-' => self.single(TokenType::Minus),
            '*' => self.single(TokenType::Star),
            '/' => self.single(TokenType::Slash),
            '%' => self.single(TokenType::Percent),
            '^' => self.single(TokenType::Caret),
            '~' => self.single(TokenType::Tilde),
            '(' => self.single(TokenType::LParen),
            ')' => self.single(TokenType::RParen),
            ',' => self.single(TokenType::Comma),
            ';' => self.single(TokenType::Semicolon),
            '.' => self.single(TokenType::Dot),
            ':' => self.single(TokenType::Colon),
            '?' => self.single(TokenType::Question),
            '@' => self.single(TokenType::At),
            _ => {
                return Err(self.error_at(
                    format!("Unexpected character '{}'", ch),
                    start,
                    line,
                    column,
                ));
            }
        };

        let text = &self.source[start..self.byte_offset];
        Ok(Token::new(token_type, text, start, line, column))
    }

    fn single(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        token_type
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            let ch = self.input[self.position];
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.byte_offset += ch.len_utf8();
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && matches!(self.current_char(), ' ' | '\t' | '\r' | '\n') {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let (start, line, column) = (self.byte_offset, self.line, self.column);
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(self.error_at("Unterminated block comment", start, line, column))
    }

    fn read_string(&mut self, quote: char) -> Result<TokenType> {
        let (start, line, column) = (self.byte_offset, self.line, self.column);
        self.advance(); // skip opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(self.error_at("Unterminated string literal", start, line, column));
            }
            let ch = self.current_char();
            if ch == quote {
                // A doubled quote is an escaped quote
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance(); // skip closing quote
                break;
            }
            if ch == '\\' {
                self.advance();
                if self.is_eof() {
                    return Err(self.error_at("Unterminated string literal", start, line, column));
                }
                let escaped = match self.current_char() {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    c => c,
                };
                value.push(escaped);
            } else {
                value.push(ch);
            }
            self.advance();
        }

        Ok(TokenType::String(value))
    }

    fn read_quoted_identifier(&mut self) -> Result<TokenType> {
        let (start, line, column) = (self.byte_offset, self.line, self.column);
        self.advance(); // skip opening backtick
        let mut value = String::new();

        while !self.is_eof() && self.current_char() != '`' {
            value.push(self.current_char());
            self.advance();
        }

        if self.is_eof() {
            return Err(self.error_at("Unterminated quoted identifier", start, line, column));
        }

        self.advance(); // skip closing backtick
        Ok(TokenType::Identifier(value))
    }

    fn read_number(&mut self) -> TokenType {
        let mut value = String::new();
        let mut seen_dot = false;

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                value.push(ch);
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                value.push(ch);
            } else {
                break;
            }
            self.advance();
        }

        // Scientific notation (e.g. 1.5e10); only when digits follow
        if matches!(self.current_char(), 'e' | 'E') {
            let sign = self.peek_char();
            let digit_follows = match sign {
                Some('+') | Some('-') => self
                    .input
                    .get(self.position + 2)
                    .is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if digit_follows {
                value.push(self.current_char());
                self.advance();
                if matches!(self.current_char(), '+' | '-') {
                    value.push(self.current_char());
                    self.advance();
                }
                while !self.is_eof() && self.current_char().is_ascii_digit() {
                    value.push(self.current_char());
                    self.advance();
                }
            }
        }

        TokenType::Number(value)
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match Keyword::lookup(&value) {
            Some(keyword) => TokenType::Keyword(keyword),
            None => TokenType::Identifier(value),
        }
    }

    fn error_at(&self, message: impl Into<String>, offset: usize, line: usize, column: usize) -> crate::error::DbError {
        SyntaxError::new(message, offset, line, column).into()
    }
}
