use std::fmt;
use std::fmt::{Display, Formatter};

use crate::peach::common::error::ErrorInfo;

/// Scanning never fails: characters that fit no other rule end up in identifiers or numbers, and
/// the parser reports whatever doesn't make sense.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).get_lexems()
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // Single-character tokens.
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    Equal,
    Bang,
    Pipe,
    Ampersand,
    // Multi-character tokens.
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    Spaceship,
    Arrow,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    AndAnd,
    OrOr,
    // Keywords.
    Let,
    Func,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Return,
    Import,
    Macro,
    Mixin,
    True,
    False,
    Null,

    StringLiteral(String),
    // Kept as written; the parser decides the radix and whether it is a float.
    NumberLiteral(String),
    Identifier(String),

    Eof,
}

impl TokenType {
    pub fn string_literal<S: Into<String>>(str: S) -> Self { TokenType::StringLiteral(str.into()) }
    pub fn number_literal<S: Into<String>>(str: S) -> Self { TokenType::NumberLiteral(str.into()) }
    pub fn identifier<S: Into<String>>(str: S) -> Self { TokenType::Identifier(str.into()) }

    /// The source text this token was scanned from (modulo whitespace and string escapes).
    pub fn lexeme(&self) -> String {
        let fixed = match self {
            TokenType::OpenParen => "(",
            TokenType::CloseParen => ")",
            TokenType::OpenBrace => "{",
            TokenType::CloseBrace => "}",
            TokenType::OpenBracket => "[",
            TokenType::CloseBracket => "]",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Colon => ":",
            TokenType::Dot => ".",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Less => "<",
            TokenType::Greater => ">",
            TokenType::Equal => "=",
            TokenType::Bang => "!",
            TokenType::Pipe => "|",
            TokenType::Ampersand => "&",
            TokenType::LessEqual => "<=",
            TokenType::GreaterEqual => ">=",
            TokenType::EqualEqual => "==",
            TokenType::BangEqual => "!=",
            TokenType::Spaceship => "<=>",
            TokenType::Arrow => "->",
            TokenType::PlusEqual => "+=",
            TokenType::MinusEqual => "-=",
            TokenType::StarEqual => "*=",
            TokenType::SlashEqual => "/=",
            TokenType::AndAnd => "&&",
            TokenType::OrOr => "||",
            TokenType::Let => "let",
            TokenType::Func => "func",
            TokenType::If => "if",
            TokenType::Elif => "elif",
            TokenType::Else => "else",
            TokenType::While => "while",
            TokenType::For => "for",
            TokenType::In => "in",
            TokenType::Return => "return",
            TokenType::Import => "import",
            TokenType::Macro => "macro",
            TokenType::Mixin => "mixin",
            TokenType::True => "true",
            TokenType::False => "false",
            TokenType::Null => "null",
            TokenType::StringLiteral(s) => return escape_string(s),
            TokenType::NumberLiteral(s) | TokenType::Identifier(s) => return s.to_owned(),
            TokenType::Eof => "",
        };
        fixed.to_owned()
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Eof => f.write_str("end of input"),
            other => write!(f, "'{}'", other.lexeme()),
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

/// Renders tokens back into source text that scans to the same token sequence.
pub fn render_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.r#type.lexeme()).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub row: usize,
    pub col: usize,
    pub r#type: TokenType,
}

impl Token {
    pub fn new(row: usize, col: usize, r#type: TokenType) -> Self {
        Token { row, col, r#type }
    }
    pub fn get_type(&self) -> &TokenType { &self.r#type }

    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.row, self.col)
    }
}

// Longest entries first, so maximal munch is a first-match scan.
const PUNCTUATION: &[&str] = &[
    "<=>", "<=", ">=", "==", "!=", "->", "+=", "-=", "*=", "/=", "&&", "||",
    "(", ")", "{", "}", "[", "]", ",", ";", ":", ".", "+", "-", "*", "/", "%", "<", ">", "=", "!", "|", "&",
];

fn punctuation_type(text: &str) -> Option<TokenType> {
    let result = match text {
        "<=>" => TokenType::Spaceship,
        "<=" => TokenType::LessEqual,
        ">=" => TokenType::GreaterEqual,
        "==" => TokenType::EqualEqual,
        "!=" => TokenType::BangEqual,
        "->" => TokenType::Arrow,
        "+=" => TokenType::PlusEqual,
        "-=" => TokenType::MinusEqual,
        "*=" => TokenType::StarEqual,
        "/=" => TokenType::SlashEqual,
        "&&" => TokenType::AndAnd,
        "||" => TokenType::OrOr,
        "(" => TokenType::OpenParen,
        ")" => TokenType::CloseParen,
        "{" => TokenType::OpenBrace,
        "}" => TokenType::CloseBrace,
        "[" => TokenType::OpenBracket,
        "]" => TokenType::CloseBracket,
        "," => TokenType::Comma,
        ";" => TokenType::Semicolon,
        ":" => TokenType::Colon,
        "." => TokenType::Dot,
        "+" => TokenType::Plus,
        "-" => TokenType::Minus,
        "*" => TokenType::Star,
        "/" => TokenType::Slash,
        "%" => TokenType::Percent,
        "<" => TokenType::Less,
        ">" => TokenType::Greater,
        "=" => TokenType::Equal,
        "!" => TokenType::Bang,
        "|" => TokenType::Pipe,
        "&" => TokenType::Ampersand,
        _ => return None,
    };
    Some(result)
}

fn starts_punctuation(c: char) -> bool {
    PUNCTUATION.iter().any(|p| p.starts_with(c))
}

struct Lexer {
    chars: Vec<char>,
    current: usize,
    row: usize,
    col: usize,
    lexems: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            current: 0,
            row: 1,
            col: 1,
            lexems: Vec::new(),
        }
    }

    pub fn get_lexems(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.scan_token();
        }
        self.lexems
    }

    fn is_at_end(&self) -> bool { self.current >= self.chars.len() }

    fn add_token_type(&mut self, row: usize, col: usize, tt: TokenType) {
        self.lexems.push(Token::new(row, col, tt));
    }

    fn scan_token(&mut self) {
        let (row, col) = (self.row, self.col);
        let c = self.chars[self.current];
        match c {
            c if c.is_whitespace() => { self.advance(); }
            '/' if self.peek_n_test(1, '*') => self.skip_multiline_comment(),
            '/' if self.peek_n_test(1, '/') => self.skip_line_comment(),
            '"' => {
                let literal = self.read_string_literal();
                self.add_token_type(row, col, literal)
            }
            _ => match self.read_punctuation() {
                Some(tt) => self.add_token_type(row, col, tt),
                None => {
                    let word = self.read_word();
                    self.add_token_type(row, col, word)
                }
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let result = self.chars.get(self.current).copied();
        if let Some(c) = result {
            self.current += 1;
            if c == '\n' {
                self.row += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        result
    }

    fn peek_test<F: CharTest>(&self, f: F) -> bool {
        self.peek_n_test(0, f)
    }
    fn peek_n_test<F: CharTest>(&self, n: usize, f: F) -> bool {
        self.chars.get(self.current + n).map(|e| f.char_test(*e)).unwrap_or(false)
    }

    fn skip_line_comment(&mut self) {
        while self.peek_test(negated_char_test('\n')) {
            self.advance();
        }
    }

    // An unterminated comment swallows the rest of the input.
    fn skip_multiline_comment(&mut self) {
        self.advance();
        self.advance();
        while !self.is_at_end() && !(self.peek_test('*') && self.peek_n_test(1, '/')) {
            self.advance();
        }
        self.advance();
        self.advance();
    }

    fn read_punctuation(&mut self) -> Option<TokenType> {
        for p in PUNCTUATION {
            let len = p.chars().count();
            let matches = self.current + len <= self.chars.len()
                && p.chars().zip(&self.chars[self.current..]).all(|(a, b)| a == *b);
            if matches {
                for _ in 0..len {
                    self.advance();
                }
                return punctuation_type(p);
            }
        }
        None
    }

    fn read_string_literal(&mut self) -> TokenType {
        self.advance(); // Skip opening "
        let mut result = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => break,
                '\\' => match self.advance() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some(other) => result.push(other),
                    None => break,
                },
                c => result.push(c),
            }
        }
        TokenType::string_literal(result)
    }

    fn read_word(&mut self) -> TokenType {
        let mut word = String::new();
        let numeric = self.peek_test(|c: char| c.is_ascii_digit());
        while let Some(&c) = self.chars.get(self.current) {
            let fractional_dot = c == '.'
                && numeric
                && !word.contains('.')
                && self.peek_n_test(1, |c: char| c.is_ascii_digit());
            if c.is_whitespace() || c == '"' || (starts_punctuation(c) && !fractional_dot) {
                break;
            }
            word.push(c);
            self.advance();
        }
        if numeric {
            TokenType::number_literal(word)
        } else {
            Lexer::get_keyword(&word).unwrap_or(TokenType::Identifier(word))
        }
    }

    fn get_keyword(word: &str) -> Option<TokenType> {
        match word {
            "let" => Some(TokenType::Let),
            "func" => Some(TokenType::Func),
            "if" => Some(TokenType::If),
            "elif" => Some(TokenType::Elif),
            "else" => Some(TokenType::Else),
            "while" => Some(TokenType::While),
            "for" => Some(TokenType::For),
            "in" => Some(TokenType::In),
            "return" => Some(TokenType::Return),
            "import" => Some(TokenType::Import),
            "macro" => Some(TokenType::Macro),
            "mixin" => Some(TokenType::Mixin),
            "true" => Some(TokenType::True),
            "false" => Some(TokenType::False),
            "null" => Some(TokenType::Null),
            _ => None,
        }
    }
}

trait CharTest {
    fn char_test(&self, c: char) -> bool;
}

fn negated_char_test(c: char) -> impl CharTest {
    move |c2| { c2 != c }
}

impl CharTest for char {
    fn char_test(&self, c: char) -> bool { self == &c }
}

impl<F> CharTest for F where F: Fn(char) -> bool {
    fn char_test(&self, c: char) -> bool { self(c) }
}
