//! SQL Lexer - Tokenizes SQL input text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the SQL input
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// SQL reserved keyword
    Keyword(Keyword),
    /// Identifier such as table name or column name, case preserved
    Ident(String),
    /// String literal
    String(String),
    /// Numeric literal (integer or floating-point)
    Number(String),
    /// Operators and punctuation
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Asterisk,
    Minus,
    Period,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Asterisk => "*",
            Token::Minus => "-",
            Token::Period => ".",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::GreaterThan => ">",
            Token::LessThan => "<",
        })
    }
}

/// SQL reserved keywords
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    // Statement keywords
    Select,
    Insert,
    Into,
    Values,
    Create,
    Table,
    Update,
    Set,
    Delete,
    Drop,
    Show,
    Tables,
    Describe,
    // Clause keywords
    From,
    Join,
    Inner,
    Left,
    Right,
    On,
    Where,
    Order,
    By,
    Asc,
    Desc,
    As,
    // Data type keywords
    Int,
    Integer,
    String,
    Text,
    Varchar,
    Boolean,
    Bool,
    Decimal,
    Float,
    Double,
    // Constraint keywords
    Primary,
    Key,
    Unique,
    Not,
    // Literal keywords
    Null,
    True,
    False,
}

impl Keyword {
    /// Attempts to parse a string as a keyword (case-insensitive)
    pub fn from_str(ident: &str) -> Option<Keyword> {
        Some(match ident.to_uppercase().as_ref() {
            "SELECT" => Keyword::Select,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "VALUES" => Keyword::Values,
            "CREATE" => Keyword::Create,
            "TABLE" => Keyword::Table,
            "UPDATE" => Keyword::Update,
            "SET" => Keyword::Set,
            "DELETE" => Keyword::Delete,
            "DROP" => Keyword::Drop,
            "SHOW" => Keyword::Show,
            "TABLES" => Keyword::Tables,
            "DESCRIBE" => Keyword::Describe,
            "FROM" => Keyword::From,
            "JOIN" => Keyword::Join,
            "INNER" => Keyword::Inner,
            "LEFT" => Keyword::Left,
            "RIGHT" => Keyword::Right,
            "ON" => Keyword::On,
            "WHERE" => Keyword::Where,
            "ORDER" => Keyword::Order,
            "BY" => Keyword::By,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "AS" => Keyword::As,
            "INT" => Keyword::Int,
            "INTEGER" => Keyword::Integer,
            "STRING" => Keyword::String,
            "TEXT" => Keyword::Text,
            "VARCHAR" => Keyword::Varchar,
            "BOOLEAN" => Keyword::Boolean,
            "BOOL" => Keyword::Bool,
            "DECIMAL" => Keyword::Decimal,
            "FLOAT" => Keyword::Float,
            "DOUBLE" => Keyword::Double,
            "PRIMARY" => Keyword::Primary,
            "KEY" => Keyword::Key,
            "UNIQUE" => Keyword::Unique,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            _ => return None,
        })
    }

    /// Returns the uppercase string representation of the keyword
    pub fn to_str(&self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::Insert => "INSERT",
            Keyword::Into => "INTO",
            Keyword::Values => "VALUES",
            Keyword::Create => "CREATE",
            Keyword::Table => "TABLE",
            Keyword::Update => "UPDATE",
            Keyword::Set => "SET",
            Keyword::Delete => "DELETE",
            Keyword::Drop => "DROP",
            Keyword::Show => "SHOW",
            Keyword::Tables => "TABLES",
            Keyword::Describe => "DESCRIBE",
            Keyword::From => "FROM",
            Keyword::Join => "JOIN",
            Keyword::Inner => "INNER",
            Keyword::Left => "LEFT",
            Keyword::Right => "RIGHT",
            Keyword::On => "ON",
            Keyword::Where => "WHERE",
            Keyword::Order => "ORDER",
            Keyword::By => "BY",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::As => "AS",
            Keyword::Int => "INT",
            Keyword::Integer => "INTEGER",
            Keyword::String => "STRING",
            Keyword::Text => "TEXT",
            Keyword::Varchar => "VARCHAR",
            Keyword::Boolean => "BOOLEAN",
            Keyword::Bool => "BOOL",
            Keyword::Decimal => "DECIMAL",
            Keyword::Float => "FLOAT",
            Keyword::Double => "DOUBLE",
            Keyword::Primary => "PRIMARY",
            Keyword::Key => "KEY",
            Keyword::Unique => "UNIQUE",
            Keyword::Not => "NOT",
            Keyword::Null => "NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// SQL lexical analyzer (lexer/tokenizer)
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Parse(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given SQL text
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Peeks and consumes if the character maps to a token (for single-char tokens)
    fn next_if_token<F: Fn(char) -> Option<Token>>(&mut self, predicate: F) -> Option<Token> {
        let token = self.iter.peek().and_then(|c| predicate(*c))?;
        self.iter.next();
        Some(token)
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some('\'') => self.scan_string(),
            Some('!') => self.scan_not_equal(),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans a string literal (enclosed in single quotes, `''` escapes a quote)
    fn scan_string(&mut self) -> Result<Option<Token>> {
        self.iter.next();
        let mut val = String::new();

        loop {
            match self.iter.next() {
                Some('\'') if self.next_if(|c| c == '\'').is_some() => val.push('\''),
                Some('\'') => break,
                Some(c) => val.push(c),
                None => return Err(Error::Parse("[Lexer] Unexpected end of string".into())),
            }
        }
        Ok(Some(Token::String(val)))
    }

    /// Scans a numeric literal (integer, fraction and optional exponent).
    /// Digits followed by a letter or `_` scan as an identifier instead, so
    /// names such as `2024_sales` are accepted.
    fn scan_number(&mut self) -> Option<Token> {
        let mut val = self.next_while(|c| c.is_ascii_digit())?;
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        } else if !self.exponent_follows()
            && self.iter.peek().is_some_and(|c| c.is_alphabetic() || *c == '_')
        {
            while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
                val.push(c);
            }
            return Some(Token::Ident(val));
        }
        if self.exponent_follows() {
            val.extend(self.iter.next());
            val.extend(self.next_if(|c| c == '+' || c == '-'));
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        Some(Token::Number(val))
    }

    /// Whether the input continues with `e`/`E`, an optional sign and a digit
    fn exponent_follows(&self) -> bool {
        let mut ahead = self.iter.clone();
        if !ahead.next().is_some_and(|c| c == 'e' || c == 'E') {
            return false;
        }
        if ahead.next_if(|c| *c == '+' || *c == '-').is_some() {
            return ahead.next().is_some_and(|c| c.is_ascii_digit());
        }
        ahead.next().is_some_and(|c| c.is_ascii_digit())
    }

    /// Scans an identifier or keyword
    fn scan_ident(&mut self) -> Option<Token> {
        let mut val = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        // Returns Keyword if matched, otherwise returns as a regular Ident
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    /// Scans `!=`, the only token starting with `!`
    fn scan_not_equal(&mut self) -> Result<Option<Token>> {
        self.iter.next();
        match self.next_if(|c| c == '=') {
            Some(_) => Ok(Some(Token::NotEqual)),
            None => Err(Error::Parse("[Lexer] Expected = after !".into())),
        }
    }

    /// Scans a single-character symbol token
    fn scan_symbol(&mut self) -> Option<Token> {
        self.next_if_token(|c| match c {
            '*' => Some(Token::Asterisk),
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '-' => Some(Token::Minus),
            '.' => Some(Token::Period),
            '=' => Some(Token::Equal),
            '>' => Some(Token::GreaterThan),
            '<' => Some(Token::LessThan),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        error::Result,
        sql::parser::lexer::{Keyword, Token},
    };

    #[test]
    fn test_lexer_create_table() -> Result<()> {
        let tokens = Lexer::new(
            "CREATE table users
                (
                    id integer primary key,
                    email STRING unique not null
                );
                ",
        )
        .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Create),
                Token::Keyword(Keyword::Table),
                Token::Ident("users".to_string()),
                Token::OpenParen,
                Token::Ident("id".to_string()),
                Token::Keyword(Keyword::Integer),
                Token::Keyword(Keyword::Primary),
                Token::Keyword(Keyword::Key),
                Token::Comma,
                Token::Ident("email".to_string()),
                Token::Keyword(Keyword::String),
                Token::Keyword(Keyword::Unique),
                Token::Keyword(Keyword::Not),
                Token::Keyword(Keyword::Null),
                Token::CloseParen,
                Token::Semicolon
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_insert_into() -> Result<()> {
        let tokens = Lexer::new("INSERT INTO Users (id, name) values (-100, 'It''s, ok', 4.55, true)")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Insert),
                Token::Keyword(Keyword::Into),
                Token::Ident("Users".to_string()),
                Token::OpenParen,
                Token::Ident("id".to_string()),
                Token::Comma,
                Token::Ident("name".to_string()),
                Token::CloseParen,
                Token::Keyword(Keyword::Values),
                Token::OpenParen,
                Token::Minus,
                Token::Number("100".to_string()),
                Token::Comma,
                Token::String("It's, ok".to_string()),
                Token::Comma,
                Token::Number("4.55".to_string()),
                Token::Comma,
                Token::Keyword(Keyword::True),
                Token::CloseParen,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_select() -> Result<()> {
        let tokens = Lexer::new("select t.a from t where b != 3 and c>1")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Ident("t".to_string()),
                Token::Period,
                Token::Ident("a".to_string()),
                Token::Keyword(Keyword::From),
                Token::Ident("t".to_string()),
                Token::Keyword(Keyword::Where),
                Token::Ident("b".to_string()),
                Token::NotEqual,
                Token::Number("3".to_string()),
                Token::Ident("and".to_string()),
                Token::Ident("c".to_string()),
                Token::GreaterThan,
                Token::Number("1".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_numbers_and_names() -> Result<()> {
        let tokens = Lexer::new("2024_sales 7up .5 1e3 2.5E-2 3e x.9")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Ident("2024_sales".to_string()),
                Token::Ident("7up".to_string()),
                Token::Period,
                Token::Number("5".to_string()),
                Token::Number("1e3".to_string()),
                Token::Number("2.5E-2".to_string()),
                Token::Ident("3e".to_string()),
                Token::Ident("x".to_string()),
                Token::Period,
                Token::Number("9".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("select 'abc").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a ! b").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a # b").collect::<Result<Vec<_>>>().is_err());
    }
}
