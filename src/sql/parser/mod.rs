use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{Join, JoinType, Operator, OrderDirection, Predicate};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::types::{DataType, Value};

pub mod ast;
mod lexer;

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
///
/// Accepts exactly one statement, optionally terminated by `;`.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given SQL input
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses the input SQL statement into an AST
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        // No tokens allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
        }
        Ok(stmt)
    }

    /// Parses a statement based on the leading keyword
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Create)) => self.parse_create_table(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(Token::Keyword(Keyword::Drop)) => self.parse_drop_table(),
            Some(Token::Keyword(Keyword::Show)) => self.parse_show_tables(),
            Some(Token::Keyword(Keyword::Describe)) => self.parse_describe(),
            Some(t) => Err(Error::Parse(format!("[Parser] Unsupported query starting with {}", t))),
            None => Err(Error::Parse("[Parser] Unexpected end of input".into())),
        }
    }

    /// Parses CREATE TABLE statement
    fn parse_create_table(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Create))?;
        self.next_expect(Token::Keyword(Keyword::Table))?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::OpenParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        self.next_expect(Token::CloseParen)?;
        Ok(ast::Statement::CreateTable {
            name: table_name,
            columns,
        })
    }

    /// Parses column definition in CREATE TABLE
    fn parse_column_def(&mut self) -> Result<ast::Column> {
        let mut column = ast::Column {
            name: self.next_ident()?,
            datatype: match self.next()? {
                Token::Keyword(Keyword::Int) | Token::Keyword(Keyword::Integer) => DataType::Integer,
                Token::Keyword(Keyword::String)
                | Token::Keyword(Keyword::Text)
                | Token::Keyword(Keyword::Varchar) => DataType::String,
                Token::Keyword(Keyword::Bool) | Token::Keyword(Keyword::Boolean) => DataType::Boolean,
                Token::Keyword(Keyword::Decimal)
                | Token::Keyword(Keyword::Float)
                | Token::Keyword(Keyword::Double) => DataType::Decimal,
                token => return Err(Error::Parse(format!("[Parser] Unknown column type {}", token))),
            },
            nullable: None,
            primary_key: false,
            unique: false,
        };

        // Length hints such as VARCHAR(100) are accepted and ignored
        if self.next_if_token(Token::OpenParen).is_some() {
            match self.next()? {
                Token::Number(_) => {}
                token => return Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            }
            self.next_expect(Token::CloseParen)?;
        }

        // Parse column constraints (PRIMARY KEY, UNIQUE, NULL, NOT NULL)
        while let Some(Token::Keyword(keyword)) = self.next_if_keyword() {
            match keyword {
                Keyword::Primary => {
                    self.next_expect(Token::Keyword(Keyword::Key))?;
                    column.primary_key = true;
                }
                Keyword::Unique => column.unique = true,
                Keyword::Null => column.nullable = Some(true),
                Keyword::Not => {
                    self.next_expect(Token::Keyword(Keyword::Null))?;
                    column.nullable = Some(false);
                }
                k => return Err(Error::Parse(format!("[Parser] Unexpected keyword {}", k))),
            }
        }

        Ok(column)
    }

    /// Parses SELECT statement
    ///
    /// `SELECT <cols|*> FROM t [[INNER|LEFT|RIGHT] JOIN u ON a = b] [WHERE c <op> v] [ORDER BY c [ASC|DESC]]`
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;
        let columns = self.parse_select_columns()?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;

        let mut joins = Vec::new();
        if let Some(join_type) = self.parse_join_type()? {
            let table = self.next_ident()?;
            self.next_expect(Token::Keyword(Keyword::On))?;
            let left = self.parse_column_ref()?;
            self.next_expect(Token::Equal)?;
            let right = self.parse_column_ref()?;
            joins.push(Join {
                join_type,
                table,
                left,
                right,
            });
        }

        Ok(ast::Statement::Select {
            table_name,
            columns,
            joins,
            where_clause: self.parse_where_clause(true)?,
            order_by: self.parse_order_by()?,
        })
    }

    /// Parses the projection list; `*` yields an empty list
    fn parse_select_columns(&mut self) -> Result<Vec<(String, Option<String>)>> {
        let mut columns = Vec::new();
        if self.next_if_token(Token::Asterisk).is_some() {
            return Ok(columns);
        }
        loop {
            let col = self.parse_column_ref()?;
            let alias = match self.next_if_token(Token::Keyword(Keyword::As)) {
                Some(_) => Some(self.next_ident()?),
                None => None,
            };
            columns.push((col, alias));
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_join_type(&mut self) -> Result<Option<JoinType>> {
        let join_type = match self.peek()? {
            Some(Token::Keyword(Keyword::Join)) => JoinType::Inner,
            Some(Token::Keyword(Keyword::Inner)) => JoinType::Inner,
            Some(Token::Keyword(Keyword::Left)) => JoinType::Left,
            Some(Token::Keyword(Keyword::Right)) => JoinType::Right,
            _ => return Ok(None),
        };
        if self.next()? != Token::Keyword(Keyword::Join) {
            self.next_expect(Token::Keyword(Keyword::Join))?;
        }
        Ok(Some(join_type))
    }

    fn parse_order_by(&mut self) -> Result<Option<(String, OrderDirection)>> {
        if self.next_if_token(Token::Keyword(Keyword::Order)).is_none() {
            return Ok(None);
        }
        self.next_expect(Token::Keyword(Keyword::By))?;
        let col = self.parse_column_ref()?;
        let direction = if self.next_if_token(Token::Keyword(Keyword::Desc)).is_some() {
            OrderDirection::Desc
        } else {
            self.next_if_token(Token::Keyword(Keyword::Asc));
            OrderDirection::Asc
        };
        Ok(Some((col, direction)))
    }

    /// Parses INSERT statement
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;

        let table_name = self.next_ident()?;

        // Check if specific columns are specified
        let columns = if self.next_if_token(Token::OpenParen).is_some() {
            let mut cols = Vec::new();
            loop {
                let col = self.next_ident()?;
                if cols.contains(&col) {
                    return Err(Error::Parse(format!("[Parser] Duplicate column {}", col)));
                }
                cols.push(col);
                match self.next()? {
                    Token::CloseParen => break,
                    Token::Comma => {}
                    token => {
                        return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                    }
                }
            }
            Some(cols)
        } else {
            None
        };

        self.next_expect(Token::Keyword(Keyword::Values))?;
        self.next_expect(Token::OpenParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            match self.next()? {
                Token::CloseParen => break,
                Token::Comma => {}
                token => {
                    return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                }
            }
        }

        if let Some(cols) = &columns {
            if cols.len() != values.len() {
                return Err(Error::Parse(format!(
                    "[Parser] {} columns but {} values",
                    cols.len(),
                    values.len()
                )));
            }
        }

        Ok(ast::Statement::Insert {
            table_name,
            columns,
            values,
        })
    }

    /// Parses UPDATE statement
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Update))?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::Set))?;

        let mut columns = BTreeMap::new();
        loop {
            let col = self.next_ident()?;
            self.next_expect(Token::Equal)?;
            let value = self.parse_literal()?;
            if columns.contains_key(&col) {
                return Err(Error::Parse(format!(
                    "[Parser] Duplicate column {} for update",
                    col
                )));
            }
            columns.insert(col, value);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Update {
            table_name,
            columns,
            where_clause: self.parse_where_clause(false)?,
        })
    }

    /// Parses DELETE statement
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Delete))?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Delete {
            table_name,
            where_clause: self.parse_where_clause(false)?,
        })
    }

    fn parse_drop_table(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Drop))?;
        self.next_expect(Token::Keyword(Keyword::Table))?;
        Ok(ast::Statement::DropTable {
            name: self.next_ident()?,
        })
    }

    fn parse_show_tables(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Show))?;
        self.next_expect(Token::Keyword(Keyword::Tables))?;
        Ok(ast::Statement::ShowTables)
    }

    fn parse_describe(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Describe))?;
        Ok(ast::Statement::Describe {
            name: self.next_ident()?,
        })
    }

    /// Parses `WHERE column <op> literal`.
    /// UPDATE and DELETE only accept `=`; SELECT accepts `=`, `!=`, `>` and `<`.
    fn parse_where_clause(&mut self, range_operators: bool) -> Result<Option<Predicate>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None);
        }
        let column = self.parse_column_ref()?;
        let operator = match self.next()? {
            Token::Equal => Operator::Equal,
            Token::NotEqual if range_operators => Operator::NotEqual,
            Token::GreaterThan if range_operators => Operator::GreaterThan,
            Token::LessThan if range_operators => Operator::LessThan,
            token => {
                return Err(Error::Parse(format!(
                    "[Parser] Unsupported WHERE operator {}",
                    token
                )))
            }
        };
        let value = self.parse_literal()?;
        Ok(Some(Predicate {
            column,
            operator,
            value,
        }))
    }

    /// Parses a column reference, optionally qualified by a table name
    fn parse_column_ref(&mut self) -> Result<String> {
        let mut name = self.next_ident()?;
        if self.next_if_token(Token::Period).is_some() {
            name.push('.');
            name.push_str(&self.next_ident()?);
        }
        Ok(name)
    }

    /// Parses a literal value.
    ///
    /// Quoted text binds as a string, TRUE/FALSE as booleans, NULL as null and
    /// anything numeric as a number; any other bare word binds as text.
    fn parse_literal(&mut self) -> Result<Value> {
        Ok(match self.next()? {
            Token::String(s) => Value::String(s),
            Token::Number(n) => Self::parse_number(&n)?,
            Token::Period => self.parse_fraction("")?,
            Token::Minus => match self.next()? {
                Token::Number(n) => Self::parse_number(&format!("-{}", n))?,
                Token::Period => self.parse_fraction("-")?,
                t => return Err(Error::Parse(format!("[Parser] Unexpected token {} after -", t))),
            },
            Token::Keyword(Keyword::True) => Value::Boolean(true),
            Token::Keyword(Keyword::False) => Value::Boolean(false),
            Token::Keyword(Keyword::Null) => Value::Null,
            Token::Ident(word) => Value::String(word),
            t => {
                return Err(Error::Parse(format!(
                    "[Parser] Unexpected expression token {}",
                    t
                )))
            }
        })
    }

    /// Finishes a literal written without its integer part, such as `.5`
    fn parse_fraction(&mut self, sign: &str) -> Result<Value> {
        match self.next()? {
            Token::Number(n) if !n.contains('.') => Ok(Value::Float(format!("{}0.{}", sign, n).parse()?)),
            t => Err(Error::Parse(format!("[Parser] Unexpected token {} after .", t))),
        }
    }

    /// Lexer scans 123, 123.45 and 1e3 as Token::Number; anything that is not an i64 becomes a float
    fn parse_number(n: &str) -> Result<Value> {
        match n.parse::<i64>() {
            Ok(i) => Ok(Value::Integer(i)),
            Err(_) => Ok(Value::Float(n.parse()?)),
        }
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("[Parser] Unexpected end of input".into())))
    }

    /// Expects and consumes a name. Every name position is followed by fixed
    /// syntax, so keywords are accepted there too and read back in lowercase.
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            Token::Keyword(k) => Ok(k.to_str().to_lowercase()),
            token => Err(Error::Parse(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it's a keyword
    fn next_if_keyword(&mut self) -> Option<Token> {
        self.next_if(|t| matches!(t, Token::Keyword(_)))
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}
