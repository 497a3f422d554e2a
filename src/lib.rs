//! PesaDB - a minimal single-process relational engine
//!
//! This crate provides:
//! - SQL parsing (lexer, recursive-descent parser, AST)
//! - Plan building and execution with constraint enforcement and nested-loop joins
//! - A table catalog mirrored to pluggable key-value storage engines

pub mod config;
pub mod error;
pub mod sql;
pub mod storage;
