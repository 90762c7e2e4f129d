//! # rlang Expression Engine
//!
//! The expression language behind `select`, `where` and friends. Text goes
//! in one end, a typed stack program comes out the other:
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Tokenize | [`lexer`] | [`token::Lexeme`] stream |
//! | Parse | [`parser`] | postfix [`parser::PostfixItem`] list |
//! | Compile | [`compiler`] | type-checked [`vm::Program`] |
//! | Evaluate | [`vm`] | one [`vm::Value`] per record |
//!
//! [`registry`] is the shared static table of operators and functions:
//! the lexer matches spellings against it, the parser reads precedence
//! from it, and the compiler resolves overloads against it. Compilation
//! happens once per operator invocation; evaluation runs per record with
//! zero steady-state allocation (values borrow from the record buffers
//! and a caller-reset bump arena).

pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod token;
pub mod vm;

pub use compiler::{compile, compile_predicate, compile_select, CompileCtx, SelectList};
pub use registry::OpCode;
pub use vm::{EvalCtx, Insn, Literal, Program, RecordSlot, Value};
