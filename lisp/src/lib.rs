pub mod ast;
pub mod closure;
pub mod error;
pub mod forms;
pub mod interpret;
pub mod lex;
pub mod parse;
pub mod primitives;
pub mod repl;
pub mod symtab;
