//! Zylisp language core
//!
//! The pieces the REPL drives, leaves first:
//!
//! ```text
//! source --tokenize--> tokens --read--> Expr --eval(env)--> Value
//! ```

pub mod env;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use env::{Env, Snapshot};
pub use interpreter::{
    eval, load_primitives, EvalError, Interpreter, MAX_EVAL_DEPTH, PRIMITIVE_NAMES, SPECIAL_FORMS,
};
pub use lexer::{tokenize, LexError, Position, Token, TokenKind};
pub use parser::{read, Expr, ParseError};
pub use value::{Number, Value};
