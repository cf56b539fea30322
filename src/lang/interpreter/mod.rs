//! Tree-walking interpreter
//!
//! Special forms: `quote`, `if`, `define`, `lambda`, `let`, `begin`.
//! Everything else is a function application.

mod primitives;

use std::sync::Arc;

use tracing::trace;

use crate::lang::env::Env;
use crate::lang::parser::Expr;
use crate::lang::value::{Lambda, Value};

pub use primitives::{load_primitives, PRIMITIVE_NAMES};

/// Maximum nesting of `eval` calls before giving up
pub const MAX_EVAL_DEPTH: usize = 1024;

/// Names the reader treats as special forms
pub const SPECIAL_FORMS: &[&str] = &["quote", "if", "define", "lambda", "let", "begin"];

/// Evaluation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound symbol: {0}")]
    Unbound(String),

    #[error("not a function: {0}")]
    NotCallable(String),

    #[error("{name}: expected {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("{op}: expected {expected}, got {found}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}: empty list")]
    EmptyList(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0}: integer overflow")]
    Overflow(&'static str),

    #[error("malformed {form}: {message}")]
    Syntax {
        form: &'static str,
        message: String,
    },

    #[error("maximum recursion depth ({0}) exceeded")]
    RecursionLimit(usize),
}

impl EvalError {
    pub(crate) fn syntax(
        form: &'static str,
        message: impl Into<String>,
    ) -> Self {
        EvalError::Syntax {
            form,
            message: message.into(),
        }
    }
}

/// Evaluate `expr` against `env`, discarding side-channel output
pub fn eval(
    expr: &Expr,
    env: &Env,
) -> Result<Value, EvalError> {
    Interpreter::new().eval(expr, env)
}

/// Evaluation state for one top-level expression
#[derive(Debug, Default)]
pub struct Interpreter {
    depth: usize,
    output: String,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text written by `print` so far
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn eval(
        &mut self,
        expr: &Expr,
        env: &Env,
    ) -> Result<Value, EvalError> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_EVAL_DEPTH));
        }
        self.depth += 1;
        let result = self.eval_inner(expr, env);
        self.depth -= 1;
        result
    }

    fn eval_inner(
        &mut self,
        expr: &Expr,
        env: &Env,
    ) -> Result<Value, EvalError> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.as_str().into())),
            Expr::Symbol(name) => env
                .get(name)
                .ok_or_else(|| EvalError::Unbound(name.clone())),
            Expr::List(items) => {
                let Some((head, args)) = items.split_first() else {
                    return Ok(Value::List(Vec::new()));
                };
                match head.as_symbol() {
                    Some("quote") => self.eval_quote(args),
                    Some("if") => self.eval_if(args, env),
                    Some("define") => self.eval_define(args, env),
                    Some("lambda") => make_lambda(None, args, env),
                    Some("let") => self.eval_let(args, env),
                    Some("begin") => self.eval_body(args, env),
                    _ => self.eval_application(head, args, env),
                }
            }
        }
    }

    fn eval_quote(
        &mut self,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        match args {
            [datum] => Ok(Value::from(datum)),
            _ => Err(EvalError::syntax("quote", "expected exactly one datum")),
        }
    }

    fn eval_if(
        &mut self,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        let (test, then, otherwise) = match args {
            [test, then] => (test, then, None),
            [test, then, otherwise] => (test, then, Some(otherwise)),
            _ => {
                return Err(EvalError::syntax(
                    "if",
                    "expected (if test then [else])",
                ))
            }
        };

        if self.eval(test, env)?.is_truthy() {
            self.eval(then, env)
        } else if let Some(otherwise) = otherwise {
            self.eval(otherwise, env)
        } else {
            Ok(Value::Nil)
        }
    }

    fn eval_define(
        &mut self,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        match args {
            [Expr::Symbol(name), value] => {
                let value = self.eval(value, env)?;
                trace!(name = %name, "define");
                env.define(name.clone(), value.clone());
                Ok(value)
            }
            // (define (name params...) body...)
            [Expr::List(signature), body @ ..] if !body.is_empty() => {
                let Some((Expr::Symbol(name), params)) = signature.split_first() else {
                    return Err(EvalError::syntax("define", "function name must be a symbol"));
                };
                let lambda = build_lambda(Some(name.clone()), params, body, env)?;
                env.define(name.clone(), lambda.clone());
                Ok(lambda)
            }
            _ => Err(EvalError::syntax(
                "define",
                "expected (define name value) or (define (name args...) body...)",
            )),
        }
    }

    fn eval_let(
        &mut self,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        let Some((Expr::List(bindings), body)) = args.split_first() else {
            return Err(EvalError::syntax("let", "expected (let ((name value)...) body...)"));
        };

        let scope = Env::new(Some(env));
        for binding in bindings {
            match binding {
                Expr::List(pair) => match pair.as_slice() {
                    [Expr::Symbol(name), value] => {
                        let value = self.eval(value, env)?;
                        scope.define(name.clone(), value);
                    }
                    _ => return Err(EvalError::syntax("let", "binding must be (name value)")),
                },
                _ => return Err(EvalError::syntax("let", "binding must be (name value)")),
            }
        }
        self.eval_body(body, &scope)
    }

    fn eval_body(
        &mut self,
        body: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        let mut last = Value::Nil;
        for expr in body {
            last = self.eval(expr, env)?;
        }
        Ok(last)
    }

    fn eval_application(
        &mut self,
        head: &Expr,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        let callee = self.eval(head, env)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        self.apply(&callee, values, head)
    }

    fn apply(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        head: &Expr,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Primitive(primitive) => (primitive.func)(&args, &mut self.output),
            Value::Lambda(lambda) => {
                if lambda.params.len() != args.len() {
                    return Err(EvalError::Arity {
                        name: lambda
                            .name
                            .clone()
                            .unwrap_or_else(|| head.to_string()),
                        expected: lambda.params.len().to_string(),
                        got: args.len(),
                    });
                }
                let frame = Env::new(Some(&lambda.env));
                for (param, arg) in lambda.params.iter().zip(args) {
                    frame.define(param.clone(), arg);
                }
                self.eval_body(&lambda.body, &frame)
            }
            other => Err(EvalError::NotCallable(other.to_string())),
        }
    }
}

fn make_lambda(
    name: Option<String>,
    args: &[Expr],
    env: &Env,
) -> Result<Value, EvalError> {
    match args {
        [Expr::List(params), body @ ..] if !body.is_empty() => {
            build_lambda(name, params, body, env)
        }
        [Expr::Nil, body @ ..] if !body.is_empty() => build_lambda(name, &[], body, env),
        _ => Err(EvalError::syntax(
            "lambda",
            "expected (lambda (params...) body...)",
        )),
    }
}

fn build_lambda(
    name: Option<String>,
    params: &[Expr],
    body: &[Expr],
    env: &Env,
) -> Result<Value, EvalError> {
    let params = params
        .iter()
        .map(|p| {
            p.as_symbol()
                .map(str::to_string)
                .ok_or_else(|| EvalError::syntax("lambda", format!("parameter {} is not a symbol", p)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::Lambda(Arc::new(Lambda {
        name,
        params,
        body: body.to_vec(),
        env: env.clone(),
    })))
}
