//! Built-in primitives: arithmetic, comparison, list operations, predicates

use crate::lang::env::Env;
use crate::lang::value::{Number, Primitive, PrimitiveFn, Value};

use super::EvalError;

const PRIMITIVES: &[(&str, PrimitiveFn)] = &[
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("=", num_eq),
    ("<", lt),
    (">", gt),
    ("<=", le),
    (">=", ge),
    ("list", list),
    ("car", car),
    ("cdr", cdr),
    ("cons", cons),
    ("number?", is_number),
    ("symbol?", is_symbol),
    ("string?", is_string),
    ("list?", is_list),
    ("null?", is_null),
    ("procedure?", is_procedure),
    ("not", not),
    ("print", print),
];

/// Names of all built-in primitives
pub const PRIMITIVE_NAMES: &[&str] = &[
    "+", "-", "*", "/", "=", "<", ">", "<=", ">=", "list", "car", "cdr", "cons", "number?",
    "symbol?", "string?", "list?", "null?", "procedure?", "not", "print",
];

/// Install every primitive into `env`
pub fn load_primitives(env: &Env) {
    for &(name, func) in PRIMITIVES {
        env.define(name, Value::Primitive(Primitive { name, func }));
    }
}

fn arity(
    name: &str,
    expected: &str,
    got: usize,
) -> EvalError {
    EvalError::Arity {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn expect_number(
    op: &str,
    value: &Value,
) -> Result<Number, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            op: op.to_string(),
            expected: "number",
            found: other.type_name(),
        }),
    }
}

fn one<'a>(
    op: &str,
    args: &'a [Value],
) -> Result<&'a Value, EvalError> {
    match args {
        [value] => Ok(value),
        _ => Err(arity(op, "1", args.len())),
    }
}

/// Apply an integer operation with overflow checking, or the float one if
/// either side is a float.
fn combine(
    op: &'static str,
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Number, EvalError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y)
            .map(Number::Int)
            .ok_or(EvalError::Overflow(op)),
        _ => Ok(Number::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn add(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let mut acc = Number::Int(0);
    for arg in args {
        let n = expect_number("+", arg)?;
        acc = combine("+", acc, n, i64::checked_add, |x, y| x + y)?;
    }
    Ok(Value::Number(acc))
}

fn sub(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(arity("-", "at least 1", 0));
    };
    let first = expect_number("-", first)?;
    if rest.is_empty() {
        return combine("-", Number::Int(0), first, i64::checked_sub, |x, y| x - y)
            .map(Value::Number);
    }

    let mut acc = first;
    for arg in rest {
        let n = expect_number("-", arg)?;
        acc = combine("-", acc, n, i64::checked_sub, |x, y| x - y)?;
    }
    Ok(Value::Number(acc))
}

fn mul(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let mut acc = Number::Int(1);
    for arg in args {
        let n = expect_number("*", arg)?;
        acc = combine("*", acc, n, i64::checked_mul, |x, y| x * y)?;
    }
    Ok(Value::Number(acc))
}

fn divide(
    a: Number,
    b: Number,
) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        // exact integer quotients stay integers
        (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => x
            .checked_div(y)
            .map(Number::Int)
            .ok_or(EvalError::Overflow("/")),
        _ => Ok(Number::Float(a.as_f64() / b.as_f64())),
    }
}

fn div(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(arity("/", "at least 1", 0));
    };
    let first = expect_number("/", first)?;
    if rest.is_empty() {
        return divide(Number::Int(1), first).map(Value::Number);
    }

    let mut acc = first;
    for arg in rest {
        acc = divide(acc, expect_number("/", arg)?)?;
    }
    Ok(Value::Number(acc))
}

fn compare_chain(
    op: &'static str,
    args: &[Value],
    holds: fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(arity(op, "at least 2", args.len()));
    }
    let numbers = args
        .iter()
        .map(|a| expect_number(op, a).map(Number::as_f64))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Bool(numbers.windows(2).all(|w| holds(w[0], w[1]))))
}

fn num_eq(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(arity("=", "at least 2", args.len()));
    }
    // numbers compare numerically, everything else structurally
    Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
}

fn lt(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    compare_chain("<", args, |a, b| a < b)
}

fn gt(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    compare_chain(">", args, |a, b| a > b)
}

fn le(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    compare_chain("<=", args, |a, b| a <= b)
}

fn ge(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    compare_chain(">=", args, |a, b| a >= b)
}

fn list(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::List(args.to_vec()))
}

fn expect_list<'a>(
    op: &'static str,
    value: &'a Value,
) -> Result<&'a [Value], EvalError> {
    match value {
        Value::List(items) => Ok(items),
        Value::Nil => Ok(&[]),
        other => Err(EvalError::TypeMismatch {
            op: op.to_string(),
            expected: "list",
            found: other.type_name(),
        }),
    }
}

fn car(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let items = expect_list("car", one("car", args)?)?;
    items.first().cloned().ok_or(EvalError::EmptyList("car"))
}

fn cdr(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let items = expect_list("cdr", one("cdr", args)?)?;
    match items.split_first() {
        Some((_, rest)) => Ok(Value::List(rest.to_vec())),
        None => Err(EvalError::EmptyList("cdr")),
    }
}

fn cons(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    let [head, tail] = args else {
        return Err(arity("cons", "2", args.len()));
    };
    let tail = expect_list("cons", tail)?;
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(head.clone());
    items.extend_from_slice(tail);
    Ok(Value::List(items))
}

fn is_number(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(one("number?", args)?, Value::Number(_))))
}

fn is_symbol(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(one("symbol?", args)?, Value::Symbol(_))))
}

fn is_string(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(one("string?", args)?, Value::Str(_))))
}

fn is_list(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(
        one("list?", args)?,
        Value::List(_) | Value::Nil
    )))
}

fn is_null(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(match one("null?", args)? {
        Value::Nil => true,
        Value::List(items) => items.is_empty(),
        _ => false,
    }))
}

fn is_procedure(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(one("procedure?", args)?.is_callable()))
}

fn not(
    args: &[Value],
    _out: &mut String,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(!one("not", args)?.is_truthy()))
}

fn print(
    args: &[Value],
    out: &mut String,
) -> Result<Value, EvalError> {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match arg {
            Value::Str(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
    }
    out.push('\n');
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_match_table() {
        let names: Vec<&str> = PRIMITIVES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, PRIMITIVE_NAMES);
    }

    #[test]
    fn test_division_keeps_exact_integers() {
        assert_eq!(divide(Number::Int(6), Number::Int(3)), Ok(Number::Int(2)));
        assert_eq!(divide(Number::Int(7), Number::Int(2)), Ok(Number::Float(3.5)));
        assert_eq!(
            divide(Number::Int(1), Number::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_add_overflow() {
        let mut out = String::new();
        let err = add(&[Value::int(i64::MAX), Value::int(1)], &mut out).unwrap_err();
        assert_eq!(err, EvalError::Overflow("+"));
    }

    #[test]
    fn test_print_writes_output() {
        let mut out = String::new();
        let value = print(&[Value::Str("hi".into()), Value::int(3)], &mut out).unwrap();
        assert_eq!(value, Value::Nil);
        assert_eq!(out, "hi 3\n");
    }
}
