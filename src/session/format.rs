//! Result rendering
//!
//! Every [`ResultValue`] renders to one display line; rendering never fails.

use std::fmt::Write;

use crate::repl::ResultValue;

pub fn format_value(value: &ResultValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(
    out: &mut String,
    value: &ResultValue,
) {
    match value {
        ResultValue::Nil => out.push_str("nil"),
        ResultValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        ResultValue::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        ResultValue::String(s) => write_string(out, s),
        ResultValue::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(')');
        }
        ResultValue::Function => out.push_str("<function>"),
        ResultValue::Other(text) => out.push_str(text),
    }
}

/// Quote `s` so the reader would give back the same string
fn write_string(
    out: &mut String,
    s: &str,
) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{read, tokenize, Expr, Number};
    use proptest::prelude::*;

    #[test]
    fn test_atoms() {
        assert_eq!(format_value(&ResultValue::Nil), "nil");
        assert_eq!(format_value(&ResultValue::Boolean(false)), "false");
        assert_eq!(format_value(&ResultValue::Number(Number::Int(42))), "42");
        assert_eq!(format_value(&ResultValue::Number(Number::Float(2.5))), "2.5");
        assert_eq!(format_value(&ResultValue::Number(Number::Float(3.0))), "3.0");
        assert_eq!(format_value(&ResultValue::String("hello".into())), "\"hello\"");
        assert_eq!(format_value(&ResultValue::Function), "<function>");
        assert_eq!(format_value(&ResultValue::Other("sym".into())), "sym");
    }

    #[test]
    fn test_lists() {
        assert_eq!(format_value(&ResultValue::List(vec![])), "()");
        let nested = ResultValue::List(vec![
            ResultValue::Number(Number::Int(1)),
            ResultValue::List(vec![ResultValue::Number(Number::Int(2)), ResultValue::Nil]),
            ResultValue::String("x".into()),
        ]);
        assert_eq!(format_value(&nested), "(1 (2 nil) \"x\")");
    }

    #[test]
    fn test_string_escapes() {
        let s = ResultValue::String("say \"hi\"\n\\".into());
        assert_eq!(format_value(&s), r#""say \"hi\"\n\\""#);
    }

    fn result_value() -> impl Strategy<Value = ResultValue> {
        let leaf = prop_oneof![
            Just(ResultValue::Nil),
            Just(ResultValue::Function),
            any::<bool>().prop_map(ResultValue::Boolean),
            any::<i64>().prop_map(|i| ResultValue::Number(Number::Int(i))),
            any::<f64>().prop_map(|x| ResultValue::Number(Number::Float(x))),
            ".*".prop_map(ResultValue::String),
            "[a-z]{1,8}".prop_map(ResultValue::Other),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(ResultValue::List)
        })
    }

    proptest! {
        #[test]
        fn prop_rendering_is_total_and_single_line(value in result_value()) {
            let text = format_value(&value);
            prop_assert!(!text.is_empty());
            prop_assert!(!text.contains('\n'));
        }

        #[test]
        fn prop_rendered_strings_read_back(s in any::<String>()) {
            let text = format_value(&ResultValue::String(s.clone()));
            let tokens = tokenize(&text).unwrap();
            prop_assert_eq!(read(&tokens).unwrap(), Expr::Str(s));
        }
    }
}
