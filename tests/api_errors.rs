// Serialization error paths: values that exist at runtime but have no
// literal form.

use pln_core::{
    is_valid, parse, serialize, serialize_pretty, serialize_with_env, to_json, Dictionary,
    Environment, Expression, Field, HostObject, Money, PlnError, Record, Schema, SerializeError,
    Table, Value,
};
use std::rc::Rc;

#[derive(Debug)]
struct FailingEnv;

impl Environment for FailingEnv {
    fn evaluate(&self, expr: &Expression) -> Result<Value, String> {
        Err(format!("undefined variable: {expr}"))
    }
}

fn serialize_error(value: &Value) -> SerializeError {
    match serialize(value) {
        Ok(text) => panic!("expected an error, got {text}"),
        Err(PlnError::Serialize(err)) => err,
        Err(other) => panic!("expected a serialize error, got {other}"),
    }
}

#[test]
fn test_cycle_through_dictionary() {
    let value = Value::dictionary(Dictionary::new());
    if let Value::Dictionary(dict) = &value {
        dict.borrow_mut().insert("me", value.clone());
    }

    let err = serialize_error(&value);
    assert_eq!(err.to_string(), "circular reference detected in dictionary");
    assert!(to_json(&value).is_err());

    // Break the cycle so the test does not leak.
    if let Value::Dictionary(dict) = &value {
        dict.borrow_mut().entries.clear();
    }
}

#[test]
fn test_cycle_through_record_and_array() {
    let list = Value::array(vec![]);
    let mut record = Record::new(Rc::new(Schema::new("Node", vec![])));
    record.insert("children", list.clone());
    let record = Value::record(record);
    if let Value::Array(array) = &list {
        array.borrow_mut().push(record.clone());
    }

    let err = serialize_error(&record);
    assert!(matches!(err, SerializeError::CircularReference { .. }));
    assert!(serialize_pretty(&record, "  ").is_err());

    if let Value::Array(array) = &list {
        array.borrow_mut().clear();
    }
}

#[test]
fn test_shared_structure_is_not_a_cycle() {
    let shared = Value::array(vec![Value::Integer(1)]);
    let value = Value::array(vec![shared.clone(), shared.clone()]);
    assert_eq!(serialize(&value).unwrap(), "[[1], [1]]");
}

#[test]
fn test_host_objects_are_rejected() {
    let objects = [
        (HostObject::Function { name: None }, "cannot serialize function"),
        (
            HostObject::Builtin {
                name: "len".to_string(),
            },
            "cannot serialize builtin function",
        ),
        (
            HostObject::Connection {
                driver: "sqlite".to_string(),
            },
            "cannot serialize database connection",
        ),
    ];
    for (object, message) in objects {
        let value = Value::array(vec![Value::Integer(1), Value::Host(Rc::new(object))]);
        assert_eq!(serialize_error(&value).to_string(), message);
    }
}

#[test]
fn test_failing_lazy_field_names_the_key() {
    let mut dict = Dictionary::new();
    dict.insert("ok", Value::Integer(1));
    dict.insert("total", Field::Lazy(Expression::new("price * qty")));
    let value = Value::dictionary(dict);

    let env: Rc<dyn Environment> = Rc::new(FailingEnv);
    let Err(PlnError::Serialize(err)) = serialize_with_env(&value, env) else {
        panic!("expected a serialize error");
    };
    let SerializeError::FieldEvaluation { key, message } = &err else {
        panic!("expected a field evaluation error, got {err:?}");
    };
    assert_eq!(key, "total");
    assert_eq!(message, "undefined variable: price * qty");
}

#[test]
fn test_lazy_field_without_environment() {
    let mut dict = Dictionary::new();
    dict.insert("total", Field::Lazy(Expression::new("x")));
    let err = serialize_error(&Value::dictionary(dict));
    assert!(err.to_string().contains("no environment"), "{err}");
}

#[test]
fn test_malformed_typed_dictionary() {
    let dict: Dictionary = [
        ("__type", Value::from("datetime")),
        ("kind", Value::from("date")),
        ("year", Value::Integer(2024)),
    ]
    .into_iter()
    .collect();
    let err = serialize_error(&Value::dictionary(dict));
    assert!(matches!(err, SerializeError::MalformedLiteral { .. }));
    assert!(err.to_string().contains("month"), "{err}");
}

#[test]
fn test_path_with_terminator_is_rejected() {
    let dict: Dictionary = [
        ("__type", Value::from("path")),
        ("absolute", Value::Boolean(true)),
        ("segments", Value::array(vec![Value::from("a b")])),
    ]
    .into_iter()
    .collect();
    let err = serialize_error(&Value::dictionary(dict));
    assert!(matches!(err, SerializeError::MalformedLiteral { .. }));
}

#[test]
fn test_record_with_unusable_schema_name() {
    let record = Record::new(Rc::new(Schema::new("not valid", vec![])));
    let err = serialize_error(&Value::record(record));
    assert!(err.to_string().contains("not an identifier"), "{err}");
}

#[test]
fn test_non_finite_floats() {
    for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = serialize_error(&Value::Float(f));
        assert!(matches!(err, SerializeError::NonFiniteFloat { .. }));
        assert!(to_json(&Value::Float(f)).is_err());
    }
}

/// Parses `source`, overwrites one field of the resulting typed dictionary and
/// returns the serialization error.
fn tampered_literal_error(source: &str, key: &str, replacement: Value) -> SerializeError {
    let value = parse(source).unwrap();
    let Value::Dictionary(dict) = &value else {
        panic!("{source} should parse to a dictionary");
    };
    dict.borrow_mut().insert(key, replacement);
    serialize_error(&value)
}

#[test]
fn test_url_scheme_without_literal_form() {
    let err = tampered_literal_error("@https://h", "scheme", Value::from("ftp"));
    assert!(matches!(err, SerializeError::MalformedLiteral { .. }), "{err}");
}

#[test]
fn test_reserved_schema_names() {
    for name in ["true", "false", "null", "errors"] {
        let record = Record::new(Rc::new(Schema::new(name, vec![])));
        let err = serialize_error(&Value::record(record));
        assert!(err.to_string().contains("reserved"), "{name}: {err}");
    }
}

#[test]
fn test_money_with_invalid_currency_code() {
    for code in ["usd", "U", "USDX", "U$D"] {
        let err = serialize_error(&Value::Money(Money::with_scale(5, code, 2)));
        assert!(matches!(err, SerializeError::MalformedLiteral { .. }), "{code}: {err}");
    }
}

#[test]
fn test_money_with_wrong_scale() {
    let cases = [
        Money::with_scale(1999, "USD", 3),
        Money::with_scale(100, "JPY", 2),
        Money::with_scale(1, "XYZ", 0),
        Money::with_scale(1, "XYZ", 19),
    ];
    for money in cases {
        let err = serialize_error(&Value::Money(money.clone()));
        assert!(err.to_string().contains("money"), "{money:?}: {err}");
    }
}

#[test]
fn test_money_amount_out_of_range() {
    let err = serialize_error(&Value::Money(Money::new(i64::MIN, "USD")));
    assert!(err.to_string().contains("out of range"), "{err}");

    let max = serialize(&Value::Money(Money::new(i64::MAX, "USD"))).unwrap();
    assert!(is_valid(&max), "{max}");
}

#[test]
fn test_datetime_fields_out_of_range() {
    let cases = [
        ("@2024-01-15", "month", 13),
        ("@2024-01-15", "day", 40),
        ("@2023-02-01", "day", 29),
        ("@2024-01-15", "year", 12_345),
        ("@2024-01-15T10:30:00Z", "hour", 24),
        ("@10:30:00", "minute", 75),
    ];
    for (source, key, replacement) in cases {
        let err = tampered_literal_error(source, key, Value::Integer(replacement));
        assert!(
            matches!(err, SerializeError::MalformedLiteral { .. }),
            "{source} with {key} = {replacement}: {err}"
        );
    }
}

#[test]
fn test_non_whitespace_indent() {
    let Err(PlnError::Serialize(err)) = serialize_pretty(&Value::array(vec![]), "--") else {
        panic!("expected a serialize error");
    };
    assert!(matches!(err, SerializeError::InvalidIndent { .. }));
}

#[test]
fn test_table_cycle_through_row() {
    let table = Value::table(Table::default());
    let Value::Table(inner) = &table else {
        unreachable!();
    };
    let mut row = Dictionary::new();
    row.insert("owner", table.clone());
    inner
        .borrow_mut()
        .rows
        .push(Rc::new(std::cell::RefCell::new(row)));

    let err = serialize_error(&table);
    assert_eq!(err.to_string(), "circular reference detected in table");
    assert!(to_json(&table).is_err());

    inner.borrow_mut().rows.clear();
}

