// Integration tests for pln-core using test fixtures
use pln_core::{parse_with, serialize, serialize_pretty, ParseOptions, PlnError, Value};
use rstest::rstest;
use std::fs;
use std::path::PathBuf;

fn get_test_file_path(subdir: &str, filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join(subdir)
        .join(filename)
}

fn read_test_file(subdir: &str, filename: &str) -> String {
    let path = get_test_file_path(subdir, filename);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read test file: {:?}", path))
}

fn parse_fixture(subdir: &str, filename: &str) -> Result<Value, PlnError> {
    let source = read_test_file(subdir, filename);
    parse_with(&source, &ParseOptions::new().source_name(filename))
}

// Valid PLN files must parse and survive a serialize/parse round trip.
mod ok_tests {
    use super::*;

    #[rstest]
    #[case("primitives.pln")]
    #[case("collections.pln")]
    #[case("records.pln")]
    #[case("money.pln")]
    #[case("literals.pln")]
    #[case("comments.pln")]
    fn test_fixture_round_trips(#[case] filename: &str) {
        let value = parse_fixture("ok", filename)
            .unwrap_or_else(|e| panic!("{filename} should parse successfully: {e}"));

        let compact = serialize(&value).unwrap();
        let reparsed = pln_core::parse(&compact)
            .unwrap_or_else(|e| panic!("{filename} compact output should parse: {e}\n{compact}"));
        assert_eq!(reparsed, value, "compact round trip changed {filename}");
        assert_eq!(serialize(&reparsed).unwrap(), compact);

        let pretty = serialize_pretty(&value, "    ").unwrap();
        let reparsed = pln_core::parse(&pretty)
            .unwrap_or_else(|e| panic!("{filename} pretty output should parse: {e}\n{pretty}"));
        assert_eq!(reparsed, value, "pretty round trip changed {filename}");
    }

    #[test]
    fn test_every_ok_fixture_is_covered() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("ok");
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "pln") {
                let name = path.file_name().unwrap().to_string_lossy().to_string();
                assert!(
                    parse_fixture("ok", &name).is_ok(),
                    "{name} should parse successfully"
                );
            }
        }
    }

    #[test]
    fn test_money_fixture_values() {
        let Value::Dictionary(dict) = parse_fixture("ok", "money.pln").unwrap() else {
            panic!("expected a dictionary");
        };
        let dict = dict.borrow();
        let money = |key: &str| match dict.get_value(key) {
            Some(Value::Money(m)) => (m.amount, m.currency.clone(), m.scale),
            other => panic!("{key} should be money, got {other:?}"),
        };

        assert_eq!(money("dollars"), (1999, "USD".to_string(), 2));
        assert_eq!(money("refund"), (-550, "USD".to_string(), 2));
        assert_eq!(money("yen"), (500, "JPY".to_string(), 0));
        assert_eq!(money("dinar"), (12345, "KWD".to_string(), 3));
        assert_eq!(money("unknown"), (12345, "XYZ".to_string(), 4));
        assert_eq!(money("short_code"), (700, "EU".to_string(), 2));
    }
}

// Invalid PLN files must be rejected.
mod err_tests {
    use super::*;

    #[rstest]
    #[case("unclosed_array.pln", "expected `]` to close array")]
    #[case("bad_money.pln", "JPY does not allow decimal places")]
    #[case("orphan_errors.pln", "@errors must follow a record")]
    #[case("trailing_content.pln", "after value")]
    #[case("bare_identifier.pln", "unexpected identifier `active`")]
    #[case("missing_paren.pln", "expected `(` after schema name `User`")]
    #[case("bad_datetime.pln", "invalid datetime")]
    #[case("unterminated_string.pln", "unterminated string")]
    fn test_fixture_is_rejected(#[case] filename: &str, #[case] message: &str) {
        let err = parse_fixture("err", filename)
            .err()
            .unwrap_or_else(|| panic!("{filename} should fail to parse"));
        let text = err.to_string();
        assert!(
            text.contains(message),
            "{filename}: expected {message:?} in {text:?}"
        );
    }
}
