use crate::currency::{self, DEFAULT_SCALE, MAX_SCALE};
use crate::env::{Environment, Field};
use crate::error::SerializeError;
use crate::lexer::is_identifier_char;
use crate::literals::{self, DATETIME_TAG, PATH_TAG, URL_TAG};
use crate::value::{ArrayRef, DictionaryRef, Money, RecordRef, TableRef, Value};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::rc::Rc;

/// Writes values as PLN text.
///
/// A serializer can be reused; each call to [`Serializer::serialize`] starts
/// from a clean in-progress set.
#[derive(Debug, Default)]
pub struct Serializer {
    /// Addresses of the containers currently being written.
    visiting: HashSet<usize>,
    indent: String,
    depth: usize,
    pretty: bool,
    env: Option<Rc<dyn Environment>>,
}

impl Serializer {
    /// A compact serializer: everything on one line.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compact serializer that evaluates lazy fields with `env`.
    pub fn with_env(env: Rc<dyn Environment>) -> Self {
        Self::new().env(env)
    }

    /// A serializer that puts every element and entry on its own line,
    /// indented by `indent` per nesting level.
    pub fn pretty(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
            pretty: true,
            ..Self::default()
        }
    }

    /// Evaluates lazy fields with `env` before falling back to the
    /// environment attached to each dictionary or record.
    pub fn env(mut self, env: Rc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn serialize(&mut self, value: &Value) -> Result<String, SerializeError> {
        log::debug!("serializing {} (pretty: {})", value.type_name(), self.pretty);
        self.visiting.clear();
        self.depth = 0;
        if self.pretty && !self.indent.chars().all(char::is_whitespace) {
            return Err(SerializeError::InvalidIndent {
                indent: self.indent.clone(),
            });
        }
        let result = self.write_value(value);
        if let Err(err) = &result {
            log::debug!("serialization failed: {err}");
        }
        result
    }

    fn write_value(&mut self, value: &Value) -> Result<String, SerializeError> {
        match value {
            Value::Null => Ok("null".to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Integer(n) => Ok(n.to_string()),
            Value::Float(f) => format_float(*f),
            Value::String(s) => Ok(quote(s)),
            Value::Money(money) => format_money(money),
            Value::Array(array) => self.write_array(array),
            Value::Dictionary(dict) => self.write_dictionary(dict),
            Value::Record(record) => self.write_record(record),
            Value::Table(table) => self.write_table(table),
            Value::Host(object) => Err(SerializeError::Unsupported {
                kind: object.kind().to_string(),
            }),
        }
    }

    fn write_array(&mut self, array: &ArrayRef) -> Result<String, SerializeError> {
        self.enter(identity(array), "array", |s| {
            let elements = array.borrow();
            let parts = s.nested(|s| {
                elements
                    .iter()
                    .map(|element| s.write_value(element))
                    .collect::<Result<Vec<_>, _>>()
            })?;
            Ok(s.wrap('[', ']', &parts))
        })
    }

    fn write_dictionary(&mut self, dict: &DictionaryRef) -> Result<String, SerializeError> {
        self.enter(identity(dict), "dictionary", |s| {
            let dict = dict.borrow();
            if let Some(tag @ (DATETIME_TAG | PATH_TAG | URL_TAG)) = dict.type_tag() {
                let fields = s.resolve_fields(&dict.entries, dict.env.as_ref())?;
                return literals::render(tag, &fields);
            }

            let parts = s.nested(|s| s.write_entries(&dict.entries, dict.env.as_ref()))?;
            Ok(s.wrap('{', '}', &parts))
        })
    }

    fn write_record(&mut self, record: &RecordRef) -> Result<String, SerializeError> {
        self.enter(identity(record), "record", |s| {
            let record = record.borrow();
            let name = record.schema_name();
            let reason = if !is_identifier(name) {
                Some(format!("schema name {name:?} is not an identifier"))
            } else if matches!(name, "true" | "false" | "null" | "errors") {
                Some(format!("schema name {name:?} is reserved"))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(SerializeError::MalformedLiteral {
                    tag: "record".to_string(),
                    reason,
                });
            }

            let fields = s.nested(|s| s.write_entries(&record.data, record.env.as_ref()))?;
            let mut out = format!("@{name}({})", s.wrap('{', '}', &fields));

            if !record.errors.is_empty() {
                let errors: Vec<String> = record
                    .errors
                    .iter()
                    .map(|(field, error)| format!("{}: {}", format_key(field), quote(&error.message)))
                    .collect();
                let _ = write!(out, " @errors {}", s.wrap('{', '}', &errors));
            }
            Ok(out)
        })
    }

    /// Tables are written as an array of their rows.
    fn write_table(&mut self, table: &TableRef) -> Result<String, SerializeError> {
        self.enter(identity(table), "table", |s| {
            let table = table.borrow();
            let rows = s.nested(|s| {
                table
                    .rows
                    .iter()
                    .map(|row| s.write_dictionary(row))
                    .collect::<Result<Vec<_>, _>>()
            })?;
            Ok(s.wrap('[', ']', &rows))
        })
    }

    fn write_entries(
        &mut self,
        entries: &IndexMap<String, Field>,
        attached: Option<&Rc<dyn Environment>>,
    ) -> Result<Vec<String>, SerializeError> {
        let mut parts = Vec::with_capacity(entries.len());
        for (key, field) in entries {
            let value = self.resolve(key, field, attached)?;
            parts.push(format!("{}: {}", format_key(key), self.write_value(&value)?));
        }
        Ok(parts)
    }

    fn resolve_fields(
        &self,
        entries: &IndexMap<String, Field>,
        attached: Option<&Rc<dyn Environment>>,
    ) -> Result<IndexMap<String, Value>, SerializeError> {
        entries
            .iter()
            .map(|(key, field)| Ok((key.clone(), self.resolve(key, field, attached)?)))
            .collect()
    }

    fn resolve(
        &self,
        key: &str,
        field: &Field,
        attached: Option<&Rc<dyn Environment>>,
    ) -> Result<Value, SerializeError> {
        field
            .resolve(self.env.as_ref(), attached)
            .map_err(|message| SerializeError::FieldEvaluation {
                key: key.to_string(),
                message,
            })
    }

    /// Marks a container as in progress while `body` writes it.
    fn enter(
        &mut self,
        id: usize,
        container: &'static str,
        body: impl FnOnce(&mut Self) -> Result<String, SerializeError>,
    ) -> Result<String, SerializeError> {
        if !self.visiting.insert(id) {
            return Err(SerializeError::CircularReference { container });
        }
        let result = body(self);
        self.visiting.remove(&id);
        result
    }

    fn nested<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// Joins already written parts between `open` and `close`.
    fn wrap(&self, open: char, close: char, parts: &[String]) -> String {
        if parts.is_empty() {
            return format!("{open}{close}");
        }
        if !self.pretty {
            return format!("{open}{}{close}", parts.join(", "));
        }

        let indent = self.indent.repeat(self.depth);
        let inner_indent = self.indent.repeat(self.depth + 1);
        let mut out = String::new();
        out.push(open);
        out.push('\n');
        for (i, part) in parts.iter().enumerate() {
            out.push_str(&inner_indent);
            out.push_str(part);
            if i + 1 < parts.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(&indent);
        out.push(close);
        out
    }
}

fn identity<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc).cast::<()>() as usize
}

/// Formats a float so it always reads back as a float.
fn format_float(f: f64) -> Result<String, SerializeError> {
    if !f.is_finite() {
        return Err(SerializeError::NonFiniteFloat { value: f });
    }
    let mut out = f.to_string();
    if !out.contains('.') {
        out.push_str(".0");
    }
    Ok(out)
}

/// Money in `CODE#amount` form, refusing amounts that would not read back
/// as the same value.
fn format_money(money: &Money) -> Result<String, SerializeError> {
    let malformed = |reason: String| SerializeError::MalformedLiteral {
        tag: "money".to_string(),
        reason,
    };
    let code = money.currency.as_str();
    if !currency::is_currency_code(code) {
        return Err(malformed(format!(
            "currency code {code:?} must be two or three uppercase letters"
        )));
    }
    if money.amount == i64::MIN {
        return Err(malformed(format!("amount {} is out of range", money.amount)));
    }
    match currency::known_scale(code) {
        Some(scale) if scale != money.scale => Err(malformed(format!(
            "{code} uses {scale} decimal places, not {}",
            money.scale
        ))),
        None if !(DEFAULT_SCALE..=MAX_SCALE).contains(&money.scale) => Err(malformed(format!(
            "scale {} must be between {DEFAULT_SCALE} and {MAX_SCALE}",
            money.scale
        ))),
        _ => Ok(money.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_identifier_char),
        _ => false,
    }
}

fn format_key(key: &str) -> String {
    if is_identifier(key) && !matches!(key, "true" | "false" | "null") {
        key.to_string()
    } else {
        quote(key)
    }
}
