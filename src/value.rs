use crate::currency;
use crate::env::{Environment, Field};
use crate::schema::Schema;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

/// Reserved dictionary key that marks datetime, path and URL values.
pub const TYPE_KEY: &str = "__type";

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type DictionaryRef = Rc<RefCell<Dictionary>>;
pub type RecordRef = Rc<RefCell<Record>>;
pub type TableRef = Rc<RefCell<Table>>;

/// A value of the host language as PLN sees it.
///
/// Composite values are shared handles so that the same array, dictionary or
/// record can appear in several places (or inside itself) just like in the
/// host runtime.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Money(Money),
    Array(ArrayRef),
    Dictionary(DictionaryRef),
    Record(RecordRef),
    /// Rows of dictionaries. Written as an array of the rows.
    Table(TableRef),
    /// Runtime objects with no literal form. Present so callers can hand any
    /// value to the serializer and get an explicit refusal back.
    Host(Rc<HostObject>),
}

impl Value {
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn dictionary(dictionary: Dictionary) -> Self {
        Value::Dictionary(Rc::new(RefCell::new(dictionary)))
    }

    pub fn record(record: Record) -> Self {
        Value::Record(Rc::new(RefCell::new(record)))
    }

    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Money(_) => "money",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
            Value::Host(object) => object.kind(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Money(a), Value::Money(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Money> for Value {
    fn from(value: Money) -> Self {
        Value::Money(value)
    }
}

/// An ordered key/value mapping. Keys keep the order they were inserted in.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    pub entries: IndexMap<String, Field>,
    /// Scope used to evaluate lazy entries when the serializer has none.
    pub env: Option<Rc<dyn Environment>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<Field>) {
        self.entries.insert(key.into(), field.into());
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.entries.get(key)
    }

    /// The literal value stored under `key`, skipping lazy entries.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(Field::as_value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reserved type tag, if the dictionary stands for a typed literal.
    pub fn type_tag(&self) -> Option<&str> {
        self.get_value(TYPE_KEY).and_then(Value::as_str)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut dictionary = Dictionary::new();
        for (key, value) in iter {
            dictionary.insert(key, value);
        }
        dictionary
    }
}

/// A field-level validation failure attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub code: String,
    pub message: String,
}

impl RecordError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A schema-tagged structured value.
#[derive(Debug, Clone)]
pub struct Record {
    pub schema: Rc<Schema>,
    pub data: IndexMap<String, Field>,
    pub errors: IndexMap<String, RecordError>,
    pub validated: bool,
    pub env: Option<Rc<dyn Environment>>,
}

impl Record {
    pub fn new(schema: Rc<Schema>) -> Self {
        Self {
            schema,
            data: IndexMap::new(),
            errors: IndexMap::new(),
            validated: false,
            env: None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<Field>) {
        self.data.insert(key.into(), field.into());
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key).and_then(Field::as_value)
    }

    pub fn add_error(&mut self, field: impl Into<String>, error: RecordError) {
        self.errors.insert(field.into(), error);
    }

    pub fn schema_name(&self) -> &str {
        &self.schema.name
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.data == other.data
            && self.errors == other.errors
            && self.validated == other.validated
    }
}

/// A host table: ordered columns and one dictionary per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<DictionaryRef>,
}

impl Table {
    /// Builds a table whose columns are the keys of the first row.
    pub fn from_rows(rows: Vec<Dictionary>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            columns,
            rows: rows
                .into_iter()
                .map(|row| Rc::new(RefCell::new(row)))
                .collect(),
        }
    }
}

/// An exact currency amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Money {
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    pub currency: String,
    /// Number of fractional digits the smallest unit represents.
    pub scale: u8,
}

impl Money {
    /// Creates an amount using the currency's known scale.
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        let currency = currency.into();
        let scale = currency::scale_for(&currency);
        Self {
            amount,
            currency,
            scale,
        }
    }

    pub fn with_scale(amount: i64, currency: impl Into<String>, scale: u8) -> Self {
        Self {
            amount,
            currency: currency.into(),
            scale,
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            currency::format_money(&self.currency, self.amount, self.scale)
        )
    }
}

/// Host runtime objects that can be held in a value but never written out.
#[derive(Debug, Clone, PartialEq)]
pub enum HostObject {
    Function { name: Option<String> },
    Builtin { name: String },
    Connection { driver: String },
}

impl HostObject {
    pub fn kind(&self) -> &'static str {
        match self {
            HostObject::Function { .. } => "function",
            HostObject::Builtin { .. } => "builtin function",
            HostObject::Connection { .. } => "database connection",
        }
    }
}
