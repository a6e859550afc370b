use crate::value::Value;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

/// An unevaluated host-language expression stored in a dictionary or record field.
///
/// PLN never looks inside an expression. It only hands it to an [`Environment`]
/// when the field has to be materialized, e.g. while serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The scoping context of the host evaluator.
///
/// This is the only coupling point between PLN and the host language: given an
/// expression, produce its value or a human-readable failure.
pub trait Environment: Debug {
    fn evaluate(&self, expr: &Expression) -> Result<Value, String>;
}

/// Storage for a dictionary or record field.
#[derive(Debug, Clone)]
pub enum Field {
    /// An already-evaluated value.
    Value(Value),
    /// A computed field that still needs an environment.
    Lazy(Expression),
}

impl Field {
    /// Materializes the field. `preferred` wins over `attached`, which is the
    /// environment carried by the enclosing dictionary or record.
    pub fn resolve(
        &self,
        preferred: Option<&Rc<dyn Environment>>,
        attached: Option<&Rc<dyn Environment>>,
    ) -> Result<Value, String> {
        match self {
            Field::Value(value) => Ok(value.clone()),
            Field::Lazy(expr) => {
                let env = preferred
                    .or(attached)
                    .ok_or_else(|| format!("no environment to evaluate `{expr}`"))?;
                log::debug!("evaluating lazy field `{expr}`");
                env.evaluate(expr)
            }
        }
    }

    /// Returns the literal value, if the field holds one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            Field::Lazy(_) => None,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Value(a), Field::Value(b)) => a == b,
            (Field::Lazy(a), Field::Lazy(b)) => a == b,
            _ => false,
        }
    }
}
