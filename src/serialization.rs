use crate::env::{Environment, Field};
use crate::error::SerializeError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;

/// A PLN value reduced to what JSON and YAML can express.
///
/// Money becomes its `CODE#amount` text, records become the object of their
/// fields, and datetime, path and URL values keep their decomposed form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Exported {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Array(Vec<Exported>),
    Object(IndexMap<String, Exported>),
}

/// Converts `value` for export, evaluating lazy fields with `env` first.
pub fn export(
    value: &Value,
    env: Option<&Rc<dyn Environment>>,
) -> Result<Exported, SerializeError> {
    Exporter {
        visiting: HashSet::new(),
        env,
    }
    .export(value)
}

struct Exporter<'e> {
    visiting: HashSet<usize>,
    env: Option<&'e Rc<dyn Environment>>,
}

impl Exporter<'_> {
    fn export(&mut self, value: &Value) -> Result<Exported, SerializeError> {
        match value {
            Value::Null => Ok(Exported::Null),
            Value::Boolean(b) => Ok(Exported::Boolean(*b)),
            Value::Integer(n) => Ok(Exported::Integer(*n)),
            Value::Float(f) if f.is_finite() => Ok(Exported::Float(*f)),
            Value::Float(f) => Err(SerializeError::NonFiniteFloat { value: *f }),
            Value::String(s) => Ok(Exported::String(s.clone())),
            Value::Money(money) => Ok(Exported::String(money.to_string())),
            Value::Array(array) => {
                let id = Rc::as_ptr(array).cast::<()>() as usize;
                self.guard(id, "array", |e| {
                    array
                        .borrow()
                        .iter()
                        .map(|element| e.export(element))
                        .collect::<Result<_, _>>()
                        .map(Exported::Array)
                })
            }
            Value::Dictionary(dict) => {
                let id = Rc::as_ptr(dict).cast::<()>() as usize;
                self.guard(id, "dictionary", |e| {
                    let dict = dict.borrow();
                    e.object(&dict.entries, dict.env.as_ref())
                })
            }
            Value::Record(record) => {
                let id = Rc::as_ptr(record).cast::<()>() as usize;
                self.guard(id, "record", |e| {
                    let record = record.borrow();
                    e.object(&record.data, record.env.as_ref())
                })
            }
            Value::Table(table) => {
                let id = Rc::as_ptr(table).cast::<()>() as usize;
                self.guard(id, "table", |e| {
                    table
                        .borrow()
                        .rows
                        .iter()
                        .map(|row| e.export(&Value::Dictionary(Rc::clone(row))))
                        .collect::<Result<_, _>>()
                        .map(Exported::Array)
                })
            }
            Value::Host(object) => Err(SerializeError::Unsupported {
                kind: object.kind().to_string(),
            }),
        }
    }

    fn object(
        &mut self,
        entries: &IndexMap<String, Field>,
        attached: Option<&Rc<dyn Environment>>,
    ) -> Result<Exported, SerializeError> {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, field) in entries {
            let value = field.resolve(self.env, attached).map_err(|message| {
                SerializeError::FieldEvaluation {
                    key: key.clone(),
                    message,
                }
            })?;
            map.insert(key.clone(), self.export(&value)?);
        }
        Ok(Exported::Object(map))
    }

    fn guard(
        &mut self,
        id: usize,
        container: &'static str,
        body: impl FnOnce(&mut Self) -> Result<Exported, SerializeError>,
    ) -> Result<Exported, SerializeError> {
        if !self.visiting.insert(id) {
            return Err(SerializeError::CircularReference { container });
        }
        let result = body(self);
        self.visiting.remove(&id);
        result
    }
}
