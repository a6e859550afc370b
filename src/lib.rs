//! PLN, a literal notation for host-language values.
//!
//! PLN writes primitives, arrays, dictionaries, schema-tagged records and
//! money, datetime, path and URL literals as text, and reads them back without
//! ever executing code.
//!
//! ```
//! let value = pln_core::parse(r#"@Person({ name: "Alice", joined: @2024-01-15 })"#).unwrap();
//! assert_eq!(
//!     pln_core::serialize(&value).unwrap(),
//!     r#"@Person({name: "Alice", joined: @2024-01-15})"#
//! );
//! ```

pub mod api;
pub mod currency;
pub mod env;
pub mod error;
pub mod lexer;
pub mod literals;
pub mod parser;
pub mod schema;
mod serialization;
pub mod serializer;
pub mod utils;
pub mod value;

pub use api::{
    is_valid, load, parse, parse_with, serialize, serialize_pretty, serialize_with_env, to_json,
    to_yaml, validate, write, OutputFormat, ParseOptions,
};
pub use env::{Environment, Expression, Field};
pub use error::{ParseErrors, ParserError, PlnError, SerializeError};
pub use schema::{Schema, SchemaField, SchemaRegistry, SchemaResolver};
pub use serializer::Serializer;
pub use value::{Dictionary, HostObject, Money, Record, RecordError, Table, Value};
