use crate::env::Environment;
use crate::error::PlnError;
use crate::parser::Parser;
use crate::schema::SchemaResolver;
use crate::serializer::Serializer;
use crate::value::Value;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

pub use crate::serialization::{export, Exported};

pub use crate::parser::DEFAULT_SOURCE_NAME;

/// Everything a parse can be configured with.
#[derive(Clone)]
pub struct ParseOptions<'a> {
    source_name: String,
    resolver: Option<&'a dyn SchemaResolver>,
    env: Option<Rc<dyn Environment>>,
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            resolver: None,
            env: None,
        }
    }
}

impl fmt::Debug for ParseOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("source_name", &self.source_name)
            .field("resolver", &self.resolver.is_some())
            .field("env", &self.env)
            .finish()
    }
}

impl<'a> ParseOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown for the source in error reports.
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn resolver(mut self, resolver: &'a dyn SchemaResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn env(mut self, env: Rc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    fn parser<'s>(&self, source: &'s str, name: String) -> Parser<'s>
    where
        'a: 's,
    {
        let mut parser = Parser::new_with_name(source, name);
        if let Some(resolver) = self.resolver {
            parser = parser.with_resolver(resolver);
        }
        if let Some(env) = &self.env {
            parser = parser.with_env(Rc::clone(env));
        }
        parser
    }
}

/// How [`write`] lays out the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Compact,
    /// One element or entry per line, indented by the given unit.
    Pretty(String),
}

/// Parses a PLN string without a schema registry or environment.
///
/// Records whose schema is unknown get a synthesized one.
///
/// # Errors
/// Returns every problem found in the source as one [`PlnError::Parser`].
pub fn parse(source: &str) -> Result<Value, PlnError> {
    parse_with(source, &ParseOptions::default())
}

/// Parses a PLN string with the given options.
///
/// # Errors
/// Returns every problem found in the source as one [`PlnError::Parser`].
pub fn parse_with(source: &str, options: &ParseOptions<'_>) -> Result<Value, PlnError> {
    let value = options
        .parser(source, options.source_name.clone())
        .parse()?;
    Ok(value)
}

/// Checks that `source` is valid PLN.
///
/// # Errors
/// Same as [`parse`].
pub fn validate(source: &str) -> Result<(), PlnError> {
    parse(source).map(|_| ())
}

pub fn is_valid(source: &str) -> bool {
    validate(source).is_ok()
}

/// Serializes a value as compact PLN.
///
/// # Errors
/// Fails on host objects, circular references, lazy fields that cannot be
/// evaluated, non-finite floats and malformed datetime, path or URL values.
pub fn serialize(value: &Value) -> Result<String, PlnError> {
    Ok(Serializer::new().serialize(value)?)
}

/// Serializes a value as compact PLN, evaluating lazy fields with `env`.
///
/// # Errors
/// Same as [`serialize`].
pub fn serialize_with_env(value: &Value, env: Rc<dyn Environment>) -> Result<String, PlnError> {
    Ok(Serializer::with_env(env).serialize(value)?)
}

/// Serializes a value as indented PLN, using `indent` for each level.
///
/// # Errors
/// Same as [`serialize`].
pub fn serialize_pretty(value: &Value, indent: &str) -> Result<String, PlnError> {
    Ok(Serializer::pretty(indent).serialize(value)?)
}

/// Reads and parses a PLN file. The file path is used as the source name in
/// diagnostics.
///
/// # Errors
/// Returns [`PlnError::Io`] if the file cannot be read, or the parse errors.
pub fn load(path: impl AsRef<Path>, options: &ParseOptions<'_>) -> Result<Value, PlnError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| PlnError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("loaded {} bytes from {}", source.len(), path.display());

    let value = options
        .parser(&source, path.display().to_string())
        .parse()?;
    Ok(value)
}

/// Serializes `value` and writes it to `path`, followed by a newline.
///
/// # Errors
/// Returns the serialization error, or [`PlnError::Io`] if writing fails.
pub fn write(path: impl AsRef<Path>, value: &Value, format: &OutputFormat) -> Result<(), PlnError> {
    let path = path.as_ref();
    let mut text = match format {
        OutputFormat::Compact => serialize(value)?,
        OutputFormat::Pretty(indent) => serialize_pretty(value, indent)?,
    };
    text.push('\n');

    std::fs::write(path, text).map_err(|source| PlnError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Renders a value as pretty-printed JSON.
///
/// # Errors
/// Fails if the value cannot be exported or `serde_json` rejects it.
pub fn to_json(value: &Value) -> Result<String, PlnError> {
    let exported = export(value, None)?;
    Ok(serde_json::to_string_pretty(&exported)?)
}

/// Renders a value as YAML.
///
/// # Errors
/// Fails if the value cannot be exported or `serde_yaml` rejects it.
pub fn to_yaml(value: &Value) -> Result<String, PlnError> {
    let exported = export(value, None)?;
    Ok(serde_yaml::to_string(&exported)?)
}
