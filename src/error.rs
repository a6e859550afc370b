use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum PlnError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParseErrors),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serialize(#[from] SerializeError),

    #[error("cannot access {path}")]
    #[diagnostic(code(pln::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(pln::export::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(pln::export::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

/// Every problem found while parsing one document.
#[derive(Error, Debug, Diagnostic)]
#[error("parse error: {summary}")]
#[diagnostic(code(pln::parse))]
pub struct ParseErrors {
    summary: String,
    #[related]
    errors: Vec<ParserError>,
}

impl ParseErrors {
    pub fn new(errors: Vec<ParserError>) -> Self {
        let summary = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self { summary, errors }
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParserError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum ParserError {
    #[error("line {line}, column {column}: expected {expected}, got {found}")]
    #[diagnostic(
        code(pln::parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected {expected}")]
        span: SourceSpan,
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}, column {column}: unexpected identifier `{name}`")]
    #[diagnostic(
        code(pln::parser::bare_identifier),
        help("Identifiers are only allowed as keys and schema names. Did you mean to use @ for a record?")
    )]
    BareIdentifier {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a value")]
        span: SourceSpan,
        line: usize,
        column: usize,
        name: String,
    },

    #[error("line {line}, column {column}: expected `{delimiter}` to close {construct}, got {found}")]
    #[diagnostic(
        code(pln::parser::missing_delimiter),
        help("Every opening bracket, brace or parenthesis needs a matching closing one.")
    )]
    MissingDelimiter {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected `{delimiter}` here")]
        span: SourceSpan,
        line: usize,
        column: usize,
        delimiter: char,
        construct: &'static str,
        found: String,
    },

    #[error("line {line}, column {column}: {message}")]
    #[diagnostic(code(pln::parser::invalid_literal))]
    InvalidLiteral {
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid literal")]
        span: SourceSpan,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("line {line}, column {column}: illegal token: {message}")]
    #[diagnostic(code(pln::lexer::illegal_token))]
    IllegalToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("line {line}, column {column}: expected `(` after schema name `{schema}`, got {found}")]
    #[diagnostic(
        code(pln::parser::missing_paren),
        help("Records are written as @Schema({{ field: value }}).")
    )]
    MissingParen {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected `(`")]
        span: SourceSpan,
        line: usize,
        column: usize,
        schema: String,
        found: String,
    },

    #[error("line {line}, column {column}: @errors must follow a record")]
    #[diagnostic(
        code(pln::parser::orphan_errors),
        help("Field errors can only be attached to a record: @Schema({{...}}) @errors {{...}}.")
    )]
    OrphanErrors {
        #[source_code]
        src: NamedSource<String>,
        #[label("no record before this")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("line {line}, column {column}: maximum nesting depth ({max}) exceeded")]
    #[diagnostic(code(pln::parser::depth_exceeded))]
    DepthExceeded {
        #[source_code]
        src: NamedSource<String>,
        #[label("nested too deeply")]
        span: SourceSpan,
        line: usize,
        column: usize,
        max: usize,
    },

    #[error("line {line}, column {column}: unexpected {found} after value")]
    #[diagnostic(
        code(pln::parser::trailing_content),
        help("A PLN document holds exactly one value.")
    )]
    TrailingContent {
        #[source_code]
        src: NamedSource<String>,
        #[label("trailing content")]
        span: SourceSpan,
        line: usize,
        column: usize,
        found: String,
    },
}

#[derive(Error, Debug, Diagnostic)]
pub enum SerializeError {
    #[error("cannot serialize {kind}")]
    #[diagnostic(
        code(pln::serialize::unsupported),
        help("Functions, builtins and live resources have no literal form.")
    )]
    Unsupported { kind: String },

    #[error("circular reference detected in {container}")]
    #[diagnostic(code(pln::serialize::circular_reference))]
    CircularReference { container: &'static str },

    #[error("error serializing field {key:?}: {message}")]
    #[diagnostic(code(pln::serialize::field_evaluation))]
    FieldEvaluation { key: String, message: String },

    #[error("malformed {tag} value: {reason}")]
    #[diagnostic(code(pln::serialize::malformed_literal))]
    MalformedLiteral { tag: String, reason: String },

    #[error("cannot serialize non-finite float {value}")]
    #[diagnostic(code(pln::serialize::non_finite_float))]
    NonFiniteFloat { value: f64 },

    #[error("indent {indent:?} must contain only whitespace")]
    #[diagnostic(code(pln::serialize::invalid_indent))]
    InvalidIndent { indent: String },
}
