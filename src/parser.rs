use crate::currency::{self, DEFAULT_SCALE, MAX_SCALE};
use crate::env::{Environment, Field};
use crate::error::{ParseErrors, ParserError};
use crate::lexer::{Lexer, Token, TokenType};
use crate::literals;
use crate::schema::{Schema, SchemaResolver};
use crate::utils::get_line_and_column;
use crate::value::{Dictionary, Money, Record, RecordError, Value};
use indexmap::IndexMap;
use miette::{NamedSource, SourceSpan};
use std::rc::Rc;
use std::sync::Arc;

/// Containers deeper than this are rejected.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Code given to field errors read from an `@errors` block.
pub const RECORD_ERROR_CODE: &str = "PLN";

/// Default name used for the source in diagnostics.
pub const DEFAULT_SOURCE_NAME: &str = "source.pln";

/// A recursive descent parser for PLN.
///
/// The parser does not stop at the first problem: after a bad element or entry
/// it skips to the next `,` or closing delimiter and carries on, so a single
/// run reports every independent error.
pub struct Parser<'a> {
    source: Arc<NamedSource<String>>,
    /// Always ends with `Eof`; `advance` never moves past it.
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
    errors: Vec<ParserError>,
    depth: usize,
    resolver: Option<&'a dyn SchemaResolver>,
    env: Option<Rc<dyn Environment>>,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Self {
        Self::new_with_name(source_text, DEFAULT_SOURCE_NAME.to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Self {
        let source = Arc::new(NamedSource::new(name, source_text.to_string()));
        let mut lexer = Lexer::new(source_text);
        let tokens: Vec<Token> = lexer
            .lex()
            .into_iter()
            .filter(|t| !t.is_trivia())
            .collect();

        Self {
            source,
            tokens,
            position: 0,
            source_text,
            errors: Vec::new(),
            depth: 0,
            resolver: None,
            env: None,
        }
    }

    /// Schemas for record literals are looked up here first.
    pub fn with_resolver(mut self, resolver: &'a dyn SchemaResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Environment attached to every parsed dictionary and record.
    pub fn with_env(mut self, env: Rc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    // === Main Parsing Methods ===

    /// Document ::= Value EOF
    pub fn parse(&mut self) -> Result<Value, ParseErrors> {
        log::debug!(
            "parsing {} ({} tokens)",
            self.source.name(),
            self.tokens.len()
        );

        let value = self.parse_value();
        if value.is_some() && !self.check(&TokenType::Eof) {
            let token = self.current_token().clone();
            let (src, span, line, column) = self.locate(&token);
            self.errors.push(ParserError::TrailingContent {
                src,
                span,
                line,
                column,
                found: token.ttype.to_string(),
            });
        }

        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => {
                log::debug!(
                    "parsing {} failed with {} error(s)",
                    self.source.name(),
                    self.errors.len()
                );
                Err(ParseErrors::new(std::mem::take(&mut self.errors)))
            }
        }
    }

    /// Value ::= Dictionary | Array | Record | Literal
    ///
    /// Returns `None` after recording an error.
    fn parse_value(&mut self) -> Option<Value> {
        let token = self.current_token().clone();

        match token.ttype {
            TokenType::LBrace => self.nested(Self::parse_dictionary),
            TokenType::LBracket => self.nested(Self::parse_array),
            TokenType::At => self.nested(Self::parse_record),
            TokenType::String(s) => {
                self.advance();
                Some(Value::String(s))
            }
            TokenType::Integer(ref text) => {
                self.advance();
                match text.parse::<i64>() {
                    Ok(n) => Some(Value::Integer(n)),
                    Err(_) => self.invalid_literal(&token, format!("integer `{text}` is out of range")),
                }
            }
            TokenType::Float(ref text) => {
                self.advance();
                match text.parse::<f64>() {
                    Ok(f) if f.is_finite() => Some(Value::Float(f)),
                    _ => self.invalid_literal(&token, format!("float `{text}` is out of range")),
                }
            }
            TokenType::True => {
                self.advance();
                Some(Value::Boolean(true))
            }
            TokenType::False => {
                self.advance();
                Some(Value::Boolean(false))
            }
            TokenType::Null => {
                self.advance();
                Some(Value::Null)
            }
            TokenType::DateTime(ref text) => {
                self.advance();
                match literals::parse_datetime(text) {
                    Some(dict) => Some(Value::dictionary(dict)),
                    None => self.invalid_literal(&token, format!("invalid datetime `@{text}`")),
                }
            }
            TokenType::Path(ref text) => {
                self.advance();
                Some(Value::dictionary(literals::parse_path(text)))
            }
            TokenType::Url(ref text) => {
                self.advance();
                match literals::parse_url(text) {
                    Some(dict) => Some(Value::dictionary(dict)),
                    None => self.invalid_literal(&token, format!("invalid url `@{text}`")),
                }
            }
            TokenType::Money(ref text) => {
                self.advance();
                self.parse_money(&token, text)
            }
            TokenType::Errors => {
                self.advance();
                let (src, span, line, column) = self.locate(&token);
                self.errors.push(ParserError::OrphanErrors {
                    src,
                    span,
                    line,
                    column,
                });
                None
            }
            TokenType::Illegal(ref message) => {
                self.advance();
                let (src, span, line, column) = self.locate(&token);
                self.errors.push(ParserError::IllegalToken {
                    src,
                    span,
                    line,
                    column,
                    message: message.clone(),
                });
                None
            }
            TokenType::Identifier(ref name) => {
                self.advance();
                let (src, span, line, column) = self.locate(&token);
                self.errors.push(ParserError::BareIdentifier {
                    src,
                    span,
                    line,
                    column,
                    name: name.clone(),
                });
                None
            }
            _ => self.err_unexpected("a value"),
        }
    }

    /// Runs a container parser one nesting level deeper.
    fn nested(&mut self, parse: fn(&mut Self) -> Option<Value>) -> Option<Value> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.current_token().clone();
            let (src, span, line, column) = self.locate(&token);
            self.errors.push(ParserError::DepthExceeded {
                src,
                span,
                line,
                column,
                max: MAX_NESTING_DEPTH,
            });
            return None;
        }

        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    /// Array ::= "[" [ Value { "," Value } [ "," ] ] "]"
    fn parse_array(&mut self) -> Option<Value> {
        let open = self.current_token().clone();
        self.advance();

        let mut elements = Vec::new();
        loop {
            if self.at_list_end() {
                break;
            }
            match self.parse_value() {
                Some(value) => elements.push(value),
                None => self.recover()?,
            }
            if self.match_token(&TokenType::Comma) {
                continue;
            }
            if self.at_list_end() {
                break;
            }
            self.err_unexpected::<()>("`,` or `]`");
            self.recover()?;
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.close(&open, &TokenType::RBracket, ']', "array")?;
        Some(Value::array(elements))
    }

    /// Dictionary ::= "{" [ Entry { "," Entry } [ "," ] ] "}"
    fn parse_dictionary(&mut self) -> Option<Value> {
        let open = self.current_token().clone();
        self.advance();

        let entries = self.parse_entries(&open, "dictionary", Self::parse_value)?;
        Some(Value::dictionary(Dictionary {
            entries,
            env: self.env.clone(),
        }))
    }

    /// Parses entries up to and including the closing `}`. The opening `{`
    /// has already been consumed.
    ///
    /// Entry ::= Key ":" Value
    fn parse_entries(
        &mut self,
        open: &Token,
        construct: &'static str,
        parse_item: fn(&mut Self) -> Option<Value>,
    ) -> Option<IndexMap<String, Field>> {
        let mut entries = IndexMap::new();
        loop {
            if self.at_list_end() {
                break;
            }
            match self.parse_entry(parse_item) {
                Some((key, value)) => {
                    entries.insert(key, Field::Value(value));
                }
                None => self.recover()?,
            }
            if self.match_token(&TokenType::Comma) {
                continue;
            }
            if self.at_list_end() {
                break;
            }
            self.err_unexpected::<()>("`,` or `}`");
            self.recover()?;
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.close(open, &TokenType::RBrace, '}', construct)?;
        Some(entries)
    }

    fn parse_entry(&mut self, parse_item: fn(&mut Self) -> Option<Value>) -> Option<(String, Value)> {
        let key = self.parse_key()?;
        if !self.match_token(&TokenType::Colon) {
            return self.err_unexpected("`:`");
        }
        let value = parse_item(self)?;
        Some((key, value))
    }

    /// Key ::= Identifier | String
    fn parse_key(&mut self) -> Option<String> {
        match &self.current_token().ttype {
            TokenType::Identifier(name) | TokenType::String(name) => {
                let key = name.clone();
                self.advance();
                Some(key)
            }
            _ => self.err_unexpected("a key"),
        }
    }

    /// Record ::= "@" Identifier "(" "{" Entries "}" ")" [ "@errors" "{" Entries "}" ]
    fn parse_record(&mut self) -> Option<Value> {
        self.advance(); // Consume '@'

        let name = match &self.current_token().ttype {
            TokenType::Identifier(name) => name.clone(),
            _ => return self.err_unexpected("a schema name after `@`"),
        };
        self.advance();

        let open_paren = self.current_token().clone();
        if open_paren.ttype != TokenType::LParen {
            let (src, span, line, column) = self.locate(&open_paren);
            self.errors.push(ParserError::MissingParen {
                src,
                span,
                line,
                column,
                schema: name,
                found: open_paren.ttype.to_string(),
            });
            return None;
        }
        self.advance();

        let open_brace = self.current_token().clone();
        if !self.match_token(&TokenType::LBrace) {
            return self.err_unexpected("`{` to start the record fields");
        }
        let data = self.parse_entries(&open_brace, "record fields", Self::parse_value)?;
        self.close(&open_paren, &TokenType::RParen, ')', "record")?;

        let mut record = Record::new(self.resolve_schema(&name, &data));
        record.data = data;
        record.env = self.env.clone();

        if self.match_token(&TokenType::Errors) {
            let open = self.current_token().clone();
            if !self.match_token(&TokenType::LBrace) {
                return self.err_unexpected("`{` after `@errors`");
            }
            let errors = self.parse_entries(&open, "record errors", Self::parse_error_message)?;
            for (field, message) in errors {
                if let Field::Value(Value::String(message)) = message {
                    record.add_error(field, RecordError::new(RECORD_ERROR_CODE, message));
                }
            }
            record.validated = true;
        }

        Some(Value::record(record))
    }

    /// The value of an `@errors` entry: a message string.
    fn parse_error_message(&mut self) -> Option<Value> {
        let token = self.current_token().clone();
        match &token.ttype {
            TokenType::String(message) => {
                self.advance();
                Some(Value::String(message.clone()))
            }
            TokenType::RBrace | TokenType::Comma | TokenType::Eof => self.err_unexpected("a message"),
            other => self.invalid_literal(
                &token,
                format!("field error messages must be strings, got {other}"),
            ),
        }
    }

    fn resolve_schema(&self, name: &str, data: &IndexMap<String, Field>) -> Rc<Schema> {
        if let Some(schema) = self.resolver.and_then(|resolver| resolver.resolve(name)) {
            return schema;
        }
        log::debug!(
            "no schema registered for `{name}`, synthesizing one from {} field(s)",
            data.len()
        );
        Rc::new(Schema::synthesize(name, data.keys()))
    }

    /// Turns a normalized `CODE#[-]whole[.fraction]` token into smallest units.
    fn parse_money(&mut self, token: &Token, text: &str) -> Option<Value> {
        let Some((code, amount)) = text.split_once('#') else {
            return self.invalid_literal(token, format!("invalid money literal `{text}`"));
        };
        let (negative, digits) = match amount.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, amount),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        let scale = currency::known_scale(code).unwrap_or_else(|| {
            let supplied = u8::try_from(fraction.len()).unwrap_or(MAX_SCALE);
            DEFAULT_SCALE.max(supplied)
        });

        match currency::to_minor_units(whole, fraction, scale) {
            Some(units) => {
                let amount = if negative { -units } else { units };
                Some(Value::Money(Money::with_scale(amount, code, scale)))
            }
            None => self.invalid_literal(token, format!("money amount `{text}` is out of range")),
        }
    }

    // === Parser Helper Methods ===

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: &TokenType) -> bool {
        std::mem::discriminant(&self.current_token().ttype) == std::mem::discriminant(ttype)
    }

    /// Any closing delimiter ends a list; `close` decides whether it is the
    /// right one.
    fn at_list_end(&self) -> bool {
        matches!(
            self.current_token().ttype,
            TokenType::RBrace | TokenType::RBracket | TokenType::RParen | TokenType::Eof
        )
    }

    /// Consumes `closer` or reports the missing delimiter of `open`'s construct.
    fn close(
        &mut self,
        open: &Token,
        closer: &TokenType,
        delimiter: char,
        construct: &'static str,
    ) -> Option<()> {
        if self.match_token(closer) {
            return Some(());
        }

        let token = self.current_token().clone();
        let (src, span, line, column) = self.locate(&token);
        log::trace!(
            "{construct} opened at byte {} is missing `{delimiter}`",
            open.pos_start
        );
        self.errors.push(ParserError::MissingDelimiter {
            src,
            span,
            line,
            column,
            delimiter,
            construct,
            found: token.ttype.to_string(),
        });
        None
    }

    /// Skips to the next `,` or closing delimiter of the current container.
    /// Returns `None` when the input ran out first.
    fn recover(&mut self) -> Option<()> {
        let mut nesting = 0usize;
        loop {
            match self.current_token().ttype {
                TokenType::Eof => return None,
                TokenType::LBrace | TokenType::LBracket | TokenType::LParen => nesting += 1,
                TokenType::RBrace | TokenType::RBracket | TokenType::RParen => {
                    if nesting == 0 {
                        return Some(());
                    }
                    nesting -= 1;
                }
                TokenType::Comma if nesting == 0 => return Some(()),
                _ => {}
            }
            log::trace!("skipping {} while recovering", self.current_token().ttype);
            self.advance();
        }
    }

    fn locate(&self, token: &Token) -> (NamedSource<String>, SourceSpan, usize, usize) {
        let (line, column) = get_line_and_column(self.source_text, token.pos_start);
        let span: SourceSpan = (token.pos_start, token.pos_end - token.pos_start).into();
        ((*self.source).clone(), span, line, column)
    }

    fn err_unexpected<T>(&mut self, expected: &str) -> Option<T> {
        let token = self.current_token().clone();
        let (src, span, line, column) = self.locate(&token);
        self.errors.push(ParserError::UnexpectedToken {
            src,
            span,
            line,
            column,
            expected: expected.to_string(),
            found: token.ttype.to_string(),
        });
        None
    }

    fn invalid_literal<T>(&mut self, token: &Token, message: String) -> Option<T> {
        let (src, span, line, column) = self.locate(token);
        self.errors.push(ParserError::InvalidLiteral {
            src,
            span,
            line,
            column,
            message,
        });
        None
    }
}
