use crate::currency;
use crate::literals::{is_path_terminator, is_url_terminator};
use std::fmt;

/// Represents the different kinds of tokens that the lexer can produce.
/// Each token is a meaningful unit of the PLN syntax.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input.
    Eof,
    /// Represents a sequence of one or more whitespace characters (spaces, tabs, newlines).
    Whitespace,
    /// Represents a comment, starting with `//` and continuing to the end of the line.
    /// The associated `String` contains the content of the comment.
    Comment(String),
    /// Input the lexer could not make sense of. The `String` describes the problem.
    Illegal(String),

    // == Literals ==
    /// An identifier, used for dictionary keys and schema names.
    Identifier(String),
    /// A string literal with its escapes already decoded.
    String(String),
    /// An integer literal as written, including a leading `-`.
    Integer(String),
    /// A float literal as written.
    Float(String),
    /// The text after `@` of a date, time or datetime literal.
    DateTime(String),
    /// The text after `@` of a path literal, e.g. `./config.pln`.
    Path(String),
    /// The text after `@` of a URL literal.
    Url(String),
    /// A validated money literal normalized to `CODE#[-]whole[.fraction]`.
    Money(String),

    // == Keywords ==
    True,
    False,
    Null,
    /// The `@errors` marker that introduces a record's field errors.
    Errors,

    // == Punctuation ==
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Left Parenthesis: `(`
    LParen,
    /// Right Parenthesis: `)`
    RParen,
    /// Comma: `,`
    Comma,
    /// Colon: `:`
    Colon,
    /// At: `@` (starts a record, e.g. `@User({...})`)
    At,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Eof => write!(f, "end of input"),
            TokenType::Whitespace => write!(f, "whitespace"),
            TokenType::Comment(_) => write!(f, "comment"),
            TokenType::Illegal(message) => write!(f, "illegal token ({message})"),
            TokenType::Identifier(name) => write!(f, "identifier `{name}`"),
            TokenType::String(s) => write!(f, "string {s:?}"),
            TokenType::Integer(n) | TokenType::Float(n) => write!(f, "number `{n}`"),
            TokenType::DateTime(s) => write!(f, "datetime `@{s}`"),
            TokenType::Path(s) => write!(f, "path `@{s}`"),
            TokenType::Url(s) => write!(f, "url `@{s}`"),
            TokenType::Money(s) => write!(f, "money `{s}`"),
            TokenType::True => write!(f, "`true`"),
            TokenType::False => write!(f, "`false`"),
            TokenType::Null => write!(f, "`null`"),
            TokenType::Errors => write!(f, "`@errors`"),
            TokenType::LBrace => write!(f, "`{{`"),
            TokenType::RBrace => write!(f, "`}}`"),
            TokenType::LBracket => write!(f, "`[`"),
            TokenType::RBracket => write!(f, "`]`"),
            TokenType::LParen => write!(f, "`(`"),
            TokenType::RParen => write!(f, "`)`"),
            TokenType::Comma => write!(f, "`,`"),
            TokenType::Colon => write!(f, "`:`"),
            TokenType::At => write!(f, "`@`"),
        }
    }
}

/// A token with its type and byte position in the source.
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }

    /// Whitespace and comments, which the parser never sees.
    pub fn is_trivia(&self) -> bool {
        matches!(self.ttype, TokenType::Whitespace | TokenType::Comment(_))
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token.ttype == TokenType::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                ',' => TokenType::Comma,
                ':' => TokenType::Colon,
                '@' => self.read_at(),
                '/' => {
                    if self.peek() == Some('/') {
                        self.read_comment()
                    } else {
                        TokenType::Illegal("unexpected character '/'".to_string())
                    }
                }
                '"' => self.read_string(),
                c if c.is_whitespace() => self.read_whitespace(),
                c @ ('$' | '£' | '€' | '¥') => match currency::symbol_currency(c) {
                    Some(code) => self.read_money(code),
                    None => TokenType::Illegal(format!("unknown currency symbol {c:?}")),
                },
                c if c.is_ascii_uppercase() && self.at_currency_code() => {
                    let code = self.read_currency_code(c);
                    self.read_money(&code)
                }
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(c),
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek().is_some_and(|c| c.is_ascii_digit())) =>
                {
                    self.read_number(c)
                }

                c => TokenType::Illegal(format!("unexpected character {c:?}")),
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.position)
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.peek();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Consumes characters while `keep` holds and returns them.
    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.position;
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.position += c.len_utf8();
        }
        &self.input[start..self.position]
    }

    fn read_whitespace(&mut self) -> TokenType {
        self.take_while(char::is_whitespace);
        TokenType::Whitespace
    }

    fn read_comment(&mut self) -> TokenType {
        self.advance(); // Consume the second '/'
        let comment_text = self.take_while(|c| c != '\n');
        TokenType::Comment(comment_text.trim().to_string())
    }

    fn read_string(&mut self) -> TokenType {
        let mut value = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => return TokenType::String(value),
                '\\' => match self.advance() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('/') => value.push('/'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('u') => match self.read_unicode_escape() {
                        Ok(decoded) => value.push(decoded),
                        Err(message) => return self.abandon_string(message),
                    },
                    Some(other) => {
                        return self.abandon_string(format!("unknown escape sequence \\{other}"))
                    }
                    None => return TokenType::Illegal("unterminated string".to_string()),
                },
                c => value.push(c),
            }
        }
        TokenType::Illegal("unterminated string".to_string())
    }

    /// Skips the rest of a string after a bad escape so lexing resumes after it.
    fn abandon_string(&mut self, message: String) -> TokenType {
        while let Some(c) = self.advance() {
            match c {
                '"' => break,
                '\\' => {
                    self.advance();
                }
                _ => {}
            }
        }
        TokenType::Illegal(message)
    }

    /// Decodes the `XXXX` of a `\uXXXX` escape, joining UTF-16 surrogate pairs.
    fn read_unicode_escape(&mut self) -> Result<char, String> {
        let high = self.read_hex4()?;
        if !(0xD800..0xDC00).contains(&high) {
            return char::from_u32(high).ok_or_else(|| format!("invalid code point \\u{high:04x}"));
        }

        if !self.rest().starts_with("\\u") {
            return Err(format!("unpaired surrogate \\u{high:04x}"));
        }
        self.position += 2;
        let low = self.read_hex4()?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(format!("unpaired surrogate \\u{high:04x}"));
        }
        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(combined).ok_or_else(|| format!("invalid code point \\u{combined:x}"))
    }

    fn read_hex4(&mut self) -> Result<u32, String> {
        let digits: String = self.rest().chars().take(4).collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid unicode escape \\u{digits}"));
        }
        self.position += 4;
        u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())
    }

    fn read_identifier(&mut self, first_char: char) -> TokenType {
        let mut ident = String::new();
        ident.push(first_char);
        ident.push_str(self.take_while(is_identifier_char));

        match ident.as_str() {
            "true" => TokenType::True,
            "false" => TokenType::False,
            "null" => TokenType::Null,
            _ => TokenType::Identifier(ident),
        }
    }

    fn read_number(&mut self, first_char: char) -> TokenType {
        let mut number_str = String::new();
        number_str.push(first_char);
        number_str.push_str(self.take_while(|c| c.is_ascii_digit()));
        let mut is_float = false;

        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            number_str.push('.');
            number_str.push_str(self.take_while(|c| c.is_ascii_digit()));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_nth(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..digit_at {
                    if let Some(c) = self.advance() {
                        number_str.push(c);
                    }
                }
                number_str.push_str(self.take_while(|c| c.is_ascii_digit()));
            }
        }

        if is_float {
            TokenType::Float(number_str)
        } else {
            TokenType::Integer(number_str)
        }
    }

    /// Decides what an `@` starts by looking at what follows it.
    fn read_at(&mut self) -> TokenType {
        let rest = self.rest();

        if rest.starts_with("http://") || rest.starts_with("https://") {
            let url = self.take_while(|c| !is_url_terminator(c));
            return TokenType::Url(url.to_string());
        }

        if ["/", "./", "../", "~/"].iter().any(|p| rest.starts_with(p)) {
            let path = self.take_while(|c| !is_path_terminator(c));
            return TokenType::Path(path.to_string());
        }

        let time_only = self.peek() == Some('T')
            && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            && self.peek_nth(2).is_some_and(|c| c.is_ascii_digit())
            && self.peek_nth(3) == Some(':');
        if time_only || self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let literal = self.take_while(is_datetime_char);
            return TokenType::DateTime(literal.to_string());
        }

        if rest.starts_with("errors") && !rest[6..].starts_with(is_identifier_char) {
            self.position += "errors".len();
            return TokenType::Errors;
        }

        TokenType::At
    }

    /// Two or three uppercase letters followed by `#`, starting at the
    /// character just consumed.
    fn at_currency_code(&self) -> bool {
        let letters = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_uppercase())
            .count();
        (1..=2).contains(&letters) && self.peek_nth(letters) == Some('#')
    }

    fn read_currency_code(&mut self, first_char: char) -> String {
        let mut code = String::new();
        code.push(first_char);
        code.push_str(self.take_while(|c| c.is_ascii_uppercase()));
        self.advance(); // Consume the '#'
        code
    }

    /// Reads the amount of a money literal and checks it against the
    /// currency's scale.
    fn read_money(&mut self, code: &str) -> TokenType {
        let negative = self.peek() == Some('-');
        if negative {
            self.advance();
        }

        let whole = self.take_while(|c| c.is_ascii_digit());
        if whole.is_empty() {
            return TokenType::Illegal("currency symbol must be followed by a number".to_string());
        }
        let fraction = if self.peek() == Some('.')
            && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            self.take_while(|c| c.is_ascii_digit())
        } else {
            ""
        };

        match currency::known_scale(code) {
            Some(0) if !fraction.is_empty() => {
                return TokenType::Illegal(format!("{code} does not allow decimal places"));
            }
            Some(scale) if fraction.len() > usize::from(scale) => {
                return TokenType::Illegal(format!("{code} allows max {scale} decimal places"));
            }
            None if fraction.len() > usize::from(currency::MAX_SCALE) => {
                return TokenType::Illegal(format!(
                    "{code} allows max {} decimal places",
                    currency::MAX_SCALE
                ));
            }
            _ => {}
        }

        let sign = if negative { "-" } else { "" };
        let normalized = if fraction.is_empty() {
            format!("{code}#{sign}{whole}")
        } else {
            format!("{code}#{sign}{whole}.{fraction}")
        };
        TokenType::Money(normalized)
    }
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_datetime_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | ':' | 'T' | 'Z' | '+' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tokens(input: &str, expected: Vec<TokenType>) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.lex();

        // Filter out whitespace and comments for most tests
        let filtered_tokens: Vec<TokenType> = tokens
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| t.ttype)
            .collect();

        assert_eq!(filtered_tokens, expected);
    }

    fn single(input: &str) -> TokenType {
        Lexer::new(input).next_token().ttype
    }

    #[test]
    fn test_eof() {
        assert_tokens("", vec![TokenType::Eof]);
    }

    #[test]
    fn test_single_char_tokens() {
        let input = "{}[](),:";
        let expected = vec![
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::LBracket,
            TokenType::RBracket,
            TokenType::LParen,
            TokenType::RParen,
            TokenType::Comma,
            TokenType::Colon,
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let input = "true false null on trueish _key";
        let expected = vec![
            TokenType::True,
            TokenType::False,
            TokenType::Null,
            TokenType::Identifier("on".to_string()),
            TokenType::Identifier("trueish".to_string()),
            TokenType::Identifier("_key".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_numbers() {
        let input = "123 45.67 -10 0.5 1e3 -2.5E-2 7.";
        let expected = vec![
            TokenType::Integer("123".to_string()),
            TokenType::Float("45.67".to_string()),
            TokenType::Integer("-10".to_string()),
            TokenType::Float("0.5".to_string()),
            TokenType::Float("1e3".to_string()),
            TokenType::Float("-2.5E-2".to_string()),
            TokenType::Integer("7".to_string()),
            TokenType::Illegal("unexpected character '.'".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            single(r#""say \"hi\"\n\t\\ \/ é""#),
            TokenType::String("say \"hi\"\n\t\\ / é".to_string())
        );
        assert_eq!(
            single(r#""\ud83d\ude00 \u00e9""#),
            TokenType::String("😀 é".to_string())
        );
    }

    #[test]
    fn test_bad_strings_are_illegal() {
        assert_eq!(
            single(r#""open"#),
            TokenType::Illegal("unterminated string".to_string())
        );
        assert_eq!(
            single(r#""\q""#),
            TokenType::Illegal("unknown escape sequence \\q".to_string())
        );
        assert!(matches!(single(r#""\u12""#), TokenType::Illegal(_)));
        assert!(matches!(single(r#""\ud800x""#), TokenType::Illegal(_)));

        // Lexing resumes after the abandoned string.
        assert_tokens(
            r#"["\q", 1]"#,
            vec![
                TokenType::LBracket,
                TokenType::Illegal("unknown escape sequence \\q".to_string()),
                TokenType::Comma,
                TokenType::Integer("1".to_string()),
                TokenType::RBracket,
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_comments_and_whitespace() {
        let input = " // this is a comment\n key: 1 // another one";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.lex();
        let token_types: Vec<TokenType> = tokens.into_iter().map(|t| t.ttype).collect();

        let expected = vec![
            TokenType::Whitespace,
            TokenType::Comment("this is a comment".to_string()),
            TokenType::Whitespace,
            TokenType::Identifier("key".to_string()),
            TokenType::Colon,
            TokenType::Whitespace,
            TokenType::Integer("1".to_string()),
            TokenType::Whitespace,
            TokenType::Comment("another one".to_string()),
            TokenType::Eof,
        ];

        assert_eq!(token_types, expected);
    }

    #[test]
    fn test_at_disambiguation() {
        let input = "@https://x.io/a?b=c @/etc/hosts @./a @../b @~/c @2024-01-15 \
                     @2024-01-20T10:30:00+05:30 @T10:30:00 @errors @User @errorsList";
        let expected = vec![
            TokenType::Url("https://x.io/a?b=c".to_string()),
            TokenType::Path("/etc/hosts".to_string()),
            TokenType::Path("./a".to_string()),
            TokenType::Path("../b".to_string()),
            TokenType::Path("~/c".to_string()),
            TokenType::DateTime("2024-01-15".to_string()),
            TokenType::DateTime("2024-01-20T10:30:00+05:30".to_string()),
            TokenType::DateTime("T10:30:00".to_string()),
            TokenType::Errors,
            TokenType::At,
            TokenType::Identifier("User".to_string()),
            TokenType::At,
            TokenType::Identifier("errorsList".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_literals_stop_at_terminators() {
        assert_tokens(
            "[@/tmp/a, @http://h:80/p]",
            vec![
                TokenType::LBracket,
                TokenType::Path("/tmp/a".to_string()),
                TokenType::Comma,
                TokenType::Url("http://h:80/p".to_string()),
                TokenType::RBracket,
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_money_literals() {
        let input = "$19.99 $-5 £3.5 €10 ¥500 USD#-12.34 KWD#1.234 XYZ#1.2345 EU#7";
        let expected = vec![
            TokenType::Money("USD#19.99".to_string()),
            TokenType::Money("USD#-5".to_string()),
            TokenType::Money("GBP#3.5".to_string()),
            TokenType::Money("EUR#10".to_string()),
            TokenType::Money("JPY#500".to_string()),
            TokenType::Money("USD#-12.34".to_string()),
            TokenType::Money("KWD#1.234".to_string()),
            TokenType::Money("XYZ#1.2345".to_string()),
            TokenType::Money("EU#7".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_money_scale_violations() {
        assert_eq!(
            single("JPY#12.34"),
            TokenType::Illegal("JPY does not allow decimal places".to_string())
        );
        assert_eq!(
            single("USD#1.234"),
            TokenType::Illegal("USD allows max 2 decimal places".to_string())
        );
        assert_eq!(
            single("$"),
            TokenType::Illegal("currency symbol must be followed by a number".to_string())
        );
    }

    #[test]
    fn test_uppercase_identifier_is_not_money() {
        assert_tokens(
            "USD USDX#1",
            vec![
                TokenType::Identifier("USD".to_string()),
                TokenType::Identifier("USDX".to_string()),
                TokenType::Illegal("unexpected character '#'".to_string()),
                TokenType::Integer("1".to_string()),
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_token_positions() {
        let tokens = Lexer::new("{ €5 }").lex();
        assert_eq!((tokens[0].pos_start, tokens[0].pos_end), (0, 1));
        assert_eq!((tokens[2].pos_start, tokens[2].pos_end), (2, 6));
        assert_eq!((tokens[4].pos_start, tokens[4].pos_end), (7, 8));
    }
}
