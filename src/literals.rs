//! Datetime, path and URL literals.
//!
//! The host runtime represents these as dictionaries tagged with `__type` and
//! carrying their decomposed parts. This module builds those dictionaries from
//! the `@...` literal text and turns resolved fields back into literal text.

use crate::error::SerializeError;
use crate::value::{Dictionary, Value, TYPE_KEY};
use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Weekday,
};
use indexmap::IndexMap;

pub const DATETIME_TAG: &str = "datetime";
pub const PATH_TAG: &str = "path";
pub const URL_TAG: &str = "url";

/// Characters that end a path literal.
pub fn is_path_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ')' | ']' | '}' | ',' | ':')
}

/// Characters that end a URL literal.
pub fn is_url_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ')' | ']' | '}' | ',')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateTimeKind {
    Date,
    Time,
    DateTime,
}

impl DateTimeKind {
    fn as_str(self) -> &'static str {
        match self {
            DateTimeKind::Date => "date",
            DateTimeKind::Time => "time",
            DateTimeKind::DateTime => "datetime",
        }
    }
}

/// Parses the text after `@` of a datetime literal.
///
/// Accepted forms, tried in order: datetime with `Z` or an offset, plain
/// datetime, date, time (optionally prefixed with `T`). Plain values are taken
/// as UTC; time-only values are placed on 1970-01-01.
pub fn parse_datetime(literal: &str) -> Option<Dictionary> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(literal) {
        let timezone = if literal.ends_with(['Z', 'z']) {
            "UTC".to_string()
        } else {
            dt.offset().to_string()
        };
        return Some(datetime_dict(
            DateTimeKind::DateTime,
            dt.naive_local(),
            dt.timestamp(),
            dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            Some(timezone),
        ));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M:%S%.f") {
        let utc = naive.and_utc();
        return Some(datetime_dict(
            DateTimeKind::DateTime,
            naive,
            utc.timestamp(),
            utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            None,
        ));
    }

    if let Ok(date) = NaiveDate::parse_from_str(literal, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        let utc = naive.and_utc();
        return Some(datetime_dict(
            DateTimeKind::Date,
            naive,
            utc.timestamp(),
            utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            None,
        ));
    }

    let time_text = literal.strip_prefix('T').unwrap_or(literal);
    if let Ok(time) = NaiveTime::parse_from_str(time_text, "%H:%M:%S%.f") {
        let naive = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(time);
        let utc = naive.and_utc();
        return Some(datetime_dict(
            DateTimeKind::Time,
            naive,
            utc.timestamp(),
            utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            None,
        ));
    }

    None
}

fn datetime_dict(
    kind: DateTimeKind,
    local: NaiveDateTime,
    unix: i64,
    iso: String,
    timezone: Option<String>,
) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.insert(TYPE_KEY, Value::from(DATETIME_TAG));
    dict.insert("kind", Value::from(kind.as_str()));
    dict.insert("year", Value::Integer(i64::from(local.year())));
    dict.insert("month", Value::Integer(i64::from(local.month())));
    dict.insert("day", Value::Integer(i64::from(local.day())));
    dict.insert("hour", Value::Integer(i64::from(local.hour())));
    dict.insert("minute", Value::Integer(i64::from(local.minute())));
    dict.insert("second", Value::Integer(i64::from(local.second())));
    dict.insert("unix", Value::Integer(unix));
    dict.insert("weekday", Value::from(weekday_name(local.weekday())));
    dict.insert("iso", Value::String(iso));
    if let Some(timezone) = timezone {
        dict.insert("timezone", Value::String(timezone));
    }
    dict
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Splits a path literal into its segments. Empty segments are dropped.
pub fn parse_path(literal: &str) -> Dictionary {
    let segments = literal
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(Value::from)
        .collect();

    let mut dict = Dictionary::new();
    dict.insert(TYPE_KEY, Value::from(PATH_TAG));
    dict.insert("absolute", Value::Boolean(literal.starts_with('/')));
    dict.insert("segments", Value::array(segments));
    dict
}

/// Decomposes `scheme://[user[:password]@]host[:port][/path][?query][#fragment]`.
///
/// Returns `None` when there is no `://`.
pub fn parse_url(literal: &str) -> Option<Dictionary> {
    let (scheme, rest) = literal.split_once("://")?;

    let (rest, fragment) = match rest.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (rest, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((rest, query)) => (rest, Some(query)),
        None => (rest, None),
    };
    let (authority, path) = match rest.find('/') {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };

    let (userinfo, host_port) = match authority.split_once('@') {
        Some((userinfo, host_port)) => (Some(userinfo), host_port),
        None => (None, authority),
    };
    let (username, password) = match userinfo {
        Some(info) => match info.split_once(':') {
            Some((user, password)) => (Some(user), Some(password)),
            None => (Some(info), None),
        },
        None => (None, None),
    };

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (host_port, None),
            }
        }
        _ => (host_port, None),
    };

    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(Value::from)
        .collect();

    let mut query_dict = Dictionary::new();
    for param in query.unwrap_or_default().split('&') {
        if param.is_empty() {
            continue;
        }
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        query_dict.insert(key, Value::from(value));
    }

    let optional = |text: Option<&str>| match text {
        Some(text) if !text.is_empty() => Value::from(text),
        _ => Value::Null,
    };

    let mut dict = Dictionary::new();
    dict.insert(TYPE_KEY, Value::from(URL_TAG));
    dict.insert("scheme", Value::from(scheme));
    dict.insert("username", optional(username));
    dict.insert("password", optional(password));
    dict.insert("host", Value::from(host));
    dict.insert(
        "port",
        port.map_or(Value::Null, |port| Value::Integer(i64::from(port))),
    );
    dict.insert("path", Value::array(segments));
    dict.insert("query", Value::dictionary(query_dict));
    dict.insert("fragment", optional(fragment));
    Some(dict)
}

/// Rebuilds the `@...` literal of a typed dictionary from its resolved fields.
pub fn render(tag: &str, fields: &IndexMap<String, Value>) -> Result<String, SerializeError> {
    match tag {
        DATETIME_TAG => render_datetime(fields),
        PATH_TAG => render_path(fields),
        URL_TAG => render_url(fields),
        other => Err(malformed(other, "unknown literal type")),
    }
}

fn render_datetime(fields: &IndexMap<String, Value>) -> Result<String, SerializeError> {
    let int = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_integer)
            .ok_or_else(|| malformed(DATETIME_TAG, &format!("missing integer field `{name}`")))
    };
    let kind = fields
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(DATETIME_TAG, "missing `kind` field"))?;

    match kind {
        "date" => {
            let date = calendar_date(int("year")?, int("month")?, int("day")?)?;
            Ok(format!("@{date}"))
        }
        "datetime" => {
            let date = calendar_date(int("year")?, int("month")?, int("day")?)?;
            let time = clock_time(int("hour")?, int("minute")?, int("second")?)?;
            let mut out = format!("@{date}T{time}");
            match fields.get("timezone") {
                Some(Value::String(tz)) if tz == "UTC" => out.push('Z'),
                Some(Value::String(tz)) if is_offset(tz) => out.push_str(tz),
                None | Some(Value::Null) => {}
                Some(_) => return Err(malformed(DATETIME_TAG, "unrecognized timezone")),
            }
            Ok(out)
        }
        "time" => {
            let time = clock_time(int("hour")?, int("minute")?, int("second")?)?;
            Ok(format!("@T{time}"))
        }
        other => Err(malformed(
            DATETIME_TAG,
            &format!("unknown datetime kind `{other}`"),
        )),
    }
}

/// `YYYY-MM-DD` for a real calendar date with a four-digit year.
fn calendar_date(year: i64, month: i64, day: i64) -> Result<String, SerializeError> {
    to_date(year, month, day)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| {
            malformed(
                DATETIME_TAG,
                &format!("{year}-{month}-{day} is not a calendar date"),
            )
        })
}

fn to_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    if !(0..=9999).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// `HH:MM:SS` for a valid wall-clock time.
fn clock_time(hour: i64, minute: i64, second: i64) -> Result<String, SerializeError> {
    to_time(hour, minute, second)
        .map(|time| time.format("%H:%M:%S").to_string())
        .ok_or_else(|| {
            malformed(
                DATETIME_TAG,
                &format!("{hour}:{minute}:{second} is not a time of day"),
            )
        })
}

fn to_time(hour: i64, minute: i64, second: i64) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
    )
}

/// `+HH:MM` or `-HH:MM`, with hours below 24 and minutes below 60.
fn is_offset(tz: &str) -> bool {
    let bytes = tz.as_bytes();
    let two_digits = |at: usize| {
        let (tens, ones) = (bytes[at], bytes[at + 1]);
        (tens.is_ascii_digit() && ones.is_ascii_digit())
            .then(|| (tens - b'0') * 10 + (ones - b'0'))
    };
    bytes.len() == 6
        && matches!(bytes[0], b'+' | b'-')
        && bytes[3] == b':'
        && two_digits(1).is_some_and(|hours| hours < 24)
        && two_digits(4).is_some_and(|minutes| minutes < 60)
}

fn render_path(fields: &IndexMap<String, Value>) -> Result<String, SerializeError> {
    let absolute = match fields.get("absolute") {
        Some(Value::Boolean(flag)) => *flag,
        _ => return Err(malformed(PATH_TAG, "missing boolean field `absolute`")),
    };
    let segments = string_segments(fields.get("segments"), PATH_TAG, "segments")?;

    let joined = segments.join("/");
    let text = if absolute {
        format!("/{joined}")
    } else {
        match segments.first().map(String::as_str) {
            None => "./".to_string(),
            Some("." | ".." | "~") if segments.len() == 1 => format!("{joined}/"),
            Some("." | ".." | "~") => joined,
            Some(_) => format!("./{joined}"),
        }
    };

    if text.chars().any(is_path_terminator) {
        return Err(malformed(PATH_TAG, "segment contains a reserved character"));
    }
    Ok(format!("@{text}"))
}

fn render_url(fields: &IndexMap<String, Value>) -> Result<String, SerializeError> {
    let scheme = text_field(fields, "scheme")?.ok_or_else(|| malformed(URL_TAG, "missing `scheme`"))?;
    if !matches!(scheme, "http" | "https") {
        return Err(malformed(
            URL_TAG,
            &format!("scheme `{scheme}` has no literal form"),
        ));
    }
    let mut out = format!("@{scheme}://");

    let username = text_field(fields, "username")?;
    let password = text_field(fields, "password")?;
    if username.is_some() || password.is_some() {
        out.push_str(username.unwrap_or_default());
        if let Some(password) = password {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }

    out.push_str(text_field(fields, "host")?.unwrap_or_default());

    match fields.get("port") {
        Some(Value::Integer(port)) if *port != 0 => out.push_str(&format!(":{port}")),
        Some(Value::Integer(_) | Value::Null) | None => {}
        Some(_) => return Err(malformed(URL_TAG, "field `port` must be an integer")),
    }

    let segments = string_segments(fields.get("path"), URL_TAG, "path")?;
    if !segments.is_empty() {
        out.push('/');
        out.push_str(&segments.join("/"));
    }

    if let Some(Value::Dictionary(query)) = fields.get("query") {
        let query = query.borrow();
        let mut params = Vec::with_capacity(query.len());
        for (key, field) in &query.entries {
            match field.as_value() {
                Some(Value::String(value)) => params.push(format!("{key}={value}")),
                _ => {
                    return Err(malformed(
                        URL_TAG,
                        &format!("query parameter `{key}` must be a string"),
                    ))
                }
            }
        }
        if !params.is_empty() {
            out.push('?');
            out.push_str(&params.join("&"));
        }
    }

    if let Some(fragment) = text_field(fields, "fragment")? {
        out.push('#');
        out.push_str(fragment);
    }

    if out.chars().any(is_url_terminator) {
        return Err(malformed(URL_TAG, "component contains a reserved character"));
    }
    Ok(out)
}

fn text_field<'f>(
    fields: &'f IndexMap<String, Value>,
    name: &str,
) -> Result<Option<&'f str>, SerializeError> {
    match fields.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s)),
        Some(Value::String(_) | Value::Null) | None => Ok(None),
        Some(_) => Err(malformed(URL_TAG, &format!("field `{name}` must be a string"))),
    }
}

fn string_segments(
    value: Option<&Value>,
    tag: &str,
    name: &str,
) -> Result<Vec<String>, SerializeError> {
    let Some(Value::Array(items)) = value else {
        return Err(malformed(tag, &format!("missing array field `{name}`")));
    };
    items
        .borrow()
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(tag, &format!("`{name}` must contain only strings")))
        })
        .collect()
}

fn malformed(tag: &str, reason: &str) -> SerializeError {
    SerializeError::MalformedLiteral {
        tag: tag.to_string(),
        reason: reason.to_string(),
    }
}
