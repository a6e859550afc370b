//! Currency codes, symbols and decimal scales shared by the lexer, the parser
//! and the serializer.

/// Scale used for currencies that are not in the table.
pub const DEFAULT_SCALE: u8 = 2;

/// Upper bound on fractional digits; keeps every amount within `i64`.
pub const MAX_SCALE: u8 = 18;

/// Decimal places of the ISO 4217 currencies PLN knows about.
pub fn known_scale(code: &str) -> Option<u8> {
    let scale = match code {
        "JPY" | "KRW" | "VND" | "CLP" => 0,
        "KWD" | "BHD" | "OMR" | "JOD" => 3,
        "USD" | "EUR" | "GBP" | "CHF" | "CAD" | "AUD" | "CNY" | "HKD" | "SGD" | "INR"
        | "BRL" | "MXN" | "NZD" | "SEK" | "NOK" | "DKK" | "ZAR" | "RUB" | "PLN" | "THB"
        | "MYR" | "PHP" | "IDR" | "COP" | "PEN" | "ARS" | "CZK" | "HUF" | "ILS" | "TRY"
        | "TWD" | "AED" | "SAR" | "QAR" | "EGP" | "PKR" | "NGN" => 2,
        _ => return None,
    };
    Some(scale)
}

pub fn scale_for(code: &str) -> u8 {
    known_scale(code).unwrap_or(DEFAULT_SCALE)
}

/// Currency implied by a single-character prefix.
pub fn symbol_currency(symbol: char) -> Option<&'static str> {
    match symbol {
        '$' => Some("USD"),
        '£' => Some("GBP"),
        '€' => Some("EUR"),
        '¥' => Some("JPY"),
        _ => None,
    }
}

/// `CODE` part of a `CODE#amount` literal: two or three uppercase ASCII letters.
pub fn is_currency_code(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// Converts the digits of a decimal amount into smallest units at `scale`.
///
/// Returns `None` if `fraction` is more precise than `scale`, if either part
/// contains something other than ASCII digits, or if the result overflows.
pub fn to_minor_units(whole: &str, fraction: &str, scale: u8) -> Option<i64> {
    let scale = usize::from(scale);
    if whole.is_empty() || fraction.len() > scale {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut amount: i64 = 0;
    for b in whole.bytes().chain(fraction.bytes()) {
        amount = amount.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
    }
    for _ in fraction.len()..scale {
        amount = amount.checked_mul(10)?;
    }
    Some(amount)
}

/// Renders `amount` smallest units with `scale` fractional digits, e.g. `-19.99`.
pub fn format_amount(amount: i64, scale: u8) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };
    let scale = usize::from(scale);
    if scale == 0 {
        return format!("{sign}{digits}");
    }

    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    format!("{sign}{whole}.{fraction}")
}

/// The canonical `CODE#amount` form, with the sign right after `#`.
pub fn format_money(currency: &str, amount: i64, scale: u8) -> String {
    format!("{currency}#{}", format_amount(amount, scale))
}
