//! Free-text component values such as `0.1uF 25V X5R 10%`.
//!
//! Each whitespace-separated word becomes a [`ValueToken`]. The first token
//! is the primary value, the rest are ratings and tolerances. Words without
//! a leading number keep only their raw text and are compared verbatim.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<mantissa>[+-]?[0-9]*(?:\.[0-9]+)?)(?:[eE](?P<exp>[+-]?[0-9]+))?")
        .expect("number pattern")
});

static RE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<mult>[GMkmuµμnp]?)(?P<unit>ppm|[%VAWFHRΩ]?)$").expect("suffix pattern")
});

/// SI multiplier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplier {
    Giga,
    Mega,
    Kilo,
    Milli,
    /// `u`, micro sign or Greek mu
    Micro,
    Nano,
    Pico,
}

impl Multiplier {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "G" => Some(Self::Giga),
            "M" => Some(Self::Mega),
            "k" => Some(Self::Kilo),
            "m" => Some(Self::Milli),
            "u" | "µ" | "μ" => Some(Self::Micro),
            "n" => Some(Self::Nano),
            "p" => Some(Self::Pico),
            _ => None,
        }
    }

    pub fn exponent(self) -> i32 {
        match self {
            Self::Giga => 9,
            Self::Mega => 6,
            Self::Kilo => 3,
            Self::Milli => -3,
            Self::Micro => -6,
            Self::Nano => -9,
            Self::Pico => -12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Farad,
    Henry,
    /// `R` or `Ω`
    Ohm,
    Percent,
    Ppm,
}

impl Unit {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "V" => Some(Self::Volt),
            "A" => Some(Self::Ampere),
            "W" => Some(Self::Watt),
            "F" => Some(Self::Farad),
            "H" => Some(Self::Henry),
            "R" | "Ω" => Some(Self::Ohm),
            "%" => Some(Self::Percent),
            "ppm" => Some(Self::Ppm),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Farad => "F",
            Unit::Henry => "H",
            Unit::Ohm => "Ω",
            Unit::Percent => "%",
            Unit::Ppm => "ppm",
        };
        write!(f, "{}", symbol)
    }
}

/// One word of a value string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueToken {
    pub raw: String,
    /// Leading numeric literal, before applying the multiplier.
    pub number: Option<Decimal>,
    pub multiplier: Option<Multiplier>,
    pub unit: Option<Unit>,
}

impl ValueToken {
    pub fn parse(word: &str) -> Self {
        let mut token = ValueToken {
            raw: word.to_string(),
            number: None,
            multiplier: None,
            unit: None,
        };

        let Some(number) = parse_number(word) else {
            return token;
        };
        token.number = Some(number);

        if let Some(caps) = RE_SUFFIX.captures(word) {
            token.multiplier = caps.name("mult").and_then(|m| Multiplier::from_symbol(m.as_str()));
            token.unit = caps.name("unit").and_then(|m| Unit::from_symbol(m.as_str()));
        }
        token
    }

    /// Number scaled by its multiplier, e.g. `10k` -> 10000.
    pub fn magnitude(&self) -> Option<Decimal> {
        let number = self.number?;
        match self.multiplier {
            Some(mult) => scale(number, mult.exponent()),
            None => Some(number),
        }
    }

    pub fn same_unit(&self, other: &ValueToken) -> bool {
        self.unit == other.unit
    }
}

/// Split a value string into tokens. Blank input gives no tokens.
pub fn tokenize(value: &str) -> Vec<ValueToken> {
    value.split_whitespace().map(ValueToken::parse).collect()
}

fn parse_number(word: &str) -> Option<Decimal> {
    let caps = RE_NUMBER.captures(word)?;
    let mantissa = caps.name("mantissa").map(|m| m.as_str()).unwrap_or("");
    let mantissa = parse_decimal(mantissa)?;
    match caps.name("exp") {
        Some(exp) => scale(mantissa, exp.as_str().parse().ok()?),
        None => Some(mantissa),
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if !digits.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let value = Decimal::from_str(&digits).ok()?;
    Some(if negative { -value } else { value })
}

/// `number * 10^exponent` in exact decimal arithmetic.
fn scale(number: Decimal, exponent: i32) -> Option<Decimal> {
    if number.is_zero() {
        return Some(Decimal::ZERO);
    }
    if exponent >= 0 {
        if exponent > 28 + number.scale() as i32 {
            return None;
        }
        let mut value = number;
        for _ in 0..exponent {
            value = value.checked_mul(Decimal::TEN)?;
        }
        Some(value)
    } else {
        let places = exponent.unsigned_abs();
        if places > 28 {
            return None;
        }
        number.checked_mul(Decimal::new(1, places))
    }
}
