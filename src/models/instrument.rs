//! Tradable instrument and negotiated contract duration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Contract duration unit as the venue spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "m",
            DurationUnit::Hours => "h",
            DurationUnit::Days => "d",
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 3_600,
            DurationUnit::Days => 86_400,
        }
    }
}

/// A contract duration such as `1m` or `15s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDuration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl ContractDuration {
    pub fn minutes(amount: u32) -> Self {
        Self {
            amount,
            unit: DurationUnit::Minutes,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        u64::from(self.amount) * self.unit.seconds()
    }

    /// Parse venue strings like `"15s"`, `"1m"`, `"2h"`, `"1d"`.
    /// A bare integer is taken as minutes.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let (digits, unit) = match s.char_indices().last()? {
            (i, 's') => (&s[..i], DurationUnit::Seconds),
            (i, 'm') => (&s[..i], DurationUnit::Minutes),
            (i, 'h') => (&s[..i], DurationUnit::Hours),
            (i, 'd') => (&s[..i], DurationUnit::Days),
            (_, c) if c.is_ascii_digit() => (s, DurationUnit::Minutes),
            _ => return None,
        };

        let amount = digits.trim().parse().ok()?;
        Some(Self { amount, unit })
    }
}

impl fmt::Display for ContractDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.as_str())
    }
}

/// Value object handed to the core by instrument discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub duration: ContractDuration,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, duration: ContractDuration) -> Self {
        Self {
            symbol: symbol.into(),
            duration,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(ContractDuration::parse("1m"), Some(ContractDuration::minutes(1)));
        assert_eq!(ContractDuration::parse("5"), Some(ContractDuration::minutes(5)));
        assert_eq!(
            ContractDuration::parse("15s"),
            Some(ContractDuration {
                amount: 15,
                unit: DurationUnit::Seconds
            })
        );
        assert_eq!(ContractDuration::parse("1d").map(|d| d.as_seconds()), Some(86_400));
        assert_eq!(ContractDuration::parse("x"), None);
        assert_eq!(ContractDuration::parse(""), None);
        assert_eq!(ContractDuration::parse("m"), None);
    }

    #[test]
    fn test_display() {
        let instrument = Instrument::new("R_25", ContractDuration::minutes(1));
        assert_eq!(instrument.to_string(), "R_25 (1m)");
    }
}
