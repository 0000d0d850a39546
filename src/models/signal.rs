//! Trade signals and the diagnostic indicator snapshot that accompanies them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete decision produced by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    None,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::None => "NONE",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named indicator values computed for the latest bar(s) of a window.
///
/// Derived each cycle and only used for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    values: BTreeMap<String, f64>,
    labels: BTreeMap<String, String>,
}

impl IndicatorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Attach a non-numeric annotation (crossing direction, vote tally, ...).
    pub fn label(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.labels.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn get_label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.labels.is_empty()
    }
}

impl fmt::Display for IndicatorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(no indicators)");
        }

        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}:{:.6}", name, value)?;
        }
        for (name, value) in &self.labels {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}:{}", name, value)?;
        }
        Ok(())
    }
}
