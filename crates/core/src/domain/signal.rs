use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Color-family keywords checked in order against the model's color code.
/// The mapping is deliberately lossy: anything without a known keyword
/// (hex values, "gray", ...) reads as Hold.
const COLOR_KEYWORDS: &[(&str, Signal)] = &[
    ("green", Signal::Buy),
    ("teal", Signal::Buy),
    ("lime", Signal::Buy),
    ("red", Signal::Sell),
    ("orange", Signal::Sell),
    ("maroon", Signal::Sell),
];

impl Signal {
    pub fn from_color_code(color_code: &str) -> Self {
        let lower = color_code.to_ascii_lowercase();
        COLOR_KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, signal)| *signal)
            .unwrap_or(Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Buy => "Buy",
            Signal::Sell => "Sell",
            Signal::Hold => "Hold",
        })
    }
}
