use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The six strategy categories every analysis must cover, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrategyKind {
    Technical,
    Fundamental,
    Quantitative,
    Hybrid,
    ExtraFeatures,
    Institutional,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Technical,
        StrategyKind::Fundamental,
        StrategyKind::Quantitative,
        StrategyKind::Hybrid,
        StrategyKind::ExtraFeatures,
        StrategyKind::Institutional,
    ];

    pub fn title(self) -> &'static str {
        match self {
            StrategyKind::Technical => "Technical",
            StrategyKind::Fundamental => "Fundamental",
            StrategyKind::Quantitative => "Quantitative",
            StrategyKind::Hybrid => "Hybrid",
            StrategyKind::ExtraFeatures => "Extra-Features",
            StrategyKind::Institutional => "Institutional",
        }
    }

    /// Matches a model-produced section title. Case-insensitive; hyphen and
    /// space are interchangeable ("Extra Features" == "Extra-Features").
    pub fn from_title(title: &str) -> Option<Self> {
        let normalized = title.trim().to_ascii_lowercase().replace(' ', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.title().to_ascii_lowercase() == normalized)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// On the wire a strategy kind is its canonical title ("Extra-Features"),
// matching the shape the flows parse.
impl Serialize for StrategyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.title())
    }
}

impl<'de> Deserialize<'de> for StrategyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let title = String::deserialize(deserializer)?;
        Self::from_title(&title)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown strategy title: {title:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySection {
    #[serde(rename = "title")]
    pub kind: StrategyKind,
    pub content: String,
    pub color_code: String,
}

/// A validated analysis: `strategies` always holds exactly one section per
/// `StrategyKind`, in `StrategyKind::ALL` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAnalysis {
    pub ticker: String,
    pub overall_analysis: String,
    pub overall_color_code: String,
    pub strategies: Vec<StrategySection>,
}
