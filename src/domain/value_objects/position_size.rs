use serde::{Deserialize, Serialize};

/// Position size label selected in the dashboard, mapped to the fraction
/// of current equity committed when the position is opened.
///
/// Unknown labels fall back to the full size (0.10), matching the wire
/// contract's lenient handling of the size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PositionSize {
    Full,
    Half,
    Quarter,
    Auto,
}

impl PositionSize {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "1/2" => PositionSize::Half,
            "1/4" => PositionSize::Quarter,
            "auto" => PositionSize::Auto,
            _ => PositionSize::Full,
        }
    }

    /// Fraction of current equity allocated at open time.
    pub fn fraction(&self) -> f64 {
        match self {
            PositionSize::Full => 0.10,
            PositionSize::Half => 0.05,
            PositionSize::Quarter => 0.025,
            PositionSize::Auto => 0.10,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PositionSize::Full => "1",
            PositionSize::Half => "1/2",
            PositionSize::Quarter => "1/4",
            PositionSize::Auto => "auto",
        }
    }
}

impl From<String> for PositionSize {
    fn from(label: String) -> Self {
        PositionSize::parse(&label)
    }
}

impl From<PositionSize> for String {
    fn from(size: PositionSize) -> Self {
        size.label().to_string()
    }
}

impl std::fmt::Display for PositionSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_labels() {
        assert_eq!(PositionSize::parse("1"), PositionSize::Full);
        assert_eq!(PositionSize::parse("1/2"), PositionSize::Half);
        assert_eq!(PositionSize::parse("1/4"), PositionSize::Quarter);
        assert_eq!(PositionSize::parse("auto"), PositionSize::Auto);
    }

    #[test]
    fn test_parse_unknown_label_defaults_to_full() {
        assert_eq!(PositionSize::parse("3/4"), PositionSize::Full);
        assert_eq!(PositionSize::parse(""), PositionSize::Full);
    }

    #[test]
    fn test_fractions() {
        assert_eq!(PositionSize::Full.fraction(), 0.10);
        assert_eq!(PositionSize::Half.fraction(), 0.05);
        assert_eq!(PositionSize::Quarter.fraction(), 0.025);
        assert_eq!(PositionSize::Auto.fraction(), 0.10);
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&PositionSize::Half).unwrap();
        assert_eq!(json, "\"1/2\"");
        let parsed: PositionSize = serde_json::from_str("\"1/4\"").unwrap();
        assert_eq!(parsed, PositionSize::Quarter);
    }
}
