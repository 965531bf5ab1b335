use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed label set returned by the classifier. Serde round-trips the exact
/// wire strings; anything outside the set is a deserialization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LesionClass {
    Normal,
    Benign,
    Malignant,
}

impl LesionClass {
    pub const ALL: [LesionClass; 3] = [
        LesionClass::Normal,
        LesionClass::Benign,
        LesionClass::Malignant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LesionClass::Normal => "Normal",
            LesionClass::Benign => "Benign",
            LesionClass::Malignant => "Malignant",
        }
    }

    pub fn risk(&self) -> RiskLevel {
        match self {
            LesionClass::Normal => RiskLevel::Clear,
            LesionClass::Benign => RiskLevel::Monitor,
            LesionClass::Malignant => RiskLevel::Urgent,
        }
    }

    /// Only Malignant counts as suspicious. Benign is a separate monitor
    /// tier, not a suspicious result.
    pub fn is_suspicious(&self) -> bool {
        matches!(self, LesionClass::Malignant)
    }
}

impl fmt::Display for LesionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LesionClass {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "Normal" => Ok(Self::Normal),
            "Benign" => Ok(Self::Benign),
            "Malignant" => Ok(Self::Malignant),
            other => Err(format!(
                "{} is not a known lesion class. Expected `Normal`, `Benign` or `Malignant`.",
                other
            )),
        }
    }
}

/// Presentation tier a classification maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Clear,
    Monitor,
    Urgent,
}

impl RiskLevel {
    pub fn headline(&self) -> &'static str {
        match self {
            RiskLevel::Clear => "No concerning features detected",
            RiskLevel::Monitor => "Non-cancerous lesion detected",
            RiskLevel::Urgent => "Potentially cancerous lesion detected",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Clear => "green",
            RiskLevel::Monitor => "amber",
            RiskLevel::Urgent => "red",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_as_wire_strings() {
        for class in LesionClass::ALL {
            let json = serde_json::to_string(&class).unwrap();
            assert_eq!(json, format!("\"{}\"", class.as_str()));
            let back: LesionClass = serde_json::from_str(&json).unwrap();
            assert_eq!(back, class);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(serde_json::from_str::<LesionClass>("\"Melanoma\"").is_err());
        assert!(LesionClass::try_from("benign".to_string()).is_err());
    }

    #[test]
    fn only_malignant_is_suspicious() {
        assert!(!LesionClass::Normal.is_suspicious());
        assert!(!LesionClass::Benign.is_suspicious());
        assert!(LesionClass::Malignant.is_suspicious());
    }

    #[test]
    fn risk_tiers_follow_class() {
        assert_eq!(LesionClass::Normal.risk(), RiskLevel::Clear);
        assert_eq!(LesionClass::Benign.risk(), RiskLevel::Monitor);
        assert_eq!(LesionClass::Malignant.risk(), RiskLevel::Urgent);
    }
}
