// Industry domain type
//
// Templates, instances and auto-run bindings are industry-scoped. The industry of an
// instance selects the executor dispatch table used for its tasks.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Industry vertical a user (and their workflows) belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Industry {
    #[default]
    General,
    RealEstate,
    Restaurant,
    Construction,
    Medical,
    Dental,
}

impl Industry {
    /// Human readable label used in executor error messages
    pub fn label(&self) -> &'static str {
        match self {
            Industry::General => "General",
            Industry::RealEstate => "Real Estate",
            Industry::Restaurant => "Restaurant",
            Industry::Construction => "Construction",
            Industry::Medical => "Medical",
            Industry::Dental => "Dental",
        }
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Industry::General => write!(f, "GENERAL"),
            Industry::RealEstate => write!(f, "REAL_ESTATE"),
            Industry::Restaurant => write!(f, "RESTAURANT"),
            Industry::Construction => write!(f, "CONSTRUCTION"),
            Industry::Medical => write!(f, "MEDICAL"),
            Industry::Dental => write!(f, "DENTAL"),
        }
    }
}

impl From<&str> for Industry {
    fn from(s: &str) -> Self {
        match s {
            "REAL_ESTATE" => Industry::RealEstate,
            "RESTAURANT" => Industry::Restaurant,
            "CONSTRUCTION" => Industry::Construction,
            "MEDICAL" => Industry::Medical,
            "DENTAL" => Industry::Dental,
            _ => Industry::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_text_round_trip() {
        for industry in [
            Industry::General,
            Industry::RealEstate,
            Industry::Restaurant,
            Industry::Construction,
            Industry::Medical,
            Industry::Dental,
        ] {
            assert_eq!(Industry::from(industry.to_string().as_str()), industry);
        }
    }

    #[test]
    fn test_unknown_industry_falls_back_to_general() {
        assert_eq!(Industry::from("SPACE_MINING"), Industry::General);
    }

    #[test]
    fn test_industry_serde_matches_display() {
        let json = serde_json::to_string(&Industry::RealEstate).unwrap();
        assert_eq!(json, "\"REAL_ESTATE\"");
    }
}
