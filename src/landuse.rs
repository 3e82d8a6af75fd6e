use std::fmt;

/// Urban Atlas 2012 categories counted as residential consumers.
const RESIDENTIAL: [&str; 6] = [
    "Continuous urban fabric (S.L. : > 80%)",
    "Discontinuous dense urban fabric (S.L. : 50% -  80%)",
    "Discontinuous medium density urban fabric (S.L. : 30% - 50%)",
    "Discontinuous low density urban fabric (S.L. : 10% - 30%)",
    "Discontinuous very low density urban fabric (S.L. : < 10%)",
    "Isolated structures",
];

/// Urban Atlas 2012 categories counted as non-residential consumers.
const OTHER_CONSUMERS: [&str; 7] = [
    "Industrial, commercial, public, military and private units",
    "Sports and leisure facilities",
    "Arable land (annual crops)",
    "Port areas",
    "Mineral extraction and dump sites",
    "Railways and associated land",
    "Construction sites",
];

/// Consumer class of an address, derived from the land-use polygon it falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandUseClass {
    Residential,
    OtherConsumer,
    /// Any other category, or no land-use polygon at all.
    Unclassified,
}

impl LandUseClass {
    pub const ALL: [LandUseClass; 3] = [Self::Residential, Self::OtherConsumer, Self::Unclassified];

    /// Classify an Urban Atlas `item2012` label.
    pub fn classify(item: Option<&str>) -> Self {
        match item {
            Some(item) if RESIDENTIAL.contains(&item) => Self::Residential,
            Some(item) if OTHER_CONSUMERS.contains(&item) => Self::OtherConsumer,
            _ => Self::Unclassified,
        }
    }

    /// Value stored in the `land_use_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::OtherConsumer => "other_consumers",
            Self::Unclassified => "unclassified",
        }
    }

    /// Parse a `land_use_type` value; unknown or missing values are unclassified.
    pub fn from_label(label: Option<&str>) -> Self {
        Self::ALL.into_iter()
            .find(|class| Some(class.as_str()) == label)
            .unwrap_or(Self::Unclassified)
    }
}

impl fmt::Display for LandUseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_urban_atlas_items() {
        assert_eq!(LandUseClass::classify(Some("Isolated structures")), LandUseClass::Residential);
        assert_eq!(LandUseClass::classify(Some("Port areas")), LandUseClass::OtherConsumer);
        assert_eq!(LandUseClass::classify(Some("Forests")), LandUseClass::Unclassified);
        assert_eq!(LandUseClass::classify(None), LandUseClass::Unclassified);
    }

    #[test]
    fn labels_round_trip() {
        for class in LandUseClass::ALL {
            assert_eq!(LandUseClass::from_label(Some(class.as_str())), class);
        }
        assert_eq!(LandUseClass::from_label(Some("unknown")), LandUseClass::Unclassified);
        assert_eq!(LandUseClass::from_label(None), LandUseClass::Unclassified);
    }
}
