//! Synthetic tissue scenarios with known ground truth.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// CG-001: rigid drift, every cell keeps its identity
    Drift,

    /// CG-002: the center cell splits into two daughters
    Division,

    /// CG-003: an interior cell vanishes and leaves a hole
    Elimination,

    /// CG-004: four cells exchange neighbors (literal T1)
    Intercalation,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Drift,
            ScenarioId::Division,
            ScenarioId::Elimination,
            ScenarioId::Intercalation,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Drift => "drift",
            ScenarioId::Division => "division",
            ScenarioId::Elimination => "elimination",
            ScenarioId::Intercalation => "intercalation",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Drift => "Grid drifting with seeded jitter, identities must persist",
            ScenarioId::Division => "Center cell splits asymmetrically, one division with fresh daughters",
            ScenarioId::Elimination => "Interior cell disappears, tagged as eliminated and its edges abandoned",
            ScenarioId::Intercalation => "Left/right contact replaced by bottom/top contact, one T1 with winners",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drift" | "cg-001" => Ok(ScenarioId::Drift),
            "division" | "divide" | "cg-002" => Ok(ScenarioId::Division),
            "elimination" | "extrusion" | "cg-003" => Ok(ScenarioId::Elimination),
            "intercalation" | "t1" | "cg-004" => Ok(ScenarioId::Intercalation),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("T1".parse::<ScenarioId>(), Ok(ScenarioId::Intercalation));
        assert_eq!("cg-002".parse::<ScenarioId>(), Ok(ScenarioId::Division));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.to_string().parse::<ScenarioId>(), Ok(scenario));
        }
    }
}
