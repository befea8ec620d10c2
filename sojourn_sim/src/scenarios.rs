//! Named parameter presets.

use sojourn_core::TrialConfig;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// M/M/1 reference rates, 35s horizon
    Short,

    /// M/M/1 reference rates, 175s horizon
    Medium,

    /// M/M/1 reference rates, 350s horizon
    Standard,

    /// M/M/1 reference rates, 1750s horizon
    Long,

    /// Two servers at 60% utilisation
    DualServer,

    /// Arrivals outpace service; must be reported as unstable
    Overloaded,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Short,
            ScenarioId::Medium,
            ScenarioId::Standard,
            ScenarioId::Long,
            ScenarioId::DualServer,
            ScenarioId::Overloaded,
        ]
    }

    /// Returns the horizon sweep over the reference M/M/1 queue.
    pub fn duration_sweep() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Short,
            ScenarioId::Medium,
            ScenarioId::Standard,
            ScenarioId::Long,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Short => "short",
            ScenarioId::Medium => "medium",
            ScenarioId::Standard => "standard",
            ScenarioId::Long => "long",
            ScenarioId::DualServer => "dual_server",
            ScenarioId::Overloaded => "overloaded",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Short => "M/M/1, λ=20 μ=50, T=35s",
            ScenarioId::Medium => "M/M/1, λ=20 μ=50, T=175s",
            ScenarioId::Standard => "M/M/1, λ=20 μ=50, T=350s",
            ScenarioId::Long => "M/M/1, λ=20 μ=50, T=1750s",
            ScenarioId::DualServer => "M/M/2, λ=60 μ=50, T=350s",
            ScenarioId::Overloaded => "M/M/1, λ=50 μ=20: unstable, no finite sojourn time",
        }
    }

    /// Returns the trial parameters for this scenario.
    pub fn config(&self) -> TrialConfig {
        let reference = TrialConfig::default();
        match self {
            ScenarioId::Short => reference.with_duration(35.0),
            ScenarioId::Medium => reference.with_duration(175.0),
            ScenarioId::Standard => reference,
            ScenarioId::Long => reference.with_duration(1750.0),
            ScenarioId::DualServer => reference.with_arrival_rate(60.0).with_servers(2),
            ScenarioId::Overloaded => reference.with_arrival_rate(50.0).with_service_rate(20.0),
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
            "short" | "t35" => Ok(ScenarioId::Short),
            "medium" | "t175" => Ok(ScenarioId::Medium),
            "standard" | "t350" | "mm1" => Ok(ScenarioId::Standard),
            "long" | "t1750" => Ok(ScenarioId::Long),
            "dual_server" | "dualserver" | "mm2" => Ok(ScenarioId::DualServer),
            "overloaded" | "unstable" => Ok(ScenarioId::Overloaded),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
