use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Weight applied to interactions recorded in a region outside the enumerated set
pub const DEFAULT_INTERACTION_WEIGHT: f64 = 0.8;

/// Cost-of-living multiplier for a region outside the enumerated set
pub const DEFAULT_COST_MULTIPLIER: f64 = 0.9;

/// Administrative regions the marketplace ships to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Tsh,
    Sam,
    Bux,
    And,
    Far,
    Nam,
    Qas,
    Sur,
    Nav,
    Jiz,
    Sir,
    Xor,
    Qor,
}

impl Region {
    pub const ALL: [Region; 13] = [
        Region::Tsh,
        Region::Sam,
        Region::Bux,
        Region::And,
        Region::Far,
        Region::Nam,
        Region::Qas,
        Region::Sur,
        Region::Nav,
        Region::Jiz,
        Region::Sir,
        Region::Xor,
        Region::Qor,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Region::Tsh => "TSH",
            Region::Sam => "SAM",
            Region::Bux => "BUX",
            Region::And => "AND",
            Region::Far => "FAR",
            Region::Nam => "NAM",
            Region::Qas => "QAS",
            Region::Sur => "SUR",
            Region::Nav => "NAV",
            Region::Jiz => "JIZ",
            Region::Sir => "SIR",
            Region::Xor => "XOR",
            Region::Qor => "QOR",
        }
    }

    /// Urban regions lean on content similarity, everything else on cultural rules
    pub fn is_urban(&self) -> bool {
        matches!(self, Region::Tsh | Region::Sam)
    }

    /// Regions close enough for fast shipping
    pub fn neighbours(&self) -> &'static [Region] {
        match self {
            Region::Tsh => &[Region::Sir, Region::Jiz],
            Region::Sam => &[Region::Bux, Region::Qas, Region::Nav],
            Region::Bux => &[Region::Sam, Region::Qas, Region::Xor],
            Region::And => &[Region::Far, Region::Nam],
            Region::Far => &[Region::And, Region::Nam],
            Region::Nam => &[Region::And, Region::Far],
            Region::Qas => &[Region::Sam, Region::Bux, Region::Sur],
            Region::Sur => &[Region::Qas],
            Region::Nav => &[Region::Sam, Region::Bux],
            Region::Jiz => &[Region::Tsh, Region::Nav],
            Region::Sir => &[Region::Tsh],
            Region::Xor => &[Region::Bux, Region::Qor],
            Region::Qor => &[Region::Xor],
        }
    }

    /// Corrects for regional interaction volume during factorization
    pub fn interaction_weight(&self) -> f64 {
        match self {
            Region::Tsh => 1.2,
            Region::Sam | Region::And | Region::Far => 1.0,
            Region::Bux | Region::Nam => 0.9,
            Region::Qas | Region::Sur | Region::Xor => 0.8,
            Region::Nav | Region::Jiz | Region::Sir | Region::Qor => 0.7,
        }
    }

    pub fn cost_of_living_multiplier(&self) -> f64 {
        match self {
            Region::Tsh => 1.2,
            Region::Sam => 1.0,
            Region::Bux => 0.9,
            Region::And | Region::Far => 0.85,
            Region::Nam | Region::Qas | Region::Nav | Region::Jiz | Region::Sir => 0.8,
            Region::Sur | Region::Xor => 0.75,
            Region::Qor => 0.7,
        }
    }

    /// Parses a raw region code, `None` for anything outside the enumerated set
    pub fn lookup(code: &str) -> Option<Region> {
        code.parse().ok()
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Region::ALL
            .into_iter()
            .find(|region| region.code() == code)
            .ok_or_else(|| AppError::InvalidRegion(s.to_string()))
    }
}

/// Interaction weight for a raw region code
pub fn interaction_weight(code: &str) -> f64 {
    Region::lookup(code)
        .map(|r| r.interaction_weight())
        .unwrap_or(DEFAULT_INTERACTION_WEIGHT)
}

/// Cost-of-living multiplier for a raw region code
pub fn cost_of_living_multiplier(code: &str) -> f64 {
    Region::lookup(code)
        .map(|r| r.cost_of_living_multiplier())
        .unwrap_or(DEFAULT_COST_MULTIPLIER)
}

/// Display language. Uzbek is the local language, Russian the secondary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    #[default]
    #[serde(other)]
    Uz,
}

impl Language {
    /// Unknown or missing preferences resolve to the local language
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("ru") => Language::Ru,
            _ => Language::Uz,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Language::Uz)
    }
}

/// Income tier used for the budget cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeTier {
    Low,
    High,
    #[default]
    #[serde(other)]
    Medium,
}

impl IncomeTier {
    pub fn parse_lenient(raw: Option<&str>) -> Option<Self> {
        match raw?.trim().to_ascii_lowercase().as_str() {
            "low" => Some(IncomeTier::Low),
            "high" => Some(IncomeTier::High),
            _ => Some(IncomeTier::Medium),
        }
    }

    /// Base price ceiling in UZS before the regional adjustment
    pub fn base_price_cap(&self) -> f64 {
        match self {
            IncomeTier::Low => 500_000.0,
            IncomeTier::Medium => 2_000_000.0,
            IncomeTier::High => 10_000_000.0,
        }
    }
}
