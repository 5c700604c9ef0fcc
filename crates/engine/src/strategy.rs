//! Threshold strategies over the reverse decay and IV scores

use serde::{Deserialize, Serialize};

use crate::types::HistoricalDataPoint;

/// Share of the entry threshold the RDS must clear in the combined strategy
const COMBINED_RDS_WEIGHT: f64 = 0.7;
/// Share of the entry threshold the IV score must clear in the combined strategy
const COMBINED_IV_WEIGHT: f64 = 0.3;

/// Strategy variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    ReverseDecay,
    IvSpike,
    Combined,
}

impl StrategyKind {
    pub fn all() -> &'static [StrategyKind] {
        &[Self::ReverseDecay, Self::IvSpike, Self::Combined]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReverseDecay => "reverseDecay",
            Self::IvSpike => "ivSpike",
            Self::Combined => "combined",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ReverseDecay => "Reverse Decay",
            Self::IvSpike => "IV Spike",
            Self::Combined => "Combined RDS + IV",
        }
    }

    /// Entry condition, evaluated while flat
    pub fn entry_signal(&self, point: &HistoricalDataPoint, entry_threshold: f64) -> bool {
        match self {
            Self::ReverseDecay => point.rds > entry_threshold,
            Self::IvSpike => point.iv_score > entry_threshold,
            Self::Combined => {
                point.rds > COMBINED_RDS_WEIGHT * entry_threshold
                    && point.iv_score > COMBINED_IV_WEIGHT * entry_threshold
            }
        }
    }

    /// Threshold exit condition, evaluated while in a position after stop/target
    pub fn exit_signal(&self, point: &HistoricalDataPoint, exit_threshold: f64) -> bool {
        match self {
            Self::ReverseDecay => point.rds < exit_threshold,
            Self::IvSpike => point.iv_score < exit_threshold,
            Self::Combined => point.rds < exit_threshold || point.iv_score < exit_threshold,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "reversedecay" | "rds" => Ok(Self::ReverseDecay),
            "ivspike" | "iv" => Ok(Self::IvSpike),
            "combined" => Ok(Self::Combined),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Risk factor in 0–100 from the entry-bar scores
pub fn risk_factor(rds: f64, iv_score: f64) -> f64 {
    (0.7 * rds + 0.3 * iv_score).clamp(0.0, 1.0) * 100.0
}

/// Catalog entry describing a strategy and its suggested thresholds
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCatalogEntry {
    pub id: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub stop_loss: f64,
    pub target_profit: f64,
}

pub fn get_catalog() -> Vec<StrategyCatalogEntry> {
    StrategyKind::all()
        .iter()
        .map(|kind| match kind {
            StrategyKind::ReverseDecay => StrategyCatalogEntry {
                id: *kind,
                name: kind.display_name(),
                description: "Buys the straddle when its price runs ahead of the time-decayed \
                              expectation and exits once the excess fades.",
                entry_threshold: 0.15,
                exit_threshold: 0.05,
                stop_loss: 20.0,
                target_profit: 30.0,
            },
            StrategyKind::IvSpike => StrategyCatalogEntry {
                id: *kind,
                name: kind.display_name(),
                description: "Buys the straddle when implied volatility spikes above its \
                              baseline and exits when it normalizes.",
                entry_threshold: 0.1,
                exit_threshold: 0.0,
                stop_loss: 15.0,
                target_profit: 25.0,
            },
            StrategyKind::Combined => StrategyCatalogEntry {
                id: *kind,
                name: kind.display_name(),
                description: "Requires both a reverse decay excess and elevated IV to enter; \
                              exits when either signal drops below the exit threshold.",
                entry_threshold: 0.2,
                exit_threshold: 0.03,
                stop_loss: 20.0,
                target_profit: 35.0,
            },
        })
        .collect()
}
