use crate::domain::model::Compound;
use crate::strategy::oracle::StintPlan;
use crate::utils::error::{ApexError, Result};
use serde::{Deserialize, Serialize};

const FUEL_LOAD_KG: f64 = 110.0;
/// Stints using this share of tyre life or more are discarded.
const MAX_RISK_PCT: f64 = 98.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TyreSpec {
    pub compound: Compound,
    pub deg: f64,
    pub life: u32,
    pub pace_advantage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConditions {
    pub total_laps: u32,
    pub pit_cost: f64,
    /// Seconds per kg of fuel.
    pub fuel_effect: f64,
    pub base_time: f64,
    pub grid_pos: u32,
    pub require_compound_change: bool,
}

impl Default for RaceConditions {
    fn default() -> Self {
        Self {
            total_laps: 57,
            pit_cost: 22.0,
            fuel_effect: 0.035,
            base_time: 92.0,
            grid_pos: 10,
            require_compound_change: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyMetrics {
    pub name: String,
    pub total_time: f64,
    pub max_risk: f64,
    pub traffic_score: f64,
    pub flexibility: f64,
    pub lap_trace: Vec<f64>,
    pub stints: Vec<StintPlan>,
}

/// Higher is better on every axis, 0-10.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarProfile {
    pub name: String,
    pub performance: f64,
    pub safety: f64,
    pub clean_air: f64,
    pub flexibility: f64,
}

/// Deterministic first-generation solver: enumerates every one-stop split and
/// equal-thirds two-stopper, and returns the fastest that stays within tyre life.
#[derive(Debug, Clone)]
pub struct ExhaustiveSolver {
    specs: Vec<TyreSpec>,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        let spec = |compound, deg, life, pace_advantage| TyreSpec {
            compound,
            deg,
            life,
            pace_advantage,
        };
        Self {
            specs: vec![
                spec(Compound::Soft, 0.12, 20, 0.0),
                spec(Compound::Medium, 0.08, 30, 0.5),
                spec(Compound::Hard, 0.04, 45, 1.1),
            ],
        }
    }
}

impl ExhaustiveSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn spec(&self, compound: Compound) -> Result<&TyreSpec> {
        self.specs
            .iter()
            .find(|s| s.compound == compound)
            .ok_or_else(|| ApexError::UnknownCompound(compound.to_string()))
    }

    pub fn calculate_metrics(
        &self,
        name: &str,
        stints: &[StintPlan],
        cond: &RaceConditions,
    ) -> Result<StrategyMetrics> {
        let fuel_burn = FUEL_LOAD_KG / cond.total_laps.max(1) as f64;
        let mut fuel_load = FUEL_LOAD_KG;
        let mut total_time = 0.0;
        let mut lap_trace = Vec::new();
        let mut max_risk: f64 = 0.0;

        for stint in stints {
            let spec = self.spec(stint.compound)?;
            if !lap_trace.is_empty() {
                total_time += cond.pit_cost;
            }
            for lap in 0..stint.laps {
                let lap_time = cond.base_time
                    + spec.pace_advantage
                    + fuel_load * cond.fuel_effect
                    + lap as f64 * spec.deg;
                lap_trace.push(lap_time);
                total_time += lap_time;
                fuel_load -= fuel_burn;
            }
            max_risk = max_risk.max(stint.laps as f64 / spec.life as f64 * 100.0);
        }

        let stops = stints.len().saturating_sub(1) as f64;
        let traffic_score = (cond.grid_pos as f64 * 0.1 + stops * 1.2).min(10.0);
        let soft_start = stints.first().is_some_and(|s| s.compound == Compound::Soft);
        let flexibility = (10.0 - stops * 2.0 - if soft_start { 2.0 } else { 0.0 }).max(0.0);

        Ok(StrategyMetrics {
            name: name.to_string(),
            total_time,
            max_risk,
            traffic_score,
            flexibility,
            lap_trace,
            stints: stints.to_vec(),
        })
    }

    /// All candidates that pass the tyre-life constraint, in generation order.
    pub fn candidates(&self, cond: &RaceConditions) -> Result<Vec<StrategyMetrics>> {
        let laps = cond.total_laps;
        let mut valid = Vec::new();

        let start = (laps as f64 * 0.2) as u32;
        let end = (laps as f64 * 0.8) as u32;
        for p1 in start..end {
            for c1 in Compound::DRY {
                for c2 in Compound::DRY {
                    if c1 == c2 && cond.require_compound_change {
                        continue;
                    }
                    let plan = [
                        StintPlan { compound: c1, laps: p1 },
                        StintPlan { compound: c2, laps: laps - p1 },
                    ];
                    let name = format!("AI 1-Stop ({}-{})", c1.initial(), c2.initial());
                    let m = self.calculate_metrics(&name, &plan, cond)?;
                    if m.max_risk < MAX_RISK_PCT {
                        valid.push(m);
                    }
                }
            }
        }

        let third = laps / 3;
        for c1 in Compound::DRY {
            for c2 in Compound::DRY {
                for c3 in Compound::DRY {
                    let plan = [
                        StintPlan { compound: c1, laps: third },
                        StintPlan { compound: c2, laps: third },
                        StintPlan { compound: c3, laps: laps - third * 2 },
                    ];
                    let name = format!(
                        "AI 2-Stop ({}-{}-{})",
                        c1.initial(),
                        c2.initial(),
                        c3.initial()
                    );
                    let m = self.calculate_metrics(&name, &plan, cond)?;
                    if m.max_risk < MAX_RISK_PCT {
                        valid.push(m);
                    }
                }
            }
        }
        Ok(valid)
    }

    pub fn find_optimal_strategy(&self, cond: &RaceConditions) -> Result<Option<StrategyMetrics>> {
        Ok(self
            .candidates(cond)?
            .into_iter()
            .min_by(|a, b| a.total_time.total_cmp(&b.total_time)))
    }
}

pub fn normalize_for_radar(strategies: &[StrategyMetrics]) -> Vec<RadarProfile> {
    let (min_t, max_t) = strategies
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.total_time), hi.max(s.total_time))
        });
    let range = if max_t != min_t { max_t - min_t } else { 1.0 };

    strategies
        .iter()
        .map(|s| RadarProfile {
            name: s.name.clone(),
            performance: 10.0 - (s.total_time - min_t) / range * 10.0,
            safety: 10.0 - s.max_risk.min(100.0) / 10.0,
            clean_air: 10.0 - s.traffic_score,
            flexibility: s.flexibility,
        })
        .collect()
}
