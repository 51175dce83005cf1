use crate::domain::model::Compound;
use crate::strategy::oracle::StintPlan;
use crate::utils::error::{ApexError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Strategies kept from one optimiser run.
pub const TOP_STRATEGIES: usize = 5;
const MIN_STINT_LAPS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitParams {
    pub name: String,
    pub n_laps: u32,
    pub track_length_km: f64,
    pub base_lap_time: f64,
    pub pit_loss: f64,
    /// Pace advantage (s) needed to pass; higher means processional.
    pub overtake_delta: f64,
    /// 1 (smooth) to 5 (abrasive).
    pub abrasivity: f64,
}

impl CircuitParams {
    fn new(name: &str, n_laps: u32, len: f64, base: f64, pit: f64, delta: f64, abr: f64) -> Self {
        Self {
            name: name.to_string(),
            n_laps,
            track_length_km: len,
            base_lap_time: base,
            pit_loss: pit,
            overtake_delta: delta,
            abrasivity: abr,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "Monaco" => Some(Self::new(name, 78, 3.3, 74.0, 24.0, 3.5, 2.0)),
            "Spa" => Some(Self::new(name, 44, 7.0, 106.0, 22.0, 0.8, 4.0)),
            "Monza" => Some(Self::new(name, 53, 5.8, 81.0, 24.0, 1.2, 3.0)),
            "Silverstone" => Some(Self::new(name, 52, 5.9, 87.0, 20.0, 1.4, 4.0)),
            "Bahrain" => Some(Self::new(name, 57, 5.4, 92.0, 22.0, 1.5, 3.0)),
            _ => None,
        }
    }

    /// Preset for a known circuit, generic 57-lap parameters otherwise.
    pub fn for_circuit(name: &str) -> Self {
        Self::preset(name).unwrap_or_else(|| Self::new(name, 57, 5.4, 90.0, 22.0, 1.5, 3.0))
    }
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self::for_circuit("Bahrain")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarParams {
    pub fuel_start_kg: f64,
    pub fuel_burn_kg_lap: f64,
    pub fuel_effect_s_kg: f64,
    pub pit_reliability_sigma: f64,
}

impl Default for CarParams {
    fn default() -> Self {
        Self {
            fuel_start_kg: 110.0,
            fuel_burn_kg_lap: 1.8,
            fuel_effect_s_kg: 0.035,
            pit_reliability_sigma: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvParams {
    pub track_temp: f64,
    pub rain_prob: f64,
    pub sc_prob: f64,
    pub vsc_prob: f64,
    pub n_drivers: u32,
    pub grid_position: u32,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            track_temp: 35.0,
            rain_prob: 0.0,
            sc_prob: 0.2,
            vsc_prob: 0.2,
            n_drivers: 20,
            grid_position: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyreParams {
    pub compound: Compound,
    pub base_pace: f64,
    pub deg_per_lap: f64,
    pub max_life: u32,
    pub warmup_loss: f64,
}

impl TyreParams {
    pub fn defaults() -> Vec<TyreParams> {
        let tyre = |compound, base_pace, deg_per_lap, max_life| TyreParams {
            compound,
            base_pace,
            deg_per_lap,
            max_life,
            warmup_loss: 2.0,
        };
        vec![
            tyre(Compound::Soft, 0.0, 0.12, 20),
            tyre(Compound::Medium, 0.5, 0.08, 30),
            tyre(Compound::Hard, 1.1, 0.04, 45),
        ]
    }
}

/// Operator bias applied to the safety, traffic and robustness criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KFactors {
    pub safety: f64,
    pub traffic: f64,
    pub robust: f64,
}

impl Default for KFactors {
    fn default() -> Self {
        Self {
            safety: 2.0,
            traffic: 3.0,
            robust: 2.5,
        }
    }
}

/// Everything the decision engine needs; any section may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub circuit: CircuitParams,
    pub car: CarParams,
    pub env: EnvParams,
    pub tyres: Vec<TyreParams>,
    pub k_factors: KFactors,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            circuit: CircuitParams::default(),
            car: CarParams::default(),
            env: EnvParams::default(),
            tyres: TyreParams::defaults(),
            k_factors: KFactors::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub alpha_3: f64,
    pub alpha_4: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NormalizedScores {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedStrategy {
    pub name: String,
    /// Race time (s).
    pub c1_time: f64,
    /// Worst stint's share of tyre life (%).
    pub c2_risk: f64,
    pub c3_traffic: f64,
    pub c4_flex: f64,
    pub stints: Vec<StintPlan>,
    /// Lower is better. Zero until scored as part of a batch.
    pub utility_score: f64,
    pub normalized_scores: NormalizedScores,
}

pub fn format_strategy(stints: &[StintPlan]) -> String {
    stints
        .iter()
        .map(|s| format!("{} {}({})", s.compound.icon(), s.compound.initial(), s.laps))
        .collect::<Vec<_>>()
        .join(" ➝ ")
}

/// Multi-criteria strategy ranking.
pub struct DecisionEngine {
    scenario: Scenario,
    rng: StdRng,
}

impl DecisionEngine {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    fn tyre(&self, compound: Compound) -> Result<&TyreParams> {
        self.scenario
            .tyres
            .iter()
            .find(|t| t.compound == compound)
            .ok_or_else(|| ApexError::UnknownCompound(compound.to_string()))
    }

    fn c1_time(&self, stints: &[StintPlan]) -> Result<f64> {
        let circuit = &self.scenario.circuit;
        let car = &self.scenario.car;
        let mut time = 0.0;
        let mut fuel = car.fuel_start_kg;

        for (idx, stint) in stints.iter().enumerate() {
            let tyre = self.tyre(stint.compound)?;
            if idx > 0 {
                time += circuit.pit_loss;
            }
            time += tyre.warmup_loss;

            for lap in 0..stint.laps {
                let lap = lap as f64;
                let t_fuel = (fuel - lap * car.fuel_burn_kg_lap) * car.fuel_effect_s_kg;
                time += circuit.base_lap_time + tyre.base_pace + t_fuel + lap * tyre.deg_per_lap;
            }
            fuel -= stint.laps as f64 * car.fuel_burn_kg_lap;
        }
        Ok(time)
    }

    fn c2_safety_risk(&self, stints: &[StintPlan]) -> Result<f64> {
        let mut worst: f64 = 0.0;
        for stint in stints {
            let life = self.tyre(stint.compound)?.max_life as f64;
            worst = worst.max(stint.laps as f64 / life * 100.0);
        }
        Ok(worst)
    }

    fn c3_traffic_score(&self, stints: &[StintPlan]) -> f64 {
        let n_stops = stints.len().saturating_sub(1) as f64;
        let grid_factor = self.scenario.env.grid_position as f64 / 20.0;
        let delta_factor = self.scenario.circuit.overtake_delta / 1.5;
        let raw = grid_factor * 2.0 + n_stops * grid_factor * delta_factor * 2.5;
        raw.min(10.0)
    }

    fn c4_flexibility_score(&self, stints: &[StintPlan]) -> Result<f64> {
        if stints.is_empty() {
            return Ok(0.0);
        }
        let mut total_width = 0.0;
        for stint in stints {
            let limit = self.tyre(stint.compound)?.max_life as f64 * 0.9;
            total_width += (limit - stint.laps as f64).max(0.0);
        }
        let avg = total_width / stints.len() as f64;
        Ok((avg / 15.0 * 10.0).min(10.0))
    }

    /// Criterion weights from track conditions, normalised to sum to one.
    pub fn dynamic_weights(&self) -> Weights {
        let Scenario {
            circuit,
            env,
            k_factors: k,
            ..
        } = &self.scenario;

        let w1 = 1.0;
        let w2 = k.safety * (env.track_temp / 60.0) * (circuit.abrasivity / 5.0);
        let w3 = k.traffic * (env.grid_position as f64 / 20.0);
        let w4 = k.robust * (env.rain_prob + env.sc_prob + env.vsc_prob);
        let total = w1 + w2 + w3 + w4;

        Weights {
            alpha_1: w1 / total,
            alpha_2: w2 / total,
            alpha_3: w3 / total,
            alpha_4: w4 / total,
        }
    }

    pub fn evaluate_strategy(&self, stints: &[StintPlan]) -> Result<EvaluatedStrategy> {
        Ok(EvaluatedStrategy {
            name: format_strategy(stints),
            c1_time: self.c1_time(stints)?,
            c2_risk: self.c2_safety_risk(stints)?,
            c3_traffic: self.c3_traffic_score(stints),
            c4_flex: self.c4_flexibility_score(stints)?,
            stints: stints.to_vec(),
            utility_score: 0.0,
            normalized_scores: NormalizedScores::default(),
        })
    }

    /// Scores a batch against itself. Race time is min-max scaled to 0-10 across
    /// the batch, so adding a strategy can reorder the others.
    pub fn calculate_utility(&self, mut strategies: Vec<EvaluatedStrategy>) -> Vec<EvaluatedStrategy> {
        if strategies.is_empty() {
            return strategies;
        }
        let w = self.dynamic_weights();

        let (min_t, max_t) = strategies
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.c1_time), hi.max(s.c1_time))
            });
        let range = if max_t != min_t { max_t - min_t } else { 1.0 };

        for s in strategies.iter_mut() {
            let scores = NormalizedScores {
                c1: (s.c1_time - min_t) / range * 10.0,
                c2: (s.c2_risk / 10.0).min(10.0),
                c3: s.c3_traffic,
                c4: s.c4_flex,
            };
            // Flexibility is a benefit, so it reduces the cost.
            s.utility_score = w.alpha_1 * scores.c1 + w.alpha_2 * scores.c2 + w.alpha_3 * scores.c3
                - w.alpha_4 * scores.c4;
            s.normalized_scores = scores;
        }

        strategies.sort_by(|a, b| a.utility_score.total_cmp(&b.utility_score));
        strategies
    }

    /// Samples random one- and two-stop strategies within tyre life, ranks the
    /// batch and returns the best distinct plans.
    pub fn generate_optimal_strategies(&mut self, n_gen: usize) -> Result<Vec<EvaluatedStrategy>> {
        let total = self.scenario.circuit.n_laps as i64;
        let mut candidates = Vec::new();

        for _ in 0..n_gen / 2 {
            let lo = (total as f64 * 0.25) as i64;
            let hi = (total as f64 * 0.75) as i64;
            let pit_lap = self.rng.gen_range(lo..=hi.max(lo));
            let picked: Vec<Compound> = Compound::DRY
                .choose_multiple(&mut self.rng, 2)
                .copied()
                .collect();
            let stints = [(picked[0], pit_lap), (picked[1], total - pit_lap)];
            if let Some(plan) = self.within_life(&stints)? {
                candidates.push(self.evaluate_strategy(&plan)?);
            }
        }

        for _ in 0..n_gen / 2 {
            let third = total / 3;
            let l1 = third + self.rng.gen_range(-5..=5);
            let l2 = third + self.rng.gen_range(-5..=5);
            let l3 = total - l1 - l2;
            if l1 < MIN_STINT_LAPS || l2 < MIN_STINT_LAPS || l3 < MIN_STINT_LAPS {
                continue;
            }

            let seq: Vec<Compound> = (0..3)
                .filter_map(|_| Compound::DRY.choose(&mut self.rng).copied())
                .collect();
            if seq.iter().collect::<HashSet<_>>().len() < 2 {
                continue;
            }

            let stints = [(seq[0], l1), (seq[1], l2), (seq[2], l3)];
            if let Some(plan) = self.within_life(&stints)? {
                candidates.push(self.evaluate_strategy(&plan)?);
            }
        }

        tracing::debug!("{} of {} candidates within tyre life", candidates.len(), n_gen);

        let mut seen = HashSet::new();
        Ok(self
            .calculate_utility(candidates)
            .into_iter()
            .filter(|s| seen.insert(s.name.clone()))
            .take(TOP_STRATEGIES)
            .collect())
    }

    fn within_life(&self, stints: &[(Compound, i64)]) -> Result<Option<Vec<StintPlan>>> {
        let mut plan = Vec::with_capacity(stints.len());
        for &(compound, laps) in stints {
            if laps < 0 || laps > self.tyre(compound)?.max_life as i64 {
                return Ok(None);
            }
            plan.push(StintPlan {
                compound,
                laps: laps as u32,
            });
        }
        Ok(Some(plan))
    }
}

/// How far a hand-built plan is from covering the race distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
    Drafting { planned: u32, total: u32 },
    TooLong { planned: u32, total: u32 },
    Complete,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Drafting { planned, total } => write!(f, "Drafting: {}/{} Laps", planned, total),
            PlanStatus::TooLong { planned, total } => write!(f, "{}/{} Laps (Too Long)", planned, total),
            PlanStatus::Complete => f.write_str("Complete"),
        }
    }
}

pub fn validate_plan(stints: &[StintPlan], total_laps: u32) -> PlanStatus {
    let planned: u32 = stints.iter().map(|s| s.laps).sum();
    match planned.cmp(&total_laps) {
        std::cmp::Ordering::Equal => PlanStatus::Complete,
        std::cmp::Ordering::Greater => PlanStatus::TooLong {
            planned,
            total: total_laps,
        },
        std::cmp::Ordering::Less => PlanStatus::Drafting {
            planned,
            total: total_laps,
        },
    }
}

/// Stint-by-stint plan under construction.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    stints: Vec<StintPlan>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stint(&mut self, compound: Compound, laps: u32) -> &mut Self {
        self.stints.push(StintPlan { compound, laps });
        self
    }

    pub fn stints(&self) -> &[StintPlan] {
        &self.stints
    }

    pub fn status(&self, total_laps: u32) -> PlanStatus {
        validate_plan(&self.stints, total_laps)
    }

    pub fn clear(&mut self) {
        self.stints.clear();
    }

    /// Takes the stints out once they cover exactly the race distance.
    pub fn finish(&mut self, total_laps: u32) -> Result<Vec<StintPlan>> {
        match self.status(total_laps) {
            PlanStatus::Complete => Ok(std::mem::take(&mut self.stints)),
            status => Err(ApexError::ConfigValidationError {
                field: "plan".to_string(),
                message: status.to_string(),
            }),
        }
    }
}
