use crate::domain::model::Compound;
use crate::physics::signal::{mean, percentile, std_dev};
use crate::utils::error::{ApexError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const FUEL_CORRECTION: f64 = 0.035;
pub const PIT_LOSS: f64 = 22.5;
pub const BASELINE_LAP: f64 = 90.0;
pub const DEFAULT_DRIVER_SIGMA: f64 = 0.2;
/// Wear accelerates towards the end of a tyre's life.
const WEAR_EXPONENT: f64 = 1.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundProfile {
    pub compound: Compound,
    pub base_pace: f64,
    pub deg_per_lap: f64,
    pub max_life: u32,
}

impl CompoundProfile {
    pub fn defaults() -> Vec<CompoundProfile> {
        let profile = |compound, base_pace, deg_per_lap, max_life| CompoundProfile {
            compound,
            base_pace,
            deg_per_lap,
            max_life,
        };
        vec![
            profile(Compound::Soft, 0.0, 0.12, 20),
            profile(Compound::Medium, 0.6, 0.08, 35),
            profile(Compound::Hard, 1.1, 0.04, 55),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StintPlan {
    pub compound: Compound,
    pub laps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPlan {
    pub name: String,
    pub stints: Vec<StintPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub name: String,
    pub mean_time: f64,
    /// Best-case quartile.
    pub p25: f64,
    pub p75: f64,
    pub std_dev: f64,
    pub is_recommended: bool,
}

#[derive(Debug, Clone)]
pub struct RaceRun {
    pub lap_times: Vec<f64>,
    pub total_time: f64,
}

/// Monte Carlo race-strategy simulator.
pub struct StrategyOracle {
    compounds: Vec<CompoundProfile>,
    pub fuel_correction: f64,
    pub pit_loss: f64,
    pub driver_sigma: f64,
    rng: StdRng,
}

impl StrategyOracle {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            compounds: CompoundProfile::defaults(),
            fuel_correction: FUEL_CORRECTION,
            pit_loss: PIT_LOSS,
            driver_sigma: DEFAULT_DRIVER_SIGMA,
            rng,
        }
    }

    pub fn profile(&self, compound: Compound) -> Result<&CompoundProfile> {
        self.compounds
            .iter()
            .find(|p| p.compound == compound)
            .ok_or_else(|| ApexError::UnknownCompound(compound.to_string()))
    }

    /// Lap times of one stint: baseline + compound offset + wear − fuel burn + noise.
    pub fn simulate_stint(
        &mut self,
        compound: Compound,
        laps: u32,
        start_tyre_age: u32,
        sigma: f64,
    ) -> Result<Vec<f64>> {
        let profile = self.profile(compound)?.clone();
        Ok((0..laps)
            .map(|i| {
                let age = (i + start_tyre_age) as f64;
                BASELINE_LAP + profile.base_pace
                    + profile.deg_per_lap * age.powf(WEAR_EXPONENT)
                    - self.fuel_correction * i as f64
                    + gaussian(&mut self.rng, sigma)
            })
            .collect())
    }

    /// One race with the plan truncated to `total_laps`. Each stop charges the pit
    /// loss to the race total and again to the out-lap of the new stint.
    pub fn run_strategy(&mut self, plan: &[StintPlan], total_laps: u32) -> Result<RaceRun> {
        let mut lap_times = Vec::with_capacity(total_laps as usize);
        let mut current_lap = 0;
        let mut stops = 0u32;

        for (i, stint) in plan.iter().enumerate() {
            let length = stint.laps.min(total_laps.saturating_sub(current_lap));
            if length == 0 {
                break;
            }
            let mut times = self.simulate_stint(stint.compound, length, 0, self.driver_sigma)?;
            if i > 0 {
                times[0] += self.pit_loss;
                stops += 1;
            }
            lap_times.extend(times);
            current_lap += length;
            if current_lap >= total_laps {
                break;
            }
        }

        let total_time = lap_times.iter().sum::<f64>() + self.pit_loss * stops as f64;
        Ok(RaceRun { lap_times, total_time })
    }

    pub fn monte_carlo(
        &mut self,
        strategies: &[NamedPlan],
        n_sims: usize,
        total_laps: u32,
    ) -> Result<Vec<SimulationSummary>> {
        if n_sims == 0 {
            return Err(ApexError::InsufficientData { required: 1, available: 0 });
        }

        let mut summaries = Vec::with_capacity(strategies.len());
        for plan in strategies {
            let totals = (0..n_sims)
                .map(|_| self.run_strategy(&plan.stints, total_laps).map(|r| r.total_time))
                .collect::<Result<Vec<f64>>>()?;

            summaries.push(SimulationSummary {
                name: plan.name.clone(),
                mean_time: mean(&totals).unwrap_or(0.0),
                p25: percentile(&totals, 25.0).unwrap_or(0.0),
                p75: percentile(&totals, 75.0).unwrap_or(0.0),
                std_dev: std_dev(&totals).unwrap_or(0.0),
                is_recommended: false,
            });
            tracing::debug!("Simulated '{}' {} times", plan.name, n_sims);
        }

        if let Some(best) = summaries
            .iter_mut()
            .min_by(|a, b| a.mean_time.total_cmp(&b.mean_time))
        {
            best.is_recommended = true;
        }
        Ok(summaries)
    }
}

/// One- and two-stop baselines for a 57-lap race.
pub fn reference_plans() -> Vec<NamedPlan> {
    let plan = |name: &str, stints: &[(Compound, u32)]| NamedPlan {
        name: name.to_string(),
        stints: stints
            .iter()
            .map(|&(compound, laps)| StintPlan { compound, laps })
            .collect(),
    };
    vec![
        plan("1-Stop (M-H)", &[(Compound::Medium, 25), (Compound::Hard, 32)]),
        plan(
            "2-Stop (S-M-M)",
            &[(Compound::Soft, 15), (Compound::Medium, 21), (Compound::Medium, 21)],
        ),
    ]
}

impl Default for StrategyOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Normal sample via the Box–Muller transform.
pub(crate) fn gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    if sigma == 0.0 {
        return 0.0;
    }
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
