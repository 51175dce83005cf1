use crate::domain::model::{Compound, Laps, QUICKLAP_THRESHOLD};
use crate::physics::signal::{linspace, mean};
use crate::utils::error::{ApexError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const SPLIT_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;

/// Rows are `[tyre_life, compound_code, lap_number]`.
pub type Features = [f64; 3];

#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    pub min_child_weight: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &Features) -> f64 {
        match self {
            Node::Leaf(w) => *w,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] < *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Gradient-boosted regression trees on squared error, grown greedily with
/// second-order gain. Hessians are all one for this objective.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    base_score: f64,
    trees: Vec<Node>,
}

impl GradientBoostedTrees {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Features], y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ApexError::InsufficientData {
                required: 1,
                available: x.len().min(y.len()),
            });
        }

        self.base_score = mean(y).unwrap_or(0.0);
        self.trees.clear();
        let mut preds = vec![self.base_score; y.len()];
        let all: Vec<usize> = (0..x.len()).collect();

        for _ in 0..self.params.n_estimators {
            let grad: Vec<f64> = preds.iter().zip(y).map(|(p, t)| p - t).collect();
            let tree = self.grow(x, &grad, &all, 0);
            for (i, row) in x.iter().enumerate() {
                preds[i] += self.params.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, row: &Features) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.params.learning_rate * t.predict(row))
                .sum::<f64>()
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&self, x: &[Features], grad: &[f64], rows: &[usize], depth: usize) -> Node {
        let g_total: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h_total = rows.len() as f64;
        let leaf = Node::Leaf(self.leaf_weight(g_total, h_total));
        if depth >= self.params.max_depth || rows.len() < 2 {
            return leaf;
        }

        let parent = self.score(g_total, h_total);
        let mut best: Option<(f64, usize, f64)> = None;

        for feature in 0..3 {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut g_left = 0.0;
            for k in 0..sorted.len() - 1 {
                g_left += grad[sorted[k]];
                let here = x[sorted[k]][feature];
                let next = x[sorted[k + 1]][feature];
                if here == next {
                    continue;
                }
                let h_left = (k + 1) as f64;
                let h_right = h_total - h_left;
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }
                let gain = self.score(g_left, h_left) + self.score(g_total - g_left, h_right) - parent;
                if gain > best.map_or(0.0, |b| b.0) {
                    best = Some((gain, feature, (here + next) / 2.0));
                }
            }
        }

        let Some((_, feature, threshold)) = best else {
            return leaf;
        };
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| x[i][feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(x, grad, &left, depth + 1)),
            right: Box::new(self.grow(x, grad, &right, depth + 1)),
        }
    }
}

/// Lap-time regressor over tyre age, compound and race progress.
#[derive(Debug, Clone, Default)]
pub struct TyreDegradationModel {
    model: GradientBoostedTrees,
    is_trained: bool,
}

impl TyreDegradationModel {
    pub fn new() -> Self {
        Self {
            model: GradientBoostedTrees::new(BoostingParams::default()),
            is_trained: false,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    /// Green-flag laps only: no pit markers and inside 107% of the best.
    pub fn prepare_training_data(laps: &Laps) -> (Vec<Features>, Vec<f64>) {
        let clean = laps.pick_wo_box();
        let Some(best) = clean.best_lap_time() else {
            return (Vec::new(), Vec::new());
        };
        let threshold = best * QUICKLAP_THRESHOLD;

        clean
            .iter()
            .filter_map(|l| {
                let t = l.lap_time.filter(|t| *t < threshold)?;
                let code = l.compound.map_or(1.0, |c| c.code());
                Some(([l.tyre_life?, code, l.lap_number as f64], t))
            })
            .unzip()
    }

    /// Fits on a seeded 80/20 shuffle split and returns the hold-out RMSE.
    pub fn train(&mut self, laps: &Laps) -> Result<f64> {
        tracing::info!("Starting tyre model training");
        let (x, y) = Self::prepare_training_data(laps);
        if x.len() < 2 {
            tracing::error!("Training failed: {} usable laps", x.len());
            return Err(ApexError::ProcessingError {
                message: format!("need at least 2 clean laps to train, got {}", x.len()),
            });
        }

        let mut idx: Vec<usize> = (0..x.len()).collect();
        idx.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));
        let n_test = ((x.len() as f64) * TEST_FRACTION).ceil() as usize;
        let (test, train) = idx.split_at(n_test);

        let x_train: Vec<Features> = train.iter().map(|&i| x[i]).collect();
        let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
        self.model.fit(&x_train, &y_train)?;

        let mse = test
            .iter()
            .map(|&i| (self.model.predict(&x[i]) - y[i]).powi(2))
            .sum::<f64>()
            / test.len() as f64;
        let rmse = mse.sqrt();

        self.is_trained = true;
        tracing::info!("Model trained. RMSE: {:.3}s", rmse);
        Ok(rmse)
    }

    /// Predicted lap times over a fresh stint from the race start.
    pub fn predict_wear_curve(&self, compound: Compound, total_laps: usize) -> Vec<f64> {
        if !self.is_trained {
            return linspace(0.0, 2.0, total_laps);
        }
        (1..=total_laps)
            .map(|lap| {
                let lap = lap as f64;
                self.model.predict(&[lap, compound.code(), lap])
            })
            .collect()
    }
}

/// Time lost between the first and last lap of a wear curve.
pub fn wear_delta(curve: &[f64]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Lap;

    fn lap(n: u32, compound: Compound, life: f64, time: f64) -> Lap {
        Lap {
            driver: "VER".to_string(),
            lap_number: n,
            lap_time: Some(time),
            sector1_time: None,
            sector2_time: None,
            sector3_time: None,
            compound: Some(compound),
            tyre_life: Some(life),
            stint: None,
            pit_in_time: None,
            pit_out_time: None,
            time: None,
            team: None,
        }
    }

    fn degrading_laps() -> Laps {
        let mut laps = Vec::new();
        for n in 1..=30 {
            laps.push(lap(n, Compound::Medium, n as f64, 90.0 + 0.1 * n as f64));
        }
        for n in 31..=57 {
            let life = (n - 30) as f64;
            laps.push(lap(n, Compound::Hard, life, 90.5 + 0.05 * life));
        }
        Laps::new(laps)
    }

    #[test]
    fn test_untrained_model_falls_back_to_linear() {
        let model = TyreDegradationModel::new();
        let curve = model.predict_wear_curve(Compound::Soft, 5);
        assert_eq!(curve, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_training_data_excludes_box_and_slow_laps() {
        let mut laps = degrading_laps().0;
        laps[3].pit_in_time = Some(1234.0);
        laps[4].lap_time = Some(140.0);
        laps[5].tyre_life = None;
        let (x, y) = TyreDegradationModel::prepare_training_data(&Laps::new(laps));
        assert_eq!(x.len(), 54);
        assert_eq!(y.len(), 54);
        assert_eq!(x[0], [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_training_fits_monotone_degradation() {
        let mut model = TyreDegradationModel::new();
        let rmse = model.train(&degrading_laps()).unwrap();
        assert!(model.is_trained());
        assert!(rmse < 0.3, "rmse {}", rmse);

        let curve = model.predict_wear_curve(Compound::Medium, 25);
        assert_eq!(curve.len(), 25);
        assert!(curve[24] > curve[0] + 1.0);
    }

    #[test]
    fn test_wear_delta_is_relative_to_first_lap() {
        let mut model = TyreDegradationModel::new();
        assert_eq!(wear_delta(&model.predict_wear_curve(Compound::Soft, 5)), 2.0);
        assert_eq!(wear_delta(&[]), 0.0);

        model.train(&degrading_laps()).unwrap();
        let curve = model.predict_wear_curve(Compound::Medium, 25);
        assert!(curve[0] > 80.0);
        let delta = wear_delta(&curve);
        assert!(delta > 1.0 && delta < 5.0, "delta {}", delta);
    }

    #[test]
    fn test_training_without_data_fails() {
        let mut model = TyreDegradationModel::new();
        assert!(model.train(&Laps::default()).is_err());
        assert!(!model.is_trained());
    }

    #[test]
    fn test_boosting_recovers_step_function() {
        let x: Vec<Features> = (0..20).map(|i| [i as f64, 0.0, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 3.0 }).collect();
        let mut gbt = GradientBoostedTrees::new(BoostingParams::default());
        gbt.fit(&x, &y).unwrap();
        assert!((gbt.predict(&[2.0, 0.0, 0.0]) - 1.0).abs() < 0.05);
        assert!((gbt.predict(&[15.0, 0.0, 0.0]) - 3.0).abs() < 0.05);
    }
}
