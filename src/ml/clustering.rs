use crate::domain::model::{Laps, Session};
use crate::physics::signal::{gradient, std_dev};
use crate::utils::error::{ApexError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub const CLUSTER_SEED: u64 = 42;
const N_CLUSTERS: usize = 3;
const MAX_ITER: usize = 300;
const N_INIT: usize = 10;

pub const LAP_LABELS: [&str; 3] = ["🔥 PUSH", "⚖️ RACE PACE", "🐢 COOL/SLOW"];
pub const STYLE_LABELS: [&str; 3] = ["Smooth / Preserver", "Balanced", "Aggressive / Late Braker"];

/// Zero-mean, unit-variance scaling per column (population std).
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map_or(0, |r| r.len());
        let n = rows.len() as f64;
        let mut mean = vec![0.0; dims];
        let mut scale = vec![1.0; dims];

        for d in 0..dims {
            let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
            mean[d] = column.iter().sum::<f64>() / n;
            let std = std_dev(&column).unwrap_or(0.0);
            if std > 0.0 {
                scale[d] = std;
            }
        }
        Self { mean, scale }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .map(|(d, v)| (v - self.mean[d]) / self.scale[d])
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> (Self, Vec<Vec<f64>>) {
        let scaler = Self::fit(rows);
        let scaled = scaler.transform(rows);
        (scaler, scaled)
    }
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    rng: StdRng,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            centroids: Vec::new(),
            inertia: f64::INFINITY,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Best of `N_INIT` k-means++ restarts by inertia; returns cluster labels.
    pub fn fit_predict(&mut self, points: &[Vec<f64>]) -> Result<Vec<usize>> {
        if points.len() < self.k || self.k == 0 {
            return Err(ApexError::InsufficientData {
                required: self.k.max(1),
                available: points.len(),
            });
        }

        let mut best: Option<(f64, Vec<Vec<f64>>, Vec<usize>)> = None;
        for _ in 0..N_INIT {
            let seeds = self.init_plus_plus(points);
            let (centroids, labels, inertia) = lloyd(points, seeds);
            if best.as_ref().map_or(true, |b| inertia < b.0) {
                best = Some((inertia, centroids, labels));
            }
        }

        let (inertia, centroids, labels) = best.ok_or(ApexError::InsufficientData {
            required: self.k,
            available: points.len(),
        })?;
        self.inertia = inertia;
        self.centroids = centroids;
        Ok(labels)
    }

    fn init_plus_plus(&mut self, points: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut centroids = vec![points[self.rng.gen_range(0..points.len())].clone()];
        while centroids.len() < self.k {
            let d2: Vec<f64> = points
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| sq_dist(p, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = d2.iter().sum();

            let next = if total > 0.0 {
                let mut target = self.rng.gen::<f64>() * total;
                let mut chosen = points.len() - 1;
                for (i, d) in d2.iter().enumerate() {
                    if target < *d {
                        chosen = i;
                        break;
                    }
                    target -= d;
                }
                chosen
            } else {
                self.rng.gen_range(0..points.len())
            };
            centroids.push(points[next].clone());
        }
        centroids
    }
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>) -> (Vec<Vec<f64>>, Vec<usize>, f64) {
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITER {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest(p, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(p, _)| p)
                .collect();
            // Empty clusters keep their previous centre.
            if members.is_empty() {
                continue;
            }
            for (d, value) in centroid.iter_mut().enumerate() {
                *value = members.iter().map(|m| m[d]).sum::<f64>() / members.len() as f64;
            }
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| sq_dist(p, &centroids[l]))
        .sum();
    (centroids, labels, inertia)
}

fn nearest(p: &[f64], centroids: &[Vec<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|a, b| sq_dist(p, a.1).total_cmp(&sq_dist(p, b.1)))
        .map_or(0, |(i, _)| i)
}

/// Cluster ids ranked by `key`, ascending, as a cluster-to-rank table.
fn rank_clusters(key: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..key.len()).collect();
    order.sort_by(|&a, &b| key[a].total_cmp(&key[b]));
    let mut rank = vec![0; key.len()];
    for (r, &c) in order.iter().enumerate() {
        rank[c] = r;
    }
    rank
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapCluster {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: f64,
    pub cluster: usize,
    pub lap_type: &'static str,
}

/// Labels every fully-timed lap as push, race pace or cool-down.
pub fn cluster_laps(laps: &Laps) -> Result<Vec<LapCluster>> {
    let timed: Vec<_> = laps
        .iter()
        .filter_map(|l| {
            Some((
                l,
                vec![l.lap_time?, l.sector1_time?, l.sector3_time?],
            ))
        })
        .filter(|(l, _)| l.sector2_time.is_some())
        .collect();
    let rows: Vec<Vec<f64>> = timed.iter().map(|(_, r)| r.clone()).collect();

    let (_, scaled) = StandardScaler::fit_transform(&rows);
    let mut kmeans = KMeans::new(N_CLUSTERS, CLUSTER_SEED);
    let labels = kmeans.fit_predict(&scaled)?;

    let mut mean_time = vec![f64::INFINITY; N_CLUSTERS];
    for c in 0..N_CLUSTERS {
        let times: Vec<f64> = rows
            .iter()
            .zip(&labels)
            .filter(|(_, l)| **l == c)
            .map(|(r, _)| r[0])
            .collect();
        if !times.is_empty() {
            mean_time[c] = times.iter().sum::<f64>() / times.len() as f64;
        }
    }
    let rank = rank_clusters(&mean_time);

    Ok(timed
        .iter()
        .zip(labels)
        .map(|((lap, row), cluster)| LapCluster {
            driver: lap.driver.clone(),
            lap_number: lap.lap_number,
            lap_time: row[0],
            cluster,
            lap_type: LAP_LABELS[rank[cluster]],
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStyle {
    pub driver: String,
    pub throttle_aggression: f64,
    pub braking_force: f64,
    pub cluster: usize,
    pub style: &'static str,
}

/// Groups drivers by throttle and braking signatures on their fastest laps.
pub fn profile_driver_styles(session: &Session) -> Result<Vec<DriverStyle>> {
    let mut stats: Vec<(String, f64, f64)> = Vec::new();
    for driver in session.classified_drivers() {
        let Some(trace) = session.fastest_lap_trace(driver) else {
            continue;
        };
        let throttle = std_dev(&gradient(&trace.throttle, None));
        let v: Vec<f64> = trace.speed.iter().map(|s| s / 3.6).collect();
        let braking = gradient(&v, None)
            .into_iter()
            .min_by(|a, b| a.total_cmp(b))
            .map(f64::abs);
        if let (Some(t), Some(b)) = (throttle, braking) {
            stats.push((driver.to_string(), t, b));
        }
    }

    let rows: Vec<Vec<f64>> = stats.iter().map(|(_, t, b)| vec![*t, *b]).collect();
    let (_, scaled) = StandardScaler::fit_transform(&rows);
    let mut kmeans = KMeans::new(N_CLUSTERS, CLUSTER_SEED);
    let labels = kmeans.fit_predict(&scaled)?;

    let intensity: Vec<f64> = kmeans.centroids.iter().map(|c| c.iter().sum()).collect();
    let rank = rank_clusters(&intensity);

    Ok(stats
        .into_iter()
        .zip(labels)
        .map(|((driver, throttle_aggression, braking_force), cluster)| DriverStyle {
            driver,
            throttle_aggression,
            braking_force,
            cluster,
            style: STYLE_LABELS[rank[cluster]],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DriverResult, Lap, TelemetrySample};

    fn lap(n: u32, time: f64) -> Lap {
        Lap {
            driver: "NOR".to_string(),
            lap_number: n,
            lap_time: Some(time),
            sector1_time: Some(time * 0.3),
            sector2_time: Some(time * 0.4),
            sector3_time: Some(time * 0.3),
            compound: None,
            tyre_life: None,
            stint: None,
            pit_in_time: None,
            pit_out_time: None,
            time: None,
            team: None,
        }
    }

    #[test]
    fn test_scaler_handles_constant_column() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let (_, scaled) = StandardScaler::fit_transform(&rows);
        assert_eq!(scaled, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let mut points = Vec::new();
        for centre in [0.0, 10.0, 20.0] {
            for j in 0..5 {
                points.push(vec![centre + j as f64 * 0.1, centre]);
            }
        }
        let mut km = KMeans::new(3, 7);
        let labels = km.fit_predict(&points).unwrap();
        for blob in labels.chunks(5) {
            assert!(blob.iter().all(|l| *l == blob[0]));
        }
        assert_ne!(labels[0], labels[5]);
        assert_ne!(labels[5], labels[10]);
        assert!(km.inertia < 1.0);
    }

    #[test]
    fn test_cluster_laps_labels_fastest_group_push() {
        let mut laps = Vec::new();
        let mut n = 0;
        for base in [90.0, 95.0, 110.0] {
            for j in 0..4 {
                n += 1;
                laps.push(lap(n, base + j as f64 * 0.05));
            }
        }
        let mut untimed = lap(99, 90.0);
        untimed.sector2_time = None;
        laps.push(untimed);

        let clustered = cluster_laps(&Laps::new(laps)).unwrap();
        assert_eq!(clustered.len(), 12);
        assert!(clustered[..4].iter().all(|c| c.lap_type == LAP_LABELS[0]));
        assert!(clustered[4..8].iter().all(|c| c.lap_type == LAP_LABELS[1]));
        assert!(clustered[8..].iter().all(|c| c.lap_type == LAP_LABELS[2]));
    }

    #[test]
    fn test_too_few_laps_is_an_error() {
        let laps = Laps::new(vec![lap(1, 90.0), lap(2, 91.0)]);
        assert!(matches!(
            cluster_laps(&laps),
            Err(ApexError::InsufficientData { required: 3, available: 2 })
        ));
    }

    #[test]
    fn test_profile_driver_styles() {
        let mut session = Session::default();
        // Throttle swing and braking intensity grow together across drivers.
        let drivers = [("ALB", 1.0), ("SAR", 1.1), ("HUL", 5.0), ("MAG", 5.2), ("VER", 9.0), ("PER", 9.3)];
        for (i, (driver, intensity)) in drivers.iter().enumerate() {
            session.results.push(DriverResult {
                position: Some(i as u32 + 1),
                abbreviation: driver.to_string(),
                full_name: driver.to_string(),
                team_name: "Team".to_string(),
                time: None,
            });
            let mut l = lap(1, 90.0);
            l.driver = driver.to_string();
            session.laps.0.push(l);
            let samples = (0..10)
                .map(|j| TelemetrySample {
                    driver: driver.to_string(),
                    lap_number: 1,
                    distance: j as f64 * 10.0,
                    speed: 300.0 - if j >= 5 { intensity * 3.6 * (j - 4) as f64 } else { 0.0 },
                    time: j as f64 * 0.1,
                    throttle: if j % 2 == 0 { 0.0 } else { intensity * 10.0 },
                    brake: j >= 5,
                    x: None,
                    y: None,
                    z: None,
                })
                .collect();
            session.telemetry.insert((driver.to_string(), 1), samples);
        }

        let styles = profile_driver_styles(&session).unwrap();
        assert_eq!(styles.len(), 6);
        let style_of = |d: &str| styles.iter().find(|s| s.driver == d).unwrap().style;
        assert_eq!(style_of("ALB"), STYLE_LABELS[0]);
        assert_eq!(style_of("HUL"), STYLE_LABELS[1]);
        assert_eq!(style_of("PER"), STYLE_LABELS[2]);
        assert_eq!(style_of("VER"), style_of("PER"));
    }
}
