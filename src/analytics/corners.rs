use crate::domain::model::TelemetryTrace;
use crate::physics::signal::mean;
use serde::Serialize;

/// Minimum spacing between apexes, in samples.
pub const APEX_MIN_SPACING: usize = 150;
/// Minimum speed drop (km/h) for a dip to count as a corner.
pub const APEX_MIN_PROMINENCE: f64 = 10.0;
/// Samples before the apex searched for the peak braking force.
const BRAKING_LOOKBACK: usize = 20;
/// Two apexes further apart than this (m) are different corners.
pub const ALIGN_TOLERANCE_M: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Corner {
    pub name: String,
    pub distance: f64,
    pub apex_speed: f64,
    pub min_g_brake: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedCorner {
    pub corner: String,
    pub distance: f64,
    pub driver1_speed: f64,
    pub driver2_speed: f64,
    /// Positive when driver 1 carries more apex speed.
    pub apex_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CornerType {
    #[serde(rename = "Low Speed (<100)")]
    Low,
    #[serde(rename = "Med Speed (100-180)")]
    Medium,
    #[serde(rename = "High Speed (>180)")]
    High,
}

impl CornerType {
    pub fn classify(apex_speed: f64) -> Self {
        if apex_speed < 100.0 {
            CornerType::Low
        } else if apex_speed < 180.0 {
            CornerType::Medium
        } else {
            CornerType::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CornerTypeSummary {
    pub corner_type: CornerType,
    pub mean_delta: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiniSector {
    pub sector: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// 1 or 2.
    pub winner: u8,
    pub delta: f64,
    pub speed_d1: f64,
    pub speed_d2: f64,
}

/// Local maxima of `x` that satisfy a minimum spacing (in samples) and a
/// minimum prominence. Plateaus report their middle sample.
pub fn find_peaks(x: &[f64], distance: usize, prominence: f64) -> Vec<usize> {
    let mut peaks = local_maxima(x);

    if distance > 1 && peaks.len() > 1 {
        let mut keep = vec![true; peaks.len()];
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(b.cmp(&a)));

        for &j in &order {
            if !keep[j] {
                continue;
            }
            let mut k = j;
            while k > 0 && peaks[j] - peaks[k - 1] < distance {
                keep[k - 1] = false;
                k -= 1;
            }
            let mut k = j + 1;
            while k < peaks.len() && peaks[k] - peaks[j] < distance {
                keep[k] = false;
                k += 1;
            }
        }
        peaks = peaks
            .into_iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(p))
            .collect();
    }

    peaks
        .into_iter()
        .filter(|&p| peak_prominence(x, p) >= prominence)
        .collect()
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

fn peak_prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    let mut i = peak as isize;
    while i >= 0 && x[i as usize] <= height {
        left_min = left_min.min(x[i as usize]);
        i -= 1;
    }

    let mut right_min = height;
    let mut i = peak;
    while i < x.len() && x[i] <= height {
        right_min = right_min.min(x[i]);
        i += 1;
    }

    height - left_min.max(right_min)
}

/// Apexes are local minima of the speed trace.
pub fn detect_corners(trace: &TelemetryTrace) -> Vec<Corner> {
    if trace.is_empty() {
        return Vec::new();
    }

    let inverted: Vec<f64> = trace.speed.iter().map(|v| -v).collect();
    find_peaks(&inverted, APEX_MIN_SPACING, APEX_MIN_PROMINENCE)
        .into_iter()
        .enumerate()
        .map(|(i, idx)| {
            let start = idx.saturating_sub(BRAKING_LOOKBACK);
            let min_g_brake = trace.g_long[start..idx]
                .iter()
                .copied()
                .min_by(|a, b| a.total_cmp(b))
                .unwrap_or(0.0);
            Corner {
                name: format!("T{}", i + 1),
                distance: trace.distance[idx],
                apex_speed: trace.speed[idx],
                min_g_brake,
            }
        })
        .collect()
}

/// Pairs each of driver 1's corners with driver 2's nearest apex within tolerance.
pub fn align_corners(c1: &[Corner], c2: &[Corner]) -> Vec<AlignedCorner> {
    c1.iter()
        .filter_map(|r1| {
            let r2 = c2
                .iter()
                .map(|c| (c, (c.distance - r1.distance).abs()))
                .filter(|(_, gap)| *gap < ALIGN_TOLERANCE_M)
                .min_by(|a, b| a.1.total_cmp(&b.1))?
                .0;
            Some(AlignedCorner {
                corner: r1.name.clone(),
                distance: r1.distance,
                driver1_speed: r1.apex_speed,
                driver2_speed: r2.apex_speed,
                apex_delta: r1.apex_speed - r2.apex_speed,
            })
        })
        .collect()
}

pub fn corner_type_summary(t1: &TelemetryTrace, t2: &TelemetryTrace) -> Vec<CornerTypeSummary> {
    let aligned = align_corners(&detect_corners(t1), &detect_corners(t2));

    let mut buckets: std::collections::BTreeMap<CornerType, Vec<f64>> = Default::default();
    for a in &aligned {
        buckets
            .entry(CornerType::classify(a.driver1_speed))
            .or_default()
            .push(a.apex_delta);
    }

    buckets
        .into_iter()
        .map(|(corner_type, deltas)| CornerTypeSummary {
            corner_type,
            mean_delta: mean(&deltas).unwrap_or(0.0),
            count: deltas.len(),
        })
        .collect()
}

/// Splits the lap into `n_sectors` distance bins and names the faster driver in each.
pub fn mini_sector_dominance(
    t1: &TelemetryTrace,
    t2: &TelemetryTrace,
    n_sectors: usize,
) -> Vec<MiniSector> {
    let max_dist = match (t1.max_distance(), t2.max_distance()) {
        (Some(a), Some(b)) => a.max(b),
        _ => return Vec::new(),
    };
    if n_sectors == 0 || max_dist <= 0.0 {
        return Vec::new();
    }
    let width = max_dist / n_sectors as f64;
    // Right-closed bins; distance 0 falls outside the first bin.
    let bin_of = |d: f64| -> Option<usize> {
        if d <= 0.0 || d > max_dist {
            return None;
        }
        Some((((d / width).ceil() as usize).max(1) - 1).min(n_sectors - 1))
    };

    let collect = |t: &TelemetryTrace, sector: usize| -> Vec<usize> {
        (0..t.len())
            .filter(|&i| bin_of(t.distance[i]) == Some(sector))
            .collect()
    };

    let mut out = Vec::new();
    for sector in 0..n_sectors {
        let idx1 = collect(t1, sector);
        let idx2 = collect(t2, sector);
        if idx1.is_empty() || idx2.is_empty() {
            continue;
        }

        let speeds1: Vec<f64> = idx1.iter().map(|&i| t1.speed[i]).collect();
        let speeds2: Vec<f64> = idx2.iter().map(|&i| t2.speed[i]).collect();
        let v1 = mean(&speeds1).unwrap_or(0.0);
        let v2 = mean(&speeds2).unwrap_or(0.0);
        let delta = v1 - v2;

        let centroid = |c: &Option<Vec<f64>>| {
            c.as_ref()
                .and_then(|v| mean(&idx1.iter().map(|&i| v[i]).collect::<Vec<_>>()))
        };

        out.push(MiniSector {
            sector,
            x: centroid(&t1.x),
            y: centroid(&t1.y),
            winner: if delta > 0.0 { 1 } else { 2 },
            delta,
            speed_d1: v1,
            speed_d2: v2,
        });
    }
    out
}

/// Indices of corner-exit samples: below 160 km/h with the throttle open.
pub fn traction_zones(trace: &TelemetryTrace) -> Vec<usize> {
    (0..trace.len())
        .filter(|&i| trace.speed[i] < 160.0 && trace.throttle[i] > 10.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A lap with speed dips of the given depth at the given sample indices.
    fn lap_with_dips(n: usize, dips: &[(usize, f64)]) -> TelemetryTrace {
        let mut speed = vec![300.0_f64; n];
        for &(centre, apex) in dips {
            for (i, v) in speed.iter_mut().enumerate() {
                let d = (i as f64 - centre as f64).abs();
                if d < 40.0 {
                    let dip = apex + (300.0 - apex) * d / 40.0;
                    *v = v.min(dip);
                }
            }
        }
        TelemetryTrace {
            distance: (0..n).map(|i| i as f64 * 5.0).collect(),
            time: (0..n).map(|i| i as f64 * 0.1).collect(),
            throttle: vec![100.0; n],
            brake: vec![false; n],
            speed_smooth: speed.clone(),
            g_long: (0..n).map(|i| -((i % 7) as f64) * 0.5).collect(),
            g_lat: vec![0.0; n],
            speed,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_peaks_plateau_and_prominence() {
        let x = vec![0.0, 5.0, 5.0, 5.0, 0.0, 1.0, 0.5, 0.0];
        assert_eq!(find_peaks(&x, 1, 0.0), vec![2, 5]);
        assert_eq!(find_peaks(&x, 1, 2.0), vec![2]);
    }

    #[test]
    fn test_find_peaks_distance_keeps_higher() {
        let x = vec![0.0, 3.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&x, 3, 0.0), vec![3, 8]);
    }

    #[test]
    fn test_detect_corners_finds_apexes() {
        let trace = lap_with_dips(800, &[(200, 90.0), (550, 210.0)]);
        let corners = detect_corners(&trace);
        assert_eq!(corners.len(), 2);
        assert_eq!(corners[0].name, "T1");
        assert_eq!(corners[0].apex_speed, 90.0);
        assert_eq!(corners[0].distance, 1000.0);
        assert_eq!(corners[1].apex_speed, 210.0);
        assert_eq!(corners[0].min_g_brake, -3.0);
    }

    #[test]
    fn test_shallow_dip_is_not_a_corner() {
        let trace = lap_with_dips(400, &[(200, 295.0)]);
        assert!(detect_corners(&trace).is_empty());
    }

    #[test]
    fn test_align_corners_tolerance() {
        let c = |name: &str, d: f64, v: f64| Corner {
            name: name.to_string(),
            distance: d,
            apex_speed: v,
            min_g_brake: 0.0,
        };
        let c1 = vec![c("T1", 500.0, 90.0), c("T2", 1500.0, 150.0)];
        let c2 = vec![c("T1", 560.0, 85.0), c("T2", 1620.0, 155.0)];
        let aligned = align_corners(&c1, &c2);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].corner, "T1");
        assert_eq!(aligned[0].apex_delta, 5.0);
    }

    #[test]
    fn test_corner_type_summary() {
        let t1 = lap_with_dips(800, &[(200, 90.0), (550, 210.0)]);
        let t2 = lap_with_dips(800, &[(200, 80.0), (550, 200.0)]);
        let summary = corner_type_summary(&t1, &t2);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].corner_type, CornerType::Low);
        assert_eq!(summary[0].mean_delta, 10.0);
        assert_eq!(summary[1].corner_type, CornerType::High);
        assert_eq!(summary[1].count, 1);
    }

    #[test]
    fn test_mini_sector_dominance_winner() {
        let t1 = lap_with_dips(100, &[]);
        let mut t2 = t1.clone();
        for v in t2.speed.iter_mut().skip(50) {
            *v = 320.0;
        }
        let sectors = mini_sector_dominance(&t1, &t2, 2);
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].winner, 2);
        assert_eq!(sectors[0].delta, 0.0);
        assert_eq!(sectors[1].winner, 2);
        assert!(sectors[1].delta < 0.0);
    }
}
