use crate::domain::model::TelemetryTrace;
use crate::physics::signal::interp;
use crate::utils::error::{ApexError, Result};
use serde::Serialize;

/// One point of a head-to-head trace on the reference distance axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattlePoint {
    pub distance: f64,
    pub ref_speed: f64,
    pub target_speed: f64,
    /// Positive when the target arrives later.
    pub delta: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

pub fn calculate_delta(reference: &TelemetryTrace, target: &TelemetryTrace) -> Result<Vec<BattlePoint>> {
    if reference.is_empty() || target.is_empty() {
        return Err(ApexError::MissingDataError {
            message: "head-to-head needs distance data for both laps".to_string(),
        });
    }

    let channel = |c: &Option<Vec<f64>>, i: usize| c.as_ref().and_then(|v| v.get(i).copied());

    Ok((0..reference.len())
        .map(|i| {
            let d = reference.distance[i];
            let target_time = interp(d, &target.distance, &target.time);
            BattlePoint {
                distance: d,
                ref_speed: reference.speed[i],
                target_speed: interp(d, &target.distance, &target.speed),
                delta: target_time - reference.time[i],
                x: channel(&reference.x, i),
                y: channel(&reference.y, i),
                z: channel(&reference.z, i),
            }
        })
        .collect())
}

/// Time gained or lost inside each of `n_sectors` equal-width distance bins.
pub fn mini_sector_deltas(trace: &[BattlePoint], n_sectors: usize) -> Vec<f64> {
    if trace.is_empty() || n_sectors == 0 {
        return Vec::new();
    }

    let (min_d, max_d) = trace.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.distance), hi.max(p.distance))
    });
    let width = (max_d - min_d) / n_sectors as f64;

    let mut last_delta: Vec<Option<f64>> = vec![None; n_sectors];
    for p in trace {
        let bin = if width > 0.0 {
            (((p.distance - min_d) / width) as usize).min(n_sectors - 1)
        } else {
            0
        };
        last_delta[bin] = Some(p.delta);
    }

    let present: Vec<f64> = last_delta.into_iter().flatten().collect();
    let mut out = Vec::with_capacity(present.len());
    for (i, d) in present.iter().enumerate() {
        out.push(if i == 0 { 0.0 } else { d - present[i - 1] });
    }
    out
}
