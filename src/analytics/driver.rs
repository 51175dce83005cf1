use crate::domain::model::TelemetryTrace;
use crate::physics::signal::{diff, mean};
use serde::Serialize;

/// Five-axis driving-style fingerprint, each axis in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverRadar {
    pub smoothness: f64,
    pub aggression: f64,
    pub braking: f64,
    pub cornering: f64,
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OvertakeAssessment {
    /// Percent, clamped to `[5, 95]`.
    pub probability: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisiveMoment {
    pub index: usize,
    pub distance: f64,
    pub gap: f64,
    pub caption: String,
}

pub fn driver_radar(trace: &TelemetryTrace) -> DriverRadar {
    radar_metrics(trace).unwrap_or_default()
}

pub fn compare_radar(t1: &TelemetryTrace, t2: &TelemetryTrace) -> (DriverRadar, DriverRadar) {
    (driver_radar(t1), driver_radar(t2))
}

fn radar_metrics(t: &TelemetryTrace) -> Option<DriverRadar> {
    // Jerk proxy: mean absolute second difference of speed.
    let jerk = mean(&diff(&diff(&t.speed)).iter().map(|v| v.abs()).collect::<Vec<_>>())?;
    let smoothness = if jerk > 0.0 { 1.0 / (1.0 + jerk) } else { 1.0 };

    let aggression = mean(&diff(&t.throttle).iter().map(|v| v.abs()).collect::<Vec<_>>())?;

    let braking = -(0..t.len())
        .filter(|&i| t.brake[i])
        .map(|i| t.g_long[i])
        .min_by(|a, b| a.total_cmp(b))?;

    let cornering = mean(
        &(0..t.len())
            .filter(|&i| t.speed[i] < 180.0)
            .map(|i| t.g_lat[i].abs())
            .collect::<Vec<_>>(),
    )?;

    Some(DriverRadar {
        smoothness: (smoothness * 8.0).min(1.0),
        aggression: (aggression * 4.0).min(1.0),
        braking: (braking / 5.0).min(1.0),
        cornering: (cornering / 2.5).min(1.0),
        consistency: 0.85,
    })
}

/// Rates the chaser's chance of a pass from top-speed and traction deltas.
pub fn overtake_probability(chaser: &TelemetryTrace, leader: &TelemetryTrace) -> OvertakeAssessment {
    let delta_v = chaser.max_speed().unwrap_or(0.0) - leader.max_speed().unwrap_or(0.0);

    let (mut probability, mut reason) = if delta_v > 15.0 {
        (85, "Massive Overspeed (+15kph)".to_string())
    } else if delta_v > 5.0 {
        (40, "DRS Effective Range".to_string())
    } else if delta_v < -5.0 {
        (5, "Chaser hitting drag wall".to_string())
    } else {
        (10, "Gap too stable".to_string())
    };

    // Corner-exit traction, compared on the chaser's slow-speed samples.
    let traction: Vec<usize> = (0..chaser.len())
        .filter(|&i| chaser.speed[i] < 100.0 && chaser.g_long[i] > 0.0)
        .collect();
    if traction.len() > 10 {
        let acc_chaser = mean(&traction.iter().map(|&i| chaser.g_long[i]).collect::<Vec<_>>());
        let acc_leader = mean(
            &traction
                .iter()
                .filter_map(|&i| leader.g_long.get(i).copied())
                .collect::<Vec<_>>(),
        );
        if let (Some(c), Some(l)) = (acc_chaser, acc_leader) {
            if c > l + 0.05 {
                probability += 15;
                reason.push_str(" + Superior Traction");
            }
        }
    }

    OvertakeAssessment {
        probability: probability.clamp(5, 95),
        reason,
    }
}

/// Point of the largest absolute gap along the lap.
pub fn decisive_moment(trace: &TelemetryTrace, delta: &[f64]) -> Option<DecisiveMoment> {
    let (index, gap) = delta
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, d)| d.is_finite())
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
    let distance = *trace.distance.get(index)?;

    Some(DecisiveMoment {
        index,
        distance,
        gap,
        caption: format!("DECISIVE MOMENT\nGap: {:.2}s", gap.abs()),
    })
}
