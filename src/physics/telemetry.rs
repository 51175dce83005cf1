use crate::domain::model::TelemetryTrace;
use crate::physics::signal::{
    centered_rolling_mean, finite_or_zero, gradient, interp_many, smooth_speed,
};
use serde::Serialize;

pub const GRAVITY: f64 = 9.81;
const KMH_TO_MS: f64 = 3.6;
const LATERAL_G_LIMIT: f64 = 6.0;
const LATERAL_SMOOTHING_WINDOW: usize = 5;
/// Pit lane and safety-car running are excluded from the grip envelope.
const ENVELOPE_MIN_SPEED: f64 = 80.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrictionEnvelope {
    pub area: f64,
    /// Hull vertices as (g_lat, g_long), counter-clockwise.
    pub vertices: Option<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverComparison {
    pub distance: Vec<f64>,
    /// Positive where the first driver is ahead.
    pub delta_time: Vec<f64>,
}

/// Derives smoothed speed and longitudinal/lateral G in place.
pub fn enrich(trace: &mut TelemetryTrace) {
    trace.speed_smooth = smooth_speed(&trace.speed);

    let v_ms: Vec<f64> = trace.speed_smooth.iter().map(|v| v / KMH_TO_MS).collect();
    trace.g_long = gradient(&v_ms, Some(&trace.time))
        .into_iter()
        .map(|a| finite_or_zero(a / GRAVITY))
        .collect();

    trace.g_lat = match (&trace.x, &trace.y) {
        (Some(x), Some(y)) => lateral_g(x, y, &v_ms),
        _ => vec![0.0; trace.len()],
    };
}

/// Centripetal acceleration from GPS curvature, smoothed and clipped.
fn lateral_g(x: &[f64], y: &[f64], v_ms: &[f64]) -> Vec<f64> {
    let dx = gradient(x, None);
    let dy = gradient(y, None);
    let ddx = gradient(&dx, None);
    let ddy = gradient(&dy, None);

    let raw: Vec<f64> = (0..v_ms.len())
        .map(|i| {
            let curvature =
                (dx[i] * ddy[i] - dy[i] * ddx[i]) / (dx[i].powi(2) + dy[i].powi(2)).powf(1.5);
            finite_or_zero(v_ms[i].powi(2) * curvature / GRAVITY)
        })
        .collect();

    centered_rolling_mean(&raw, LATERAL_SMOOTHING_WINDOW)
        .into_iter()
        .map(|g| g.clamp(-LATERAL_G_LIMIT, LATERAL_G_LIMIT))
        .collect()
}

/// Convex hull of the G-G diagram at racing speed. A larger area means the
/// driver uses more of the available grip.
pub fn friction_envelope(trace: &TelemetryTrace) -> FrictionEnvelope {
    let points: Vec<(f64, f64)> = (0..trace.len())
        .filter(|&i| trace.speed[i] > ENVELOPE_MIN_SPEED)
        .map(|i| (trace.g_lat[i], trace.g_long[i]))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    if points.len() < 3 {
        return FrictionEnvelope::default();
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        tracing::warn!("Friction envelope is degenerate ({} hull points)", hull.len());
        return FrictionEnvelope::default();
    }

    FrictionEnvelope {
        area: polygon_area(&hull),
        vertices: Some(hull),
    }
}

/// Andrew's monotone chain; collinear points are dropped.
pub fn convex_hull(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Shoelace formula.
pub fn polygon_area(vertices: &[(f64, f64)]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = vertices[i];
            let (x2, y2) = vertices[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();
    twice.abs() / 2.0
}

/// Aligns two laps on the first driver's distance axis.
pub fn compare_drivers(first: &TelemetryTrace, second: &TelemetryTrace) -> DriverComparison {
    let second_time = interp_many(&first.distance, &second.distance, &second.time);
    let delta_time = second_time
        .iter()
        .zip(&first.time)
        .map(|(t2, t1)| t2 - t1)
        .collect();

    DriverComparison {
        distance: first.distance.clone(),
        delta_time,
    }
}
