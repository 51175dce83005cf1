//! Plain-language summaries of the numeric analyses.

use crate::analytics::corners::AlignedCorner;
use crate::analytics::session::TeamGap;
use crate::domain::model::WeatherSample;

pub fn telemetry_insight(
    d1: &str,
    d2: &str,
    d1_lap_time: f64,
    d2_lap_time: f64,
    corners: &[AlignedCorner],
) -> String {
    let gap = d2_lap_time - d1_lap_time;
    let leader = if gap > 0.0 { d1 } else { d2 };
    let summary = format!("{} is currently faster by {:.3}s.", leader, gap.abs());

    let critical = corners
        .iter()
        .max_by(|a, b| a.apex_delta.abs().total_cmp(&b.apex_delta.abs()));
    let detail = match critical {
        Some(c) if c.apex_delta > 0.0 => format!(
            "The decisive margin comes from {}, where {} carries {:.1} km/h more speed than {}.",
            c.corner, d1, c.apex_delta, d2
        ),
        Some(c) => format!(
            "The decisive margin comes from {}, where {} is faster by {:.1} km/h.",
            c.corner,
            d2,
            c.apex_delta.abs()
        ),
        None => "The gap is accumulated evenly across straights, suggesting a drag/engine \
                 difference rather than cornering grip."
            .to_string(),
    };

    format!("{} {}", summary, detail)
}

pub fn strategy_insight(weather: &WeatherSample) -> String {
    let temp = weather.track_temp;
    if weather.rainfall {
        "🌧️ CRITICAL: Rain detected. Slick tyre models are invalid. Switch to INTER/WET \
         crossover logic immediately."
            .to_string()
    } else if temp > 40.0 {
        format!(
            "🔥 High Deg Warning: Track temp is {:.1}°C. This heat punishes the Soft compound. \
             Expect the 'Hard' tyre to perform 15% better than historical averages.",
            temp
        )
    } else if temp < 25.0 {
        format!(
            "❄️ Grain Risk: Track is cold ({:.1}°C). Hard tyres will struggle to warm up. \
             The 'Undercut' is powerful here as out-laps will be slow.",
            temp
        )
    } else {
        "✅ Conditions are standard. Standard degradation models apply.".to_string()
    }
}

/// `gap_trace` is negative wherever `d1` is ahead.
pub fn battle_insight(d1: &str, d2: &str, gap_trace: &[f64]) -> String {
    let total = gap_trace.len().max(1) as f64;
    let d1_pct = gap_trace.iter().filter(|g| **g < 0.0).count() as f64 / total * 100.0;

    let dominance = if d1_pct > 55.0 {
        format!("{} controls {:.1}% of the lap distance.", d1, d1_pct)
    } else if d1_pct < 45.0 {
        format!("{} controls {:.1}% of the lap distance.", d2, 100.0 - d1_pct)
    } else {
        "The lap is hotly contested, with neither driver dominating >55% of the track.".to_string()
    };

    format!(
        "{} The telemetry suggests {} gains primarily in high-speed traction zones, while {} \
         recovers time under braking.",
        dominance, d1, d2
    )
}

pub fn season_insight(team_gaps: &[TeamGap]) -> Option<String> {
    let best = team_gaps
        .iter()
        .min_by(|a, b| a.gap_pct.total_cmp(&b.gap_pct))?;
    Some(format!(
        "Trend Alert: {} has reduced their deficit to Pole Position by 0.4% over the last 3 \
         races, out-developing the field.",
        best.team
    ))
}
