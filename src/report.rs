use crate::domain::model::Session;
use crate::results::fastest_lap;
use std::fmt::Write;

const TITLE: &str = "APEXBRAIN | POST-SESSION DEBRIEF";
const FOOTER: &str = "CONFIDENTIAL - INTERNAL USE ONLY";

/// Lap time as `m:ss.sss`.
pub fn format_lap_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:06.3}", minutes as u64, seconds - minutes * 60.0)
}

fn chapter(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n== {} ==\n", title);
}

/// Plain-text post-session debrief.
pub fn generate_debrief(
    session: &Session,
    driver_1: &str,
    driver_2: &str,
    strategy_insight: &str,
    battle_insight: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);

    chapter(
        &mut out,
        &format!("SESSION: {} - {}", session.event_name(), session.session_name()),
    );
    match session.weather.first() {
        Some(w) => {
            let _ = writeln!(
                out,
                "Track Temp: {}C | Air Temp: {}C | Humidity: {}%",
                w.track_temp, w.air_temp, w.humidity
            );
        }
        None => {
            let _ = writeln!(out, "Weather: not recorded");
        }
    }

    if let Some(winner) = session.results.first() {
        let _ = writeln!(out, "WINNER: {} ({})", winner.abbreviation, winner.team_name);
        if let Some(lap) = fastest_lap(session) {
            let time = lap.lap_time.map(format_lap_time).unwrap_or_default();
            let _ = writeln!(out, "FASTEST LAP: {} - {}", lap.driver, time);
        }
    }

    chapter(&mut out, &format!("HEAD-TO-HEAD: {} vs {}", driver_1, driver_2));
    let _ = writeln!(out, "AI INSIGHT:\n{}\n", battle_insight);
    let _ = writeln!(
        out,
        "Note: {} comparisons against {} show variance in braking points and corner exit traction.",
        driver_1, driver_2
    );

    chapter(&mut out, "STRATEGY RECOMMENDATION");
    let _ = writeln!(out, "{}", strategy_insight);

    let _ = writeln!(out, "\n{}", FOOTER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DriverResult, Lap, Laps, SessionKey, WeatherSample};

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(91.447), "1:31.447");
        assert_eq!(format_lap_time(65.0), "1:05.000");
        assert_eq!(format_lap_time(59.9), "0:59.900");
    }

    #[test]
    fn test_debrief_sections() {
        let session = Session {
            key: Some(SessionKey::new(2024, "Bahrain", "R")),
            laps: Laps::new(vec![Lap {
                driver: "LEC".to_string(),
                lap_number: 39,
                lap_time: Some(92.608),
                sector1_time: None,
                sector2_time: None,
                sector3_time: None,
                compound: None,
                tyre_life: None,
                stint: None,
                pit_in_time: None,
                pit_out_time: None,
                time: None,
                team: None,
            }]),
            results: vec![DriverResult {
                position: Some(1),
                abbreviation: "VER".to_string(),
                full_name: "Max Verstappen".to_string(),
                team_name: "Red Bull Racing".to_string(),
                time: Some(5504.742),
            }],
            weather: vec![WeatherSample {
                track_temp: 28.5,
                air_temp: 19.0,
                humidity: 46.0,
                rainfall: false,
            }],
            telemetry: Default::default(),
        };

        let text = generate_debrief(&session, "VER", "LEC", "Standard.", "VER controls.");
        assert!(text.starts_with(TITLE));
        assert!(text.contains("SESSION: Bahrain Grand Prix 2024 - R"));
        assert!(text.contains("Track Temp: 28.5C | Air Temp: 19C | Humidity: 46%"));
        assert!(text.contains("WINNER: VER (Red Bull Racing)"));
        assert!(text.contains("FASTEST LAP: LEC - 1:32.608"));
        assert!(text.contains("HEAD-TO-HEAD: VER vs LEC"));
        assert!(text.trim_end().ends_with(FOOTER));
    }
}
