use crate::domain::model::{DriverResult, Lap, Session};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lap distance used when no reference lap has telemetry.
const FALLBACK_LAP_DISTANCE: f64 = 5000.0;
pub const REPLAY_STEPS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub position: String,
    pub abbreviation: String,
    pub team_name: String,
    pub gap_to_leader: String,
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFrame {
    pub driver: String,
    /// Percent of the lap, 0 to 100.
    pub step: u32,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub distance: Option<f64>,
    pub speed: Option<f64>,
    pub team: Option<String>,
}

pub fn results_table(results: &[DriverResult]) -> Vec<ResultRow> {
    let leader_time = results.first().and_then(|r| r.time);

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let gap = match (r.time, leader_time) {
                (Some(t), Some(lead)) => t - lead,
                _ => 0.0,
            };
            ResultRow {
                position: r.position.unwrap_or(i as u32 + 1).to_string(),
                abbreviation: r.abbreviation.clone(),
                team_name: r.team_name.clone(),
                gap_to_leader: if gap > 0.0 {
                    format!("+{:.1}s", gap)
                } else {
                    "LEADER".to_string()
                },
                time: r.time,
            }
        })
        .collect()
}

pub fn fastest_lap(session: &Session) -> Option<Lap> {
    session.laps.pick_quicklaps().pick_fastest().cloned()
}

/// Each driver's fastest quick lap resampled onto 0-100 % of the lap, gaps
/// filled forward then backward so every classified driver has all steps.
pub fn replay_frames(session: &Session) -> Vec<ReplayFrame> {
    if session.laps.is_empty() {
        return Vec::new();
    }

    let max_dist = session
        .laps
        .pick_fastest()
        .and_then(|l| session.lap_telemetry(&l.driver, l.lap_number))
        .and_then(|samples| samples.iter().map(|s| s.distance).max_by(|a, b| a.total_cmp(b)))
        .filter(|d| *d > 0.0)
        .unwrap_or(FALLBACK_LAP_DISTANCE);

    let drivers = session.classified_drivers();
    let mut raw: BTreeMap<(&str, u32), (Option<f64>, Option<f64>, f64, f64)> = BTreeMap::new();
    let mut any = false;

    for &driver in &drivers {
        let quick = session.laps.pick_driver(driver).pick_quicklaps();
        let Some(lap) = quick.pick_fastest() else {
            continue;
        };
        let Some(samples) = session.lap_telemetry(driver, lap.lap_number) else {
            continue;
        };
        for s in samples {
            let step = (s.distance / max_dist * REPLAY_STEPS as f64) as u32;
            raw.entry((driver, step)).or_insert((s.x, s.y, s.distance, s.speed));
            any = true;
        }
    }
    if !any {
        return Vec::new();
    }

    let mut frames = Vec::new();
    for &driver in &drivers {
        let team = session.team_of(driver).map(str::to_string);
        let mut rows: Vec<ReplayFrame> = (0..=REPLAY_STEPS)
            .map(|step| {
                let hit = raw.get(&(driver, step));
                ReplayFrame {
                    driver: driver.to_string(),
                    step,
                    x: hit.and_then(|h| h.0),
                    y: hit.and_then(|h| h.1),
                    distance: hit.map(|h| h.2),
                    speed: hit.map(|h| h.3),
                    team: team.clone(),
                }
            })
            .collect();
        fill_gaps(&mut rows);
        frames.extend(rows);
    }
    frames
}

fn fill_gaps(rows: &mut [ReplayFrame]) {
    fn fill(rows: &mut [ReplayFrame], get: fn(&ReplayFrame) -> Option<f64>, set: fn(&mut ReplayFrame, f64)) {
        let mut last = None;
        for r in rows.iter_mut() {
            match get(r) {
                Some(v) => last = Some(v),
                None => {
                    if let Some(v) = last {
                        set(r, v)
                    }
                }
            }
        }
        let mut next = None;
        for r in rows.iter_mut().rev() {
            match get(r) {
                Some(v) => next = Some(v),
                None => {
                    if let Some(v) = next {
                        set(r, v)
                    }
                }
            }
        }
    }

    fill(rows, |r| r.x, |r, v| r.x = Some(v));
    fill(rows, |r| r.y, |r, v| r.y = Some(v));
    fill(rows, |r| r.distance, |r, v| r.distance = Some(v));
    fill(rows, |r| r.speed, |r, v| r.speed = Some(v));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Laps, TelemetrySample};

    fn result(pos: Option<u32>, abbr: &str, time: Option<f64>) -> DriverResult {
        DriverResult {
            position: pos,
            abbreviation: abbr.to_string(),
            full_name: abbr.to_string(),
            team_name: format!("{} Team", abbr),
            time,
        }
    }

    #[test]
    fn test_results_table_gaps_and_positions() {
        let rows = results_table(&[
            result(Some(1), "VER", Some(5400.0)),
            result(None, "NOR", Some(5407.34)),
            result(Some(3), "LEC", None),
        ]);
        assert_eq!(rows[0].gap_to_leader, "LEADER");
        assert_eq!(rows[1].position, "2");
        assert_eq!(rows[1].gap_to_leader, "+7.3s");
        assert_eq!(rows[2].gap_to_leader, "LEADER");
    }

    fn session_with_replay() -> Session {
        let mut session = Session::default();
        session.results = vec![result(Some(1), "VER", None), result(Some(2), "SAR", None)];
        let lap = Lap {
            driver: "VER".to_string(),
            lap_number: 1,
            lap_time: Some(90.0),
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
        };
        session.laps = Laps::new(vec![lap]);
        let samples = [0.0, 1000.0, 2500.0, 5000.0]
            .iter()
            .map(|d| TelemetrySample {
                driver: "VER".to_string(),
                lap_number: 1,
                distance: *d,
                speed: 200.0 + d / 100.0,
                time: d / 50.0,
                throttle: 100.0,
                brake: false,
                x: Some(*d),
                y: Some(0.0),
                z: None,
            })
            .collect();
        session.telemetry.insert(("VER".to_string(), 1), samples);
        session
    }

    #[test]
    fn test_replay_frames_cover_every_step() {
        let frames = replay_frames(&session_with_replay());
        assert_eq!(frames.len(), 2 * 101);

        let ver: Vec<&ReplayFrame> = frames.iter().filter(|f| f.driver == "VER").collect();
        assert_eq!(ver[0].distance, Some(0.0));
        assert_eq!(ver[19].distance, Some(0.0));
        assert_eq!(ver[20].distance, Some(1000.0));
        assert_eq!(ver[49].x, Some(1000.0));
        assert_eq!(ver[100].speed, Some(250.0));
        assert_eq!(ver[0].team.as_deref(), Some("VER Team"));

        // No telemetry at all for SAR: steps stay empty but the team is known.
        let sar: Vec<&ReplayFrame> = frames.iter().filter(|f| f.driver == "SAR").collect();
        assert_eq!(sar.len(), 101);
        assert!(sar.iter().all(|f| f.x.is_none()));
        assert_eq!(sar[0].team.as_deref(), Some("SAR Team"));
    }

    #[test]
    fn test_fastest_lap() {
        let session = session_with_replay();
        assert_eq!(fastest_lap(&session).unwrap().driver, "VER");
        assert!(replay_frames(&Session::default()).is_empty());
    }
}
