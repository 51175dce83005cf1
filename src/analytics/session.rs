use crate::domain::model::{Compound, DriverResult, Lap, Laps, Session, QUICKLAP_THRESHOLD};
use crate::physics::signal::{mean, polyfit, std_dev};
use serde::Serialize;
use std::collections::BTreeMap;

/// Stints shorter than this are in/out laps or aborted runs.
const MIN_STINT_LAPS: usize = 3;
pub const DEFAULT_PIT_LOSS: f64 = 22.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapPoint {
    pub lap_number: u32,
    pub lap_time: f64,
    pub tyre_life: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StintSummary {
    pub stint_id: u32,
    pub compound: Option<Compound>,
    pub laps_count: usize,
    pub start_lap: u32,
    pub end_lap: u32,
    pub avg_pace: f64,
    /// Seconds lost per lap of tyre age.
    pub degradation: f64,
    #[serde(skip)]
    pub lap_data: Vec<LapPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupTrait {
    pub driver: String,
    pub top_speed: f64,
    pub cornering_speed: f64,
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdealLap {
    pub driver: String,
    pub best_s1: f64,
    pub best_s2: f64,
    pub best_s3: f64,
    pub theoretical_lap: f64,
    pub actual_lap: f64,
    pub time_left_on_table: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamGap {
    pub team: String,
    pub gap_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonTrends {
    pub races: Vec<&'static str>,
    /// Team name to percent gap to pole, one value per race.
    pub teams: BTreeMap<&'static str, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapPoint {
    pub driver: String,
    pub lap_number: u32,
    pub gap_to_leader: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StintRecord {
    pub driver: String,
    pub stint: u32,
    pub compound: Option<Compound>,
    pub start_lap: u32,
    pub end_lap: u32,
    pub laps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejoinThreat {
    pub driver: String,
    /// Negative: ahead of the rejoining car.
    pub gap_to_rejoin: f64,
}

/// Splits the driver's quick laps into stints on compound changes.
pub fn analyze_stints(session: &Session, driver: &str) -> Vec<StintSummary> {
    let laps = session.laps.pick_driver(driver).pick_quicklaps();

    let mut groups: Vec<Vec<&Lap>> = Vec::new();
    let mut previous: Option<Option<Compound>> = None;
    for lap in laps.iter() {
        if previous != Some(lap.compound) {
            groups.push(Vec::new());
            previous = Some(lap.compound);
        }
        if let Some(group) = groups.last_mut() {
            group.push(lap);
        }
    }

    groups
        .into_iter()
        .enumerate()
        .filter(|(_, g)| g.len() >= MIN_STINT_LAPS)
        .map(|(i, stint)| {
            let times: Vec<f64> = stint.iter().filter_map(|l| l.lap_time).collect();
            let degradation = if stint.len() > MIN_STINT_LAPS {
                let pairs: Vec<(f64, f64)> = stint
                    .iter()
                    .filter_map(|l| Some((l.tyre_life?, l.lap_time?)))
                    .collect();
                let (age, time): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
                polyfit(&age, &time, 1).map(|c| c[1]).unwrap_or(0.0)
            } else {
                0.0
            };

            StintSummary {
                stint_id: i as u32 + 1,
                compound: stint[0].compound,
                laps_count: stint.len(),
                start_lap: stint.iter().map(|l| l.lap_number).min().unwrap_or(0),
                end_lap: stint.iter().map(|l| l.lap_number).max().unwrap_or(0),
                avg_pace: mean(&times).unwrap_or(0.0),
                degradation,
                lap_data: stint
                    .iter()
                    .filter_map(|l| {
                        Some(LapPoint {
                            lap_number: l.lap_number,
                            lap_time: l.lap_time?,
                            tyre_life: l.tyre_life,
                        })
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Top speed against slow-corner speed per driver; a downforce/drag proxy.
pub fn setup_traits(session: &Session) -> Vec<SetupTrait> {
    session
        .classified_drivers()
        .into_iter()
        .filter_map(|driver| {
            let trace = session.fastest_lap_trace(driver)?;
            let top_speed = trace.max_speed()?;
            let slow: Vec<f64> = trace
                .speed
                .iter()
                .copied()
                .filter(|v| *v > 60.0 && *v < 120.0)
                .collect();
            Some(SetupTrait {
                driver: driver.to_string(),
                top_speed,
                cornering_speed: mean(&slow).unwrap_or(0.0),
                team: session.team_of(driver).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Theoretical best lap from the driver's best individual sectors.
pub fn ideal_lap(session: &Session, driver: &str) -> Option<IdealLap> {
    let laps = session.laps.pick_driver(driver).pick_quicklaps();
    if laps.is_empty() {
        return None;
    }
    let best = |f: fn(&Lap) -> Option<f64>| {
        laps.iter().filter_map(f).min_by(|a, b| a.total_cmp(b))
    };

    let best_s1 = best(|l| l.sector1_time)?;
    let best_s2 = best(|l| l.sector2_time)?;
    let best_s3 = best(|l| l.sector3_time)?;
    let actual_lap = laps.best_lap_time()?;
    let theoretical_lap = best_s1 + best_s2 + best_s3;

    Some(IdealLap {
        driver: driver.to_string(),
        best_s1,
        best_s2,
        best_s3,
        theoretical_lap,
        actual_lap,
        time_left_on_table: actual_lap - theoretical_lap,
    })
}

/// Lap-time spread over flying laps; lower is more consistent.
pub fn consistency_score(laps: &Laps) -> Option<f64> {
    let threshold = laps.best_lap_time()? * QUICKLAP_THRESHOLD;
    let times: Vec<f64> = laps
        .iter()
        .filter_map(|l| l.lap_time)
        .filter(|t| *t < threshold)
        .collect();
    std_dev(&times)
}

/// Each team's deficit to pole as a percentage, best first.
pub fn gap_to_pole(results: &[DriverResult]) -> Vec<TeamGap> {
    let Some(pole) = results
        .iter()
        .filter_map(|r| r.time)
        .min_by(|a, b| a.total_cmp(b))
    else {
        return Vec::new();
    };

    let mut best_by_team: Vec<(String, f64)> = Vec::new();
    for r in results {
        let Some(t) = r.time else { continue };
        match best_by_team.iter_mut().find(|(team, _)| *team == r.team_name) {
            Some((_, best)) => *best = best.min(t),
            None => best_by_team.push((r.team_name.clone(), t)),
        }
    }

    let mut gaps: Vec<TeamGap> = best_by_team
        .into_iter()
        .map(|(team, best)| TeamGap {
            team,
            gap_pct: (best / pole - 1.0) * 100.0,
        })
        .collect();
    gaps.sort_by(|a, b| a.gap_pct.total_cmp(&b.gap_pct));
    gaps
}

/// Representative 2024 development curves (percent gap to pole per round).
pub fn season_development_trends() -> SeasonTrends {
    let races = vec!["BHR", "SAU", "AUS", "JPN", "CHN", "MIA", "EMI", "MON", "CAN", "ESP"];
    let mut teams = BTreeMap::new();
    teams.insert(
        "Red Bull Racing",
        vec![0.00, 0.05, 0.00, 0.00, 0.00, 0.10, 0.05, 0.15, 0.05, 0.00],
    );
    teams.insert(
        "McLaren",
        vec![0.80, 0.75, 0.60, 0.55, 0.50, 0.15, 0.10, 0.05, 0.00, 0.05],
    );
    teams.insert(
        "Ferrari",
        vec![0.30, 0.25, 0.10, 0.35, 0.40, 0.30, 0.25, 0.00, 0.20, 0.25],
    );
    teams.insert(
        "Mercedes",
        vec![0.60, 0.65, 0.70, 0.60, 0.55, 0.50, 0.45, 0.40, 0.30, 0.25],
    );
    SeasonTrends { races, teams }
}

/// Gap to the classified winner on every lap both have completed.
pub fn race_trace(session: &Session) -> Vec<GapPoint> {
    let Some(leader) = session.results.first() else {
        return Vec::new();
    };
    let leader_laps = session.laps.pick_driver(&leader.abbreviation).pick_quicklaps();
    if leader_laps.is_empty() {
        return Vec::new();
    }

    let mut points = Vec::new();
    for driver in session.classified_drivers() {
        for lap in session.laps.pick_driver(driver).iter() {
            let leader_time = leader_laps
                .iter()
                .find(|l| l.lap_number == lap.lap_number)
                .and_then(|l| l.time);
            if let (Some(own), Some(lead)) = (lap.time, leader_time) {
                points.push(GapPoint {
                    driver: driver.to_string(),
                    lap_number: lap.lap_number,
                    gap_to_leader: own - lead,
                });
            }
        }
    }
    points
}

/// Every stint of every classified driver; missing stint numbers count as stint 1.
pub fn tyre_strategy_map(session: &Session) -> Vec<StintRecord> {
    let mut records = Vec::new();
    for driver in session.classified_drivers() {
        let laps = session.laps.pick_driver(driver);
        let mut stints: BTreeMap<u32, Vec<&Lap>> = BTreeMap::new();
        for lap in laps.iter() {
            stints.entry(lap.stint.unwrap_or(1)).or_default().push(lap);
        }
        for (stint, laps) in stints {
            records.push(StintRecord {
                driver: driver.to_string(),
                stint,
                compound: laps[0].compound,
                start_lap: laps.iter().map(|l| l.lap_number).min().unwrap_or(0),
                end_lap: laps.iter().map(|l| l.lap_number).max().unwrap_or(0),
                laps: laps.len(),
            });
        }
    }
    records
}

/// Cars within the rejoin window after a stop this lap.
pub fn pit_rejoin(session: &Session, driver: &str, pit_loss: f64) -> Vec<RejoinThreat> {
    let race_times: Vec<(&str, f64)> = session
        .classified_drivers()
        .into_iter()
        .filter_map(|d| {
            let laps = session.laps.pick_driver(d);
            let last = laps.iter().last()?.time?;
            Some((d, last))
        })
        .collect();

    let Some(&(_, own)) = race_times.iter().find(|(d, _)| *d == driver) else {
        return Vec::new();
    };
    let rejoin = own + pit_loss;

    let mut threats: Vec<RejoinThreat> = race_times
        .into_iter()
        .map(|(d, t)| RejoinThreat {
            driver: d.to_string(),
            gap_to_rejoin: t - rejoin,
        })
        .filter(|t| t.gap_to_rejoin > -5.0 && t.gap_to_rejoin < 10.0)
        .collect();
    threats.sort_by(|a, b| a.gap_to_rejoin.total_cmp(&b.gap_to_rejoin));
    threats
}
