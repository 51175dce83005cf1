use crate::utils::error::{ApexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Laps slower than this factor of the session best are not representative.
pub const QUICKLAP_THRESHOLD: f64 = 1.07;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    #[serde(other)]
    Unknown,
}

impl Compound {
    pub const DRY: [Compound; 3] = [Compound::Soft, Compound::Medium, Compound::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
            Compound::Unknown => "UNKNOWN",
        }
    }

    /// Ordinal used as a model feature. Anything but slicks maps to the medium code.
    pub fn code(&self) -> f64 {
        match self {
            Compound::Soft => 0.0,
            Compound::Hard => 2.0,
            _ => 1.0,
        }
    }

    pub fn initial(&self) -> char {
        self.as_str().chars().next().unwrap_or('?')
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Compound::Soft => "🔴",
            Compound::Medium => "🟡",
            _ => "⚪",
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compound {
    type Err = ApexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SOFT" => Ok(Compound::Soft),
            "MEDIUM" => Ok(Compound::Medium),
            "HARD" => Ok(Compound::Hard),
            "INTERMEDIATE" => Ok(Compound::Intermediate),
            "WET" => Ok(Compound::Wet),
            other => Err(ApexError::UnknownCompound(other.to_string())),
        }
    }
}

/// One timing row per driver per lap. Times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: Option<f64>,
    pub sector1_time: Option<f64>,
    pub sector2_time: Option<f64>,
    pub sector3_time: Option<f64>,
    pub compound: Option<Compound>,
    pub tyre_life: Option<f64>,
    pub stint: Option<u32>,
    pub pit_in_time: Option<f64>,
    pub pit_out_time: Option<f64>,
    /// Session time when the lap was completed.
    pub time: Option<f64>,
    pub team: Option<String>,
}

impl Lap {
    pub fn is_box_lap(&self) -> bool {
        self.pit_in_time.is_some() || self.pit_out_time.is_some()
    }

    pub fn has_all_sectors(&self) -> bool {
        self.sector1_time.is_some() && self.sector2_time.is_some() && self.sector3_time.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Laps(pub Vec<Lap>);

impl Laps {
    pub fn new(laps: Vec<Lap>) -> Self {
        Self(laps)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Lap> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pick_driver(&self, driver: &str) -> Laps {
        Laps(self.0.iter().filter(|l| l.driver == driver).cloned().collect())
    }

    pub fn best_lap_time(&self) -> Option<f64> {
        self.0
            .iter()
            .filter_map(|l| l.lap_time)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Fastest timed lap; ties go to the earliest.
    pub fn pick_fastest(&self) -> Option<&Lap> {
        self.0
            .iter()
            .filter(|l| l.lap_time.is_some())
            .min_by(|a, b| {
                a.lap_time
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.lap_time.unwrap_or(f64::INFINITY))
            })
    }

    pub fn pick_quicklaps(&self) -> Laps {
        let Some(best) = self.best_lap_time() else {
            return Laps::default();
        };
        let threshold = best * QUICKLAP_THRESHOLD;
        Laps(
            self.0
                .iter()
                .filter(|l| l.lap_time.is_some_and(|t| t < threshold))
                .cloned()
                .collect(),
        )
    }

    pub fn pick_wo_box(&self) -> Laps {
        Laps(self.0.iter().filter(|l| !l.is_box_lap()).cloned().collect())
    }

    pub fn max_lap_number(&self) -> Option<u32> {
        self.0.iter().map(|l| l.lap_number).max()
    }
}

impl FromIterator<Lap> for Laps {
    fn from_iter<I: IntoIterator<Item = Lap>>(iter: I) -> Self {
        Laps(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriverResult {
    pub position: Option<u32>,
    pub abbreviation: String,
    pub full_name: String,
    pub team_name: String,
    /// Race: total time (winner) or gap. Qualifying: best lap.
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WeatherSample {
    pub track_temp: f64,
    pub air_temp: f64,
    pub humidity: f64,
    pub rainfall: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetrySample {
    pub driver: String,
    pub lap_number: u32,
    pub distance: f64,
    pub speed: f64,
    pub time: f64,
    pub throttle: f64,
    pub brake: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// Column-oriented telemetry for one lap, with derived channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryTrace {
    pub distance: Vec<f64>,
    pub speed: Vec<f64>,
    pub time: Vec<f64>,
    pub throttle: Vec<f64>,
    pub brake: Vec<bool>,
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub z: Option<Vec<f64>>,
    pub speed_smooth: Vec<f64>,
    pub g_long: Vec<f64>,
    pub g_lat: Vec<f64>,
}

impl TelemetryTrace {
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        let n = samples.len();
        let column = |f: fn(&TelemetrySample) -> Option<f64>| -> Option<Vec<f64>> {
            samples.iter().map(f).collect()
        };

        Self {
            distance: samples.iter().map(|s| s.distance).collect(),
            speed: samples.iter().map(|s| s.speed).collect(),
            time: samples.iter().map(|s| s.time).collect(),
            throttle: samples.iter().map(|s| s.throttle).collect(),
            brake: samples.iter().map(|s| s.brake).collect(),
            x: column(|s| s.x),
            y: column(|s| s.y),
            z: column(|s| s.z),
            speed_smooth: samples.iter().map(|s| s.speed).collect(),
            g_long: vec![0.0; n],
            g_lat: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    pub fn max_speed(&self) -> Option<f64> {
        self.speed.iter().copied().max_by(|a, b| a.total_cmp(b))
    }

    pub fn max_distance(&self) -> Option<f64> {
        self.distance.iter().copied().max_by(|a, b| a.total_cmp(b))
    }

    pub fn has_position(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub year: u16,
    pub grand_prix: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(year: u16, grand_prix: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            year,
            grand_prix: grand_prix.into(),
            session: session.into(),
        }
    }

    /// Relative directory of the session inside the cache.
    pub fn relative_dir(&self) -> String {
        format!("{}/{}/{}", self.year, self.grand_prix, self.session)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.grand_prix, self.session)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub key: Option<SessionKey>,
    pub laps: Laps,
    pub results: Vec<DriverResult>,
    pub weather: Vec<WeatherSample>,
    pub telemetry: HashMap<(String, u32), Vec<TelemetrySample>>,
}

impl Session {
    pub fn event_name(&self) -> String {
        self.key
            .as_ref()
            .map(|k| format!("{} Grand Prix {}", k.grand_prix, k.year))
            .unwrap_or_else(|| "Unknown Event".to_string())
    }

    pub fn session_name(&self) -> &str {
        self.key.as_ref().map(|k| k.session.as_str()).unwrap_or("Session")
    }

    pub fn classified_drivers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for r in &self.results {
            if !seen.contains(&r.abbreviation.as_str()) {
                seen.push(r.abbreviation.as_str());
            }
        }
        seen
    }

    pub fn team_of(&self, driver: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.abbreviation == driver)
            .map(|r| r.team_name.as_str())
    }

    pub fn lap_telemetry(&self, driver: &str, lap_number: u32) -> Option<&[TelemetrySample]> {
        self.telemetry
            .get(&(driver.to_string(), lap_number))
            .map(|v| v.as_slice())
    }

    /// Raw trace of the driver's fastest lap, without derived channels.
    pub fn fastest_lap_trace(&self, driver: &str) -> Option<TelemetryTrace> {
        let laps = self.laps.pick_driver(driver);
        let fastest = laps.pick_fastest()?;
        let samples = self.lap_telemetry(driver, fastest.lap_number)?;
        Some(TelemetryTrace::from_samples(samples))
    }
}

/// Serialised outputs of one debrief run, ready to be archived.
#[derive(Debug, Clone, Default)]
pub struct DebriefBundle {
    pub corners_csv: String,
    pub stints_csv: String,
    pub strategies_json: String,
    pub summary_json: String,
    pub debrief_text: String,
}
