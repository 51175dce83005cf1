use crate::domain::model::{
    DriverResult, Lap, Laps, Session, SessionKey, TelemetrySample, TelemetryTrace, WeatherSample,
};
use crate::domain::ports::Storage;
use crate::physics::telemetry::enrich;
use crate::utils::error::{ApexError, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

pub const LAPS_FILE: &str = "laps.csv";
pub const RESULTS_FILE: &str = "results.csv";
pub const WEATHER_FILE: &str = "weather.csv";
pub const TELEMETRY_FILE: &str = "telemetry.csv";

/// Enriched telemetry of one lap together with its timing row.
#[derive(Debug, Clone)]
pub struct CleanLap {
    pub trace: TelemetryTrace,
    pub lap: Lap,
}

/// Loads sessions from the on-disk cache and memoises per-lap telemetry.
pub struct SessionStore<S: Storage> {
    storage: S,
    session: Option<Session>,
    telemetry_cache: HashMap<String, CleanLap>,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            session: None,
            telemetry_cache: HashMap::new(),
        }
    }

    /// Store around a session that was loaded elsewhere, with an empty telemetry cache.
    pub fn from_session(storage: S, session: Session) -> Self {
        Self {
            storage,
            session: Some(session),
            telemetry_cache: HashMap::new(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn into_session(self) -> Option<Session> {
        self.session
    }

    pub async fn load_session(&mut self, key: &SessionKey) -> Result<String> {
        self.session = None;
        self.telemetry_cache.clear();

        match self.read_session(key).await {
            Ok(session) => {
                let message = format!(
                    "Session Loaded: {} - {}",
                    session.event_name(),
                    session.session_name()
                );
                tracing::info!("Session loaded: {} ({} laps)", key, session.laps.len());
                self.session = Some(session);
                Ok(message)
            }
            Err(e) => {
                tracing::error!("Failed to load session {}: {}", key, e);
                Err(e)
            }
        }
    }

    async fn read_session(&self, key: &SessionKey) -> Result<Session> {
        let dir = key.relative_dir();

        let laps: Vec<Lap> = self.read_csv(&format!("{}/{}", dir, LAPS_FILE)).await?;
        let results: Vec<DriverResult> =
            self.read_csv(&format!("{}/{}", dir, RESULTS_FILE)).await?;
        let weather: Vec<WeatherSample> =
            self.read_optional_csv(&format!("{}/{}", dir, WEATHER_FILE)).await?;
        let samples: Vec<TelemetrySample> =
            self.read_optional_csv(&format!("{}/{}", dir, TELEMETRY_FILE)).await?;

        if laps.is_empty() {
            return Err(ApexError::MissingDataError {
                message: format!("no laps recorded for {}", key),
            });
        }

        let mut telemetry: HashMap<(String, u32), Vec<TelemetrySample>> = HashMap::new();
        for sample in samples {
            telemetry
                .entry((sample.driver.clone(), sample.lap_number))
                .or_default()
                .push(sample);
        }

        tracing::debug!(
            "Parsed {} laps, {} results, {} weather rows, {} telemetry laps",
            laps.len(),
            results.len(),
            weather.len(),
            telemetry.len()
        );

        Ok(Session {
            key: Some(key.clone()),
            laps: Laps::new(laps),
            results,
            weather,
            telemetry,
        })
    }

    async fn read_csv<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let data = self.storage.read_file(path).await?;
        let mut reader = csv::Reader::from_reader(data.as_slice());
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Weather and telemetry are not recorded for every session.
    async fn read_optional_csv<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        match self.read_csv(path).await {
            Err(ApexError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("{} not found, continuing without it", path);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// (abbreviation, full name) for every classified driver.
    pub fn driver_list(&self) -> Vec<(String, String)> {
        self.session
            .as_ref()
            .map(|s| {
                s.results
                    .iter()
                    .map(|r| (r.abbreviation.clone(), r.full_name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enriched telemetry of `lap_number`, or of the driver's fastest lap.
    pub fn clean_telemetry(&mut self, driver: &str, lap_number: Option<u32>) -> Option<CleanLap> {
        let cache_key = match lap_number {
            Some(n) => format!("{}_{}", driver, n),
            None => format!("{}_None", driver),
        };
        if let Some(hit) = self.telemetry_cache.get(&cache_key) {
            return Some(hit.clone());
        }

        match self.build_clean_lap(driver, lap_number) {
            Ok(clean) => {
                self.telemetry_cache.insert(cache_key, clean.clone());
                Some(clean)
            }
            Err(e) => {
                tracing::warn!("Telemetry fail for {}: {}", driver, e);
                None
            }
        }
    }

    fn build_clean_lap(&self, driver: &str, lap_number: Option<u32>) -> Result<CleanLap> {
        let session = self.session.as_ref().ok_or(ApexError::SessionNotLoaded)?;
        let laps = session.laps.pick_driver(driver);

        let lap = match lap_number {
            Some(n) => laps.iter().find(|l| l.lap_number == n),
            None => laps.pick_fastest(),
        }
        .cloned()
        .ok_or_else(|| ApexError::MissingDataError {
            message: format!("no matching lap for {}", driver),
        })?;

        let samples = session
            .lap_telemetry(driver, lap.lap_number)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApexError::MissingDataError {
                message: format!("no telemetry for {} lap {}", driver, lap.lap_number),
            })?;

        let mut trace = TelemetryTrace::from_samples(samples);
        enrich(&mut trace);
        Ok(CleanLap { trace, lap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn put(&self, path: &str, content: &str) {
            self.files
                .lock()
                .await
                .insert(path.to_string(), content.as_bytes().to_vec());
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ApexError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    const LAPS: &str = "\
Driver,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,Compound,TyreLife,Stint,PitInTime,PitOutTime,Time,Team
VER,1,91.5,28.0,35.0,28.5,SOFT,1,1,,,91.5,Red Bull Racing
VER,2,90.8,27.8,34.8,28.2,SOFT,2,1,,,182.3,Red Bull Racing
LEC,1,91.9,28.1,35.2,28.6,MEDIUM,1,1,,,91.9,Ferrari
";

    const RESULTS: &str = "\
Position,Abbreviation,FullName,TeamName,Time
1,VER,Max Verstappen,Red Bull Racing,182.3
2,LEC,Charles Leclerc,Ferrari,
";

    fn telemetry_csv() -> String {
        let mut out = String::from("Driver,LapNumber,Distance,Speed,Time,Throttle,Brake,X,Y,Z\n");
        for i in 0..20 {
            out.push_str(&format!(
                "VER,2,{},{},{},100,false,{},0,0\n",
                i * 10,
                200 + i,
                i as f64 * 0.18,
                i * 10
            ));
        }
        out
    }

    async fn seeded() -> MockStorage {
        let storage = MockStorage::default();
        storage.put("2024/Bahrain/R/laps.csv", LAPS).await;
        storage.put("2024/Bahrain/R/results.csv", RESULTS).await;
        storage
            .put("2024/Bahrain/R/telemetry.csv", &telemetry_csv())
            .await;
        storage
    }

    #[tokio::test]
    async fn test_load_session_and_driver_list() {
        let mut store = SessionStore::new(seeded().await);
        assert!(store.driver_list().is_empty());

        let message = store
            .load_session(&SessionKey::new(2024, "Bahrain", "R"))
            .await
            .unwrap();
        assert_eq!(message, "Session Loaded: Bahrain Grand Prix 2024 - R");

        let drivers = store.driver_list();
        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[1], ("LEC".to_string(), "Charles Leclerc".to_string()));

        let session = store.session().unwrap();
        assert!(session.weather.is_empty());
        assert_eq!(session.laps.len(), 3);
        assert_eq!(session.results[1].time, None);
    }

    #[tokio::test]
    async fn test_missing_session_is_an_error() {
        let mut store = SessionStore::new(seeded().await);
        let result = store.load_session(&SessionKey::new(2023, "Monaco", "Q")).await;
        assert!(result.is_err());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn test_clean_telemetry_defaults_to_fastest_lap() {
        let mut store = SessionStore::new(seeded().await);
        store
            .load_session(&SessionKey::new(2024, "Bahrain", "R"))
            .await
            .unwrap();

        let clean = store.clean_telemetry("VER", None).unwrap();
        assert_eq!(clean.lap.lap_number, 2);
        assert_eq!(clean.trace.len(), 20);
        // 1 km/h per 0.18 s: 1.543 m/s² forward
        let expected = 1.0 / 3.6 / 0.18 / 9.81;
        assert!((clean.trace.g_long[10] - expected).abs() < 1e-6);

        // Lap 1 has no telemetry; LEC has none either.
        assert!(store.clean_telemetry("VER", Some(1)).is_none());
        assert!(store.clean_telemetry("LEC", None).is_none());
        assert!(store.telemetry_cache.contains_key("VER_None"));
    }

    #[tokio::test]
    async fn test_reload_clears_cache() {
        let mut store = SessionStore::new(seeded().await);
        let key = SessionKey::new(2024, "Bahrain", "R");
        store.load_session(&key).await.unwrap();
        store.clean_telemetry("VER", Some(2)).unwrap();
        assert_eq!(store.telemetry_cache.len(), 1);

        store.load_session(&key).await.unwrap();
        assert!(store.telemetry_cache.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_weather_rows_fail() {
        let storage = seeded().await;
        storage
            .put("2024/Bahrain/R/weather.csv", "TrackTemp,AirTemp,Humidity,Rainfall\nhot,27.0,35.0,false\n")
            .await;
        let mut store = SessionStore::new(storage);
        let err = store
            .load_session(&SessionKey::new(2024, "Bahrain", "R"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApexError::CsvError(_)));
    }

    #[tokio::test]
    async fn test_from_session_serves_telemetry() {
        let mut loader = SessionStore::new(seeded().await);
        loader
            .load_session(&SessionKey::new(2024, "Bahrain", "R"))
            .await
            .unwrap();
        let session = loader.into_session().unwrap();

        let mut store = SessionStore::from_session(MockStorage::default(), session);
        assert_eq!(store.driver_list()[0].1, "Max Verstappen");
        assert_eq!(store.clean_telemetry("VER", None).unwrap().trace.len(), 20);
        assert_eq!(store.telemetry_cache.len(), 1);
    }

    #[test]
    fn test_clean_telemetry_without_session() {
        let mut store = SessionStore::new(MockStorage::default());
        assert!(store.clean_telemetry("VER", None).is_none());
    }
}
