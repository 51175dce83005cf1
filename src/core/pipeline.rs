use crate::analytics::corners::{align_corners, detect_corners, AlignedCorner};
use crate::analytics::driver::{compare_radar, overtake_probability};
use crate::analytics::session::{
    analyze_stints, consistency_score, gap_to_pole, ideal_lap, pit_rejoin, setup_traits,
    tyre_strategy_map, DEFAULT_PIT_LOSS,
};
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{Compound, DebriefBundle, Session};
use crate::insight::{battle_insight, strategy_insight, telemetry_insight};
use crate::physics::battle::calculate_delta;
use crate::report::{format_lap_time, generate_debrief};
use crate::results::{fastest_lap, results_table};
use crate::session::SessionStore;
use crate::strategy::mcda::{DecisionEngine, Scenario};
use crate::strategy::solver::{ExhaustiveSolver, RaceConditions};
use crate::utils::error::{ApexError, Result};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const BUNDLE_FILE: &str = "debrief.zip";

const CORNER_HEADER: [&str; 5] = ["corner", "distance", "driver1_speed", "driver2_speed", "apex_delta"];
const STINT_HEADER: [&str; 8] = [
    "driver",
    "stint_id",
    "compound",
    "laps_count",
    "start_lap",
    "end_lap",
    "avg_pace",
    "degradation",
];

#[derive(Debug, Serialize)]
struct StintRow<'a> {
    driver: &'a str,
    stint_id: u32,
    compound: Option<Compound>,
    laps_count: usize,
    start_lap: u32,
    end_lap: u32,
    avg_pace: f64,
    degradation: f64,
}

/// Reads one cached session and writes its debrief bundle.
pub struct DebriefPipeline<S: Storage + Clone, C: ConfigProvider> {
    pub(crate) cache: S,
    pub(crate) output: S,
    pub(crate) config: C,
}

impl<S: Storage + Clone, C: ConfigProvider> DebriefPipeline<S, C> {
    pub fn new(cache: S, output: S, config: C) -> Self {
        Self {
            cache,
            output,
            config,
        }
    }

    /// Configured pair, otherwise the top two finishers.
    fn focus_pair(&self, session: &Session) -> Result<(String, String)> {
        if let Some((d1, d2)) = self.config.focus_drivers() {
            return Ok((d1.to_string(), d2.to_string()));
        }
        match session.classified_drivers().as_slice() {
            [d1, d2, ..] => Ok((d1.to_string(), d2.to_string())),
            drivers => Err(ApexError::InsufficientData {
                required: 2,
                available: drivers.len(),
            }),
        }
    }
}

fn full_name(drivers: &[(String, String)], abbreviation: &str) -> String {
    drivers
        .iter()
        .find(|(abbr, _)| abbr == abbreviation)
        .map(|(_, name)| name.clone())
        .unwrap_or_else(|| abbreviation.to_string())
}

fn race_conditions(scenario: &Scenario) -> RaceConditions {
    RaceConditions {
        total_laps: scenario.circuit.n_laps,
        pit_cost: scenario.circuit.pit_loss,
        fuel_effect: scenario.car.fuel_effect_s_kg,
        base_time: scenario.circuit.base_lap_time,
        grid_pos: scenario.env.grid_position,
        require_compound_change: true,
    }
}

fn corners_csv(corners: &[AlignedCorner]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CORNER_HEADER)?;
    for corner in corners {
        writer.serialize(corner)?;
    }
    into_string(writer)
}

fn stints_csv(session: &Session) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(STINT_HEADER)?;
    for driver in session.classified_drivers() {
        for stint in analyze_stints(session, driver) {
            writer.serialize(StintRow {
                driver,
                stint_id: stint.stint_id,
                compound: stint.compound,
                laps_count: stint.laps_count,
                start_lap: stint.start_lap,
                end_lap: stint.end_lap,
                avg_pace: stint.avg_pace,
                degradation: stint.degradation,
            })?;
        }
    }
    into_string(writer)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| ApexError::ProcessingError {
        message: format!("CSV flush failed: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| ApexError::ProcessingError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

#[async_trait::async_trait]
impl<S: Storage + Clone, C: ConfigProvider> Pipeline for DebriefPipeline<S, C> {
    async fn extract(&self) -> Result<Session> {
        let key = self.config.session_key();
        let mut store = SessionStore::new(self.cache.clone());
        let message = store.load_session(&key).await?;
        tracing::info!("{}", message);
        store.into_session().ok_or(ApexError::SessionNotLoaded)
    }

    async fn transform(&self, session: Session) -> Result<DebriefBundle> {
        let (d1, d2) = self.focus_pair(&session)?;

        let mut store = SessionStore::from_session(self.cache.clone(), session);
        let drivers = store.driver_list();
        let focus_names = [full_name(&drivers, &d1), full_name(&drivers, &d2)];
        tracing::debug!("Head-to-head: {} vs {}", focus_names[0], focus_names[1]);

        let t1 = store.clean_telemetry(&d1, None).map(|c| c.trace);
        let t2 = store.clean_telemetry(&d2, None).map(|c| c.trace);
        let session = store.into_session().ok_or(ApexError::SessionNotLoaded)?;
        if t1.is_none() || t2.is_none() {
            tracing::warn!("Telemetry missing for {} or {}, skipping corner analysis", d1, d2);
        }

        let corners = match (&t1, &t2) {
            (Some(a), Some(b)) => align_corners(&detect_corners(a), &detect_corners(b)),
            _ => Vec::new(),
        };

        // Negative wherever d1 is ahead.
        let gap_trace: Vec<f64> = match (&t1, &t2) {
            (Some(a), Some(b)) => calculate_delta(a, b)?.iter().map(|p| -p.delta).collect(),
            _ => Vec::new(),
        };

        let lap_time = |driver: &str| session.laps.pick_driver(driver).best_lap_time();
        let telemetry_text = match (lap_time(&d1), lap_time(&d2)) {
            (Some(a), Some(b)) => Some(telemetry_insight(&d1, &d2, a, b, &corners)),
            _ => None,
        };
        let battle_text = battle_insight(&d1, &d2, &gap_trace);
        let strategy_text = match session.weather.first() {
            Some(w) => strategy_insight(w),
            None => "Weather not recorded. Standard degradation models apply.".to_string(),
        };

        let scenario = self.config.scenario();
        let baseline = ExhaustiveSolver::new().find_optimal_strategy(&race_conditions(&scenario))?;
        let mut engine = match self.config.seed() {
            Some(seed) => DecisionEngine::with_seed(scenario, seed),
            None => DecisionEngine::new(scenario),
        };
        let weights = engine.dynamic_weights();
        let strategies = engine.generate_optimal_strategies(self.config.strategy_candidates())?;

        let head_to_head = match (&t1, &t2) {
            (Some(a), Some(b)) => {
                let (r1, r2) = compare_radar(a, b);
                Some(serde_json::json!({
                    "radar": { d1.as_str(): r1, d2.as_str(): r2 },
                    "overtake": overtake_probability(b, a),
                }))
            }
            _ => None,
        };

        let fastest = fastest_lap(&session);
        let summary = serde_json::json!({
            "event": session.event_name(),
            "session": session.session_name(),
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "focus_drivers": [d1, d2],
            "focus_names": focus_names,
            "fastest_lap": fastest.as_ref().map(|l| serde_json::json!({
                "driver": l.driver,
                "lap_number": l.lap_number,
                "lap_time": l.lap_time.map(format_lap_time),
            })),
            "consistency": {
                d1.as_str(): consistency_score(&session.laps.pick_driver(&d1)),
                d2.as_str(): consistency_score(&session.laps.pick_driver(&d2)),
            },
            "ideal_laps": [ideal_lap(&session, &d1), ideal_lap(&session, &d2)],
            "head_to_head": head_to_head,
            "results": results_table(&session.results),
            "gap_to_pole": gap_to_pole(&session.results),
            "setup_traits": setup_traits(&session),
            "tyre_strategy": tyre_strategy_map(&session),
            "pit_rejoin": pit_rejoin(&session, &d1, DEFAULT_PIT_LOSS),
            "insights": {
                "telemetry": telemetry_text,
                "battle": battle_text,
                "strategy": strategy_text,
            },
        });

        let bundle = DebriefBundle {
            corners_csv: corners_csv(&corners)?,
            stints_csv: stints_csv(&session)?,
            strategies_json: serde_json::to_string_pretty(&serde_json::json!({
                "weights": weights,
                "strategies": strategies,
                "baseline": baseline,
            }))?,
            summary_json: serde_json::to_string_pretty(&summary)?,
            debrief_text: generate_debrief(&session, &d1, &d2, &strategy_text, &battle_text),
        };

        tracing::debug!(
            "{} aligned corners, {} ranked strategies",
            corners.len(),
            strategies.len()
        );
        Ok(bundle)
    }

    async fn load(&self, bundle: DebriefBundle) -> Result<String> {
        let output_path = format!("{}/{}", self.config.output_path(), BUNDLE_FILE);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            let entries = [
                ("corners.csv", &bundle.corners_csv),
                ("stints.csv", &bundle.stints_csv),
                ("strategies.json", &bundle.strategies_json),
                ("summary.json", &bundle.summary_json),
                ("debrief.txt", &bundle.debrief_text),
            ];
            for (name, content) in entries {
                zip.start_file::<_, ()>(name, FileOptions::default())?;
                zip.write_all(content.as_bytes())?;
            }
            zip.finish()?.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.output.write_file(BUNDLE_FILE, &zip_data).await?;
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SessionKey;
    use crate::strategy::mcda::Scenario;
    use std::collections::HashMap;
    use std::io::Read;
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

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.get_file(path).await.ok_or_else(|| {
                ApexError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        drivers: Option<(String, String)>,
    }

    impl ConfigProvider for MockConfig {
        fn session_key(&self) -> SessionKey {
            SessionKey::new(2024, "Bahrain", "R")
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn focus_drivers(&self) -> Option<(&str, &str)> {
            self.drivers.as_ref().map(|(a, b)| (a.as_str(), b.as_str()))
        }

        fn scenario(&self) -> Scenario {
            Scenario::default()
        }

        fn strategy_candidates(&self) -> usize {
            200
        }

        fn seed(&self) -> Option<u64> {
            Some(3)
        }
    }

    const LAPS: &str = "\
Driver,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,Compound,TyreLife,Stint,PitInTime,PitOutTime,Time,Team
VER,1,95.0,30.0,35.0,30.0,SOFT,1,1,,,95.0,Red Bull Racing
VER,2,94.0,29.8,34.8,29.4,SOFT,2,1,,,189.0,Red Bull Racing
VER,3,94.2,29.9,34.9,29.4,SOFT,3,1,,,283.2,Red Bull Racing
VER,4,94.5,30.0,35.0,29.5,SOFT,4,1,,,377.7,Red Bull Racing
LEC,1,95.4,30.1,35.2,30.1,MEDIUM,1,1,,,95.4,Ferrari
LEC,2,94.6,29.9,35.0,29.7,MEDIUM,2,1,,,190.0,Ferrari
LEC,3,94.7,29.9,35.0,29.8,MEDIUM,3,1,,,284.7,Ferrari
";

    const RESULTS: &str = "\
Position,Abbreviation,FullName,TeamName,Time
1,VER,Max Verstappen,Red Bull Racing,377.7
2,LEC,Charles Leclerc,Ferrari,380.1
";

    async fn seeded_cache() -> MockStorage {
        let cache = MockStorage::default();
        cache.put("2024/Bahrain/R/laps.csv", LAPS).await;
        cache.put("2024/Bahrain/R/results.csv", RESULTS).await;
        cache
    }

    #[tokio::test]
    async fn test_extract_loads_session() {
        let pipeline = DebriefPipeline::new(
            seeded_cache().await,
            MockStorage::default(),
            MockConfig { drivers: None },
        );
        let session = pipeline.extract().await.unwrap();
        assert_eq!(session.laps.len(), 7);
        assert_eq!(session.classified_drivers(), vec!["VER", "LEC"]);
        assert!(session.weather.is_empty());
    }

    #[tokio::test]
    async fn test_extract_missing_session_fails() {
        let pipeline = DebriefPipeline::new(
            MockStorage::default(),
            MockStorage::default(),
            MockConfig { drivers: None },
        );
        assert!(pipeline.extract().await.is_err());
    }

    #[tokio::test]
    async fn test_transform_without_telemetry() {
        let pipeline = DebriefPipeline::new(
            seeded_cache().await,
            MockStorage::default(),
            MockConfig { drivers: None },
        );
        let session = pipeline.extract().await.unwrap();
        let bundle = pipeline.transform(session).await.unwrap();

        assert_eq!(bundle.corners_csv.trim(), CORNER_HEADER.join(","));
        assert!(bundle.stints_csv.starts_with("driver,stint_id,compound"));
        assert!(bundle.stints_csv.contains("VER,1,SOFT,4,1,4,"));
        assert!(bundle.stints_csv.contains("LEC,1,MEDIUM,3,1,3,"));
        assert!(bundle.debrief_text.contains("HEAD-TO-HEAD: VER vs LEC"));

        let summary: serde_json::Value = serde_json::from_str(&bundle.summary_json).unwrap();
        assert_eq!(summary["focus_drivers"][0], "VER");
        assert_eq!(summary["focus_names"][1], "Charles Leclerc");
        assert_eq!(summary["fastest_lap"]["lap_time"], "1:34.000");
        assert!(summary["insights"]["telemetry"]
            .as_str()
            .unwrap()
            .starts_with("VER is currently faster by 0.600s."));

        let strategies: serde_json::Value = serde_json::from_str(&bundle.strategies_json).unwrap();
        assert!(!strategies["strategies"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transform_needs_two_drivers() {
        let cache = MockStorage::default();
        cache.put("2024/Bahrain/R/laps.csv", LAPS).await;
        cache
            .put(
                "2024/Bahrain/R/results.csv",
                "Position,Abbreviation,FullName,TeamName,Time\n1,VER,Max Verstappen,Red Bull Racing,377.7\n",
            )
            .await;
        let pipeline = DebriefPipeline::new(cache, MockStorage::default(), MockConfig { drivers: None });
        let session = pipeline.extract().await.unwrap();

        let err = pipeline.transform(session).await.unwrap_err();
        assert!(matches!(err, ApexError::InsufficientData { required: 2, available: 1 }));
    }

    #[tokio::test]
    async fn test_load_writes_bundle() {
        let output = MockStorage::default();
        let pipeline = DebriefPipeline::new(
            MockStorage::default(),
            output.clone(),
            MockConfig {
                drivers: Some(("VER".to_string(), "LEC".to_string())),
            },
        );
        let bundle = DebriefBundle {
            corners_csv: "corner\n".to_string(),
            stints_csv: "driver\n".to_string(),
            strategies_json: "{}".to_string(),
            summary_json: "{}".to_string(),
            debrief_text: "APEXBRAIN".to_string(),
        };

        let path = pipeline.load(bundle).await.unwrap();
        assert_eq!(path, "test_output/debrief.zip");

        let zip_bytes = output.get_file(BUNDLE_FILE).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 5);

        let mut text = String::new();
        archive
            .by_name("debrief.txt")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "APEXBRAIN");
    }
}
