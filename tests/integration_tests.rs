use apexbrain::{DebriefEngine, DebriefPipeline, LocalStorage, TomlConfig};
use std::f64::consts::PI;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const LAPS: &str = "\
Driver,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,Compound,TyreLife,Stint,PitInTime,PitOutTime,Time,Team
VER,1,95.2,30.1,35.0,30.1,MEDIUM,1,1,,,95.2,Red Bull Racing
VER,2,93.9,29.7,34.6,29.6,MEDIUM,2,1,,,189.1,Red Bull Racing
VER,3,94.1,29.8,34.7,29.6,MEDIUM,3,1,,,283.2,Red Bull Racing
LEC,1,95.6,30.2,35.2,30.2,MEDIUM,1,1,,,95.6,Ferrari
LEC,2,94.3,29.8,34.8,29.7,MEDIUM,2,1,,,189.9,Ferrari
LEC,3,94.6,29.9,34.9,29.8,MEDIUM,3,1,,,284.5,Ferrari
";

const RESULTS: &str = "\
Position,Abbreviation,FullName,TeamName,Time
1,VER,Max Verstappen,Red Bull Racing,283.2
2,LEC,Charles Leclerc,Ferrari,284.5
";

const WEATHER: &str = "\
TrackTemp,AirTemp,Humidity,Rainfall
42.5,27.0,35.0,false
";

/// A 5 km lap with four slow corners, 5 m between samples.
fn telemetry_lap(driver: &str, pace: f64, out: &mut String) {
    let mut time = 0.0;
    for i in 0..1000 {
        let d = i as f64 * 5.0;
        let speed = pace * (200.0 + 60.0 * (2.0 * PI * d / 1250.0).cos());
        if i > 0 {
            time += 5.0 / (speed / 3.6);
        }
        let angle = 2.0 * PI * d / 5000.0;
        out.push_str(&format!(
            "{},2,{},{:.3},{:.4},100,false,{:.2},{:.2},0\n",
            driver,
            d,
            speed,
            time,
            800.0 * angle.cos(),
            800.0 * angle.sin()
        ));
    }
}

fn write_session(cache: &Path) {
    let dir = cache.join("2024/Bahrain/R");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("laps.csv"), LAPS).unwrap();
    std::fs::write(dir.join("results.csv"), RESULTS).unwrap();
    std::fs::write(dir.join("weather.csv"), WEATHER).unwrap();

    let mut telemetry = String::from("Driver,LapNumber,Distance,Speed,Time,Throttle,Brake,X,Y,Z\n");
    telemetry_lap("VER", 1.0, &mut telemetry);
    telemetry_lap("LEC", 0.98, &mut telemetry);
    std::fs::write(dir.join("telemetry.csv"), telemetry).unwrap();
}

fn read_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_debrief() {
    let cache_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    write_session(cache_dir.path());

    let mut config = TomlConfig::default();
    config.session.cache_dir = cache_dir.path().to_str().unwrap().to_string();
    config.session.output_path = output_dir.path().to_str().unwrap().to_string();
    config.simulation.candidates = 300;
    config.simulation.seed = Some(1);

    let cache = LocalStorage::new(cache_dir.path());
    let output = LocalStorage::new(output_dir.path());
    let pipeline = DebriefPipeline::new(cache, output, config);
    let engine = DebriefEngine::new_with_monitoring(pipeline, false);

    let output_path = engine.run().await.unwrap();
    assert!(output_path.ends_with("debrief.zip"));

    let full_path = output_dir.path().join("debrief.zip");
    assert!(full_path.exists());

    let zip_data = std::fs::read(&full_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let file_names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    for expected in ["corners.csv", "stints.csv", "strategies.json", "summary.json", "debrief.txt"] {
        assert!(file_names.contains(&expected.to_string()), "missing {}", expected);
    }

    // Four apexes per lap, all aligned, VER quicker through each.
    let corners = read_entry(&mut archive, "corners.csv");
    let rows: Vec<&str> = corners.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].starts_with("T1,625"));
    assert!(rows.iter().all(|r| !r.ends_with(",0") && !r.contains(",-")));

    let stints = read_entry(&mut archive, "stints.csv");
    assert!(stints.contains("VER,1,MEDIUM,3,1,3,"));

    let summary: serde_json::Value =
        serde_json::from_str(&read_entry(&mut archive, "summary.json")).unwrap();
    assert_eq!(summary["event"], "Bahrain Grand Prix 2024");
    assert_eq!(summary["fastest_lap"]["driver"], "VER");
    assert!(summary["insights"]["battle"]
        .as_str()
        .unwrap()
        .starts_with("VER controls"));
    assert!(summary["insights"]["strategy"]
        .as_str()
        .unwrap()
        .contains("High Deg Warning"));

    let strategies: serde_json::Value =
        serde_json::from_str(&read_entry(&mut archive, "strategies.json")).unwrap();
    let ranked = strategies["strategies"].as_array().unwrap();
    assert!(!ranked.is_empty() && ranked.len() <= 5);
    let scores: Vec<f64> = ranked
        .iter()
        .map(|s| s["utility_score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));

    let debrief = read_entry(&mut archive, "debrief.txt");
    assert!(debrief.starts_with("APEXBRAIN | POST-SESSION DEBRIEF"));
    assert!(debrief.contains("WINNER: VER (Red Bull Racing)"));
    assert!(debrief.contains("FASTEST LAP: VER - 1:33.900"));
}

#[tokio::test]
async fn test_debrief_missing_session_fails_without_output() {
    let cache_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let mut config = TomlConfig::default();
    config.session.output_path = output_dir.path().to_str().unwrap().to_string();

    let pipeline = DebriefPipeline::new(
        LocalStorage::new(cache_dir.path()),
        LocalStorage::new(output_dir.path()),
        config,
    );
    let err = DebriefEngine::new(pipeline).run().await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(!output_dir.path().join("debrief.zip").exists());
}
