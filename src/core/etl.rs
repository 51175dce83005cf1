use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::PhaseMonitor;

/// Drives a pipeline through extract, transform and load.
pub struct DebriefEngine<P: Pipeline> {
    pipeline: P,
    monitor: PhaseMonitor,
}

impl<P: Pipeline> DebriefEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: PhaseMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting debrief...");
        self.monitor.log_phase("Start");

        tracing::info!("Loading session...");
        let session = self.pipeline.extract().await?;
        tracing::info!(
            "Loaded {} laps for {} drivers",
            session.laps.len(),
            session.classified_drivers().len()
        );
        self.monitor.log_phase("Extract");

        tracing::info!("Analysing session...");
        let bundle = self.pipeline.transform(session).await?;
        tracing::info!(
            "Debrief assembled ({} bytes of text)",
            bundle.debrief_text.len()
        );
        self.monitor.log_phase("Transform");

        tracing::info!("Writing bundle...");
        let output_path = self.pipeline.load(bundle).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_phase("Load");
        self.monitor.log_summary();

        Ok(output_path)
    }
}
