use crate::domain::model::{DebriefBundle, Session, SessionKey};
use crate::strategy::mcda::Scenario;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Settings a debrief run needs, whichever front-end supplied them.
pub trait ConfigProvider: Send + Sync {
    fn session_key(&self) -> SessionKey;
    fn output_path(&self) -> &str;
    /// Reference and target driver for the head-to-head section.
    fn focus_drivers(&self) -> Option<(&str, &str)>;
    fn scenario(&self) -> Scenario;
    /// Random plans sampled by the decision engine.
    fn strategy_candidates(&self) -> usize;
    fn seed(&self) -> Option<u64>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Session>;
    async fn transform(&self, session: Session) -> Result<DebriefBundle>;
    async fn load(&self, bundle: DebriefBundle) -> Result<String>;
}
