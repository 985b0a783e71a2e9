use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use crate::{
    api,
    clients::{ArxivClient, ArxivClientConfig},
    config::Config,
    dashboard::Dashboard,
    observability::Telemetry,
    store::ArtifactLayout,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

/// 設定・テレメトリ・クライアントなど、各コマンドとサーバーが共有する依存。
pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    layout: ArtifactLayout,
    dashboard: Dashboard,
    arxiv_client: Arc<ArxivClient>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn dashboard(&self) -> &Dashboard {
        &self.registry.dashboard
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化する。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new().context("failed to initialise telemetry")?;
        let layout = ArtifactLayout::from_config(&config);
        let arxiv_client = Arc::new(
            ArxivClient::new(ArxivClientConfig::from_config(&config))
                .context("failed to build arXiv client")?,
        );

        Ok(Self {
            config,
            telemetry,
            dashboard: Dashboard::new(layout.clone()),
            layout,
            arxiv_client,
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    #[must_use]
    pub fn arxiv_client(&self) -> Arc<ArxivClient> {
        Arc::clone(&self.arxiv_client)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
