use std::sync::Arc;

use procura_db::SharedStore;
use procura_events::{EventBus, SharedChannel};
use procura_pipeline::{
    BufferedMailbox, DispatchCoordinator, EvaluationService, IntakeBridge, Lifecycle,
    OllamaCapability, ProposalService, RfpService, RuleCapability, StructuredExtractor,
    VendorService,
};

use crate::config::{ExtractorKind, PipelineConfig, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (every service holds `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: SharedStore,
    /// Centralized event bus for publishing procurement events.
    pub event_bus: Arc<EventBus>,
    /// Buffer that `POST /intake/messages` feeds and the intake bridge drains.
    pub mailbox: Arc<BufferedMailbox>,
    pub lifecycle: Lifecycle,
    pub vendors: VendorService,
    pub rfps: RfpService,
    pub proposals: ProposalService,
    pub evaluation: EvaluationService,
    pub dispatch: DispatchCoordinator,
    pub intake: IntakeBridge,
}

impl AppState {
    /// Wire every pipeline service against one store, bus and channel.
    pub fn new(
        config: ServerConfig,
        pipeline: &PipelineConfig,
        store: SharedStore,
        event_bus: Arc<EventBus>,
        extractor: StructuredExtractor,
        channel: SharedChannel,
    ) -> Self {
        let lifecycle = Lifecycle::new(store.clone(), Arc::clone(&event_bus));
        let mailbox = Arc::new(BufferedMailbox::new());

        let proposals = ProposalService::new(
            lifecycle.clone(),
            extractor.clone(),
            pipeline.extraction_timeout,
        );
        let mut intake = IntakeBridge::new(lifecycle.clone(), mailbox.clone());
        if pipeline.auto_parse {
            intake = intake.with_auto_parse(proposals.clone());
        }

        Self {
            config: Arc::new(config),
            vendors: VendorService::new(store.clone()),
            rfps: RfpService::new(lifecycle.clone(), extractor, pipeline.extraction_timeout),
            evaluation: EvaluationService::new(lifecycle.clone(), pipeline.evaluation_timeout),
            dispatch: DispatchCoordinator::new(lifecycle.clone(), channel),
            lifecycle,
            proposals,
            intake,
            mailbox,
            store,
            event_bus,
        }
    }
}

/// The Structured Extractor for the configured capability. Ollama output is
/// backed by the rule extractor for any field the model leaves out.
pub fn build_extractor(pipeline: &PipelineConfig) -> StructuredExtractor {
    let rules = Arc::new(RuleCapability::new());
    match pipeline.extractor {
        ExtractorKind::Rules => StructuredExtractor::new(rules),
        ExtractorKind::Ollama => StructuredExtractor::new(Arc::new(OllamaCapability::new(
            pipeline.ollama_url.clone(),
            pipeline.ollama_model.clone(),
        )))
        .with_fallback(rules),
    }
}
