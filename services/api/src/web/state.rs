//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::auth::TokenService;
use crate::config::Config;
use crate::report::{ReportScheduler, ReportWorkflow};
use mindi_core::ports::{CareAssistantService, DatabaseService, TextToSpeechService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub care_ai: Arc<dyn CareAssistantService>,
    pub reports: Arc<ReportWorkflow>,
    pub scheduler: Arc<ReportScheduler>,
}
