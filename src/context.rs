use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{FeedbackSink, LanguageModelService, TokenEstimator, VersionControlService};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub version_control: Arc<dyn VersionControlService>,
    pub language_model: Arc<dyn LanguageModelService>,
    pub token_estimator: Arc<dyn TokenEstimator>,
    /// Budget of the model that receives chunks and filter requests.
    pub map_token_estimator: Arc<dyn TokenEstimator>,
    pub feedback: Arc<dyn FeedbackSink>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        version_control: Arc<dyn VersionControlService>,
        language_model: Arc<dyn LanguageModelService>,
        token_estimator: Arc<dyn TokenEstimator>,
        map_token_estimator: Arc<dyn TokenEstimator>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            config,
            version_control,
            language_model,
            token_estimator,
            map_token_estimator,
            feedback,
        }
    }
}
