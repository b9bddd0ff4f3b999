pub mod feedback;
pub mod language_model;
pub mod token_estimator;
pub mod version_control;

pub use feedback::{FeedbackSink, MergeProgress};
pub use language_model::LanguageModelService;
pub use token_estimator::TokenEstimator;
pub use version_control::{ChangeScope, VersionControlService};
