pub mod collaborative;
pub mod content;
pub mod cultural;
pub mod engine;
pub mod fallback;
pub mod filters;
pub mod fusion;
pub mod profiles;
pub mod registry;
pub mod similarity;
pub mod text;
pub mod training;
pub mod trending;

pub use collaborative::{CollaborativeModel, CollaborativeOutcome};
pub use content::ContentModel;
pub use cultural::{CulturalModel, MarketFactors};
pub use engine::{RecommendationEngine, Recommendations};
pub use fusion::SignalWeights;
pub use profiles::ProfileService;
pub use registry::{ModelRegistry, ModelSet};
pub use training::{Trainer, TrainingReport};
