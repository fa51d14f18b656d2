pub mod analysis_cache;
pub mod recommendation;
pub mod scheduler;
pub mod signals;
pub mod symbol_directory;

pub use analysis_cache::AnalysisCache;
pub use recommendation::{EventQuery, GatingPolicy, RecommendationStore};
pub use scheduler::{CycleReport, PollingScheduler, SchedulerSettings, SchedulerState};
pub use symbol_directory::SymbolDirectory;
