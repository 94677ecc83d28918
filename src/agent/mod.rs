pub mod detector;
pub mod engine;
pub mod restart;
pub mod scheduler;
pub mod settings;
pub mod startup;

// Re-export commonly used items
pub use detector::{ImageCheck, ImageStatus, UpdateDetector};
pub use engine::{CycleResult, Engine, EngineStats};
pub use restart::{RestartOrchestrator, RestartReport, RestartedService, StoppedContainer};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use settings::{load_settings, Settings};
pub use startup::EngineBuilder;
