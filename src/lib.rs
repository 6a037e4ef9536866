// Reportage: binaural interview playback
// Expose public modules for use in integration tests

pub mod app;
pub mod audio;
pub mod engine;
pub mod error;
pub mod scene;
pub mod ui;

// Re-export commonly used types for convenience
pub use app::catalog::Catalog;
pub use app::config::{ConfigManager, EngineConfig};
pub use app::session::Session;
pub use app::App;
pub use audio::{AudioBuffer, BufferLoader, Bus, SpatialGraph};
pub use engine::{Engine, EngineEvent, EngineHandle, EngineOptions, EngineSnapshot, PlaybackState};
pub use error::{Error, Result};
pub use scene::{ListenerPose, Position, Scene, Segment, Speaker};
