pub mod buffer;
pub mod decode;
pub mod dynamics;
pub mod fetch;
pub mod graph;
pub mod loader;
pub mod output;
pub mod spatial;
pub mod synth;

pub use buffer::AudioBuffer;
pub use decode::{AudioDecoder, SymphoniaDecoder};
pub use dynamics::{Limiter, LimiterSettings};
pub use fetch::{fetcher_for, AssetFetcher, FileFetcher, HttpFetcher};
pub use graph::{Bus, GraphSettings, SharedGraph, SpatialGraph};
pub use loader::BufferLoader;
pub use output::AudioOutput;
pub use spatial::{BinauralPanner, DistanceModel, EqualPowerPanner, StereoGains};
pub use synth::{AmbientBed, DroneSpec};
