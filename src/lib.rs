pub mod cache;
pub mod config;
pub mod content;
pub mod driver;
pub mod economy;
pub mod engine;
pub mod hex;
pub mod hooks;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod systems;
pub mod tech;
pub mod telemetry;
pub mod tick;
pub mod world;

pub use config::Config;
pub use content::{load_content, Content, ContentSource};
pub use engine::{Engine, EngineBuilder, EngineSettings, TickSummary};
pub use world::GameState;
