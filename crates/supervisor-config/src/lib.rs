pub mod constants;
pub mod env;
pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    ClusterSettings, LocalSettings, StateStorage, StateStorageKind, SupervisorConfig,
    WorkerEnvironment,
};
