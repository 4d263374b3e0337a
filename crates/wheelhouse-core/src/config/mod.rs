pub mod context;
mod settings;

pub(crate) use settings::EnvSnapshot;
pub use settings::{CacheConfig, Config, HostConfig, NetworkConfig, UploadConfig};
