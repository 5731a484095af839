pub mod config;
pub mod dataset;
pub mod network;
pub mod training;
pub mod types;

pub use config::*;
pub use dataset::*;
pub use network::*;
pub use training::*;
pub use types::*;
