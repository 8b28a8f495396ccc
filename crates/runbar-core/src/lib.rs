pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod jsonc;
pub mod manifest;
pub mod menu;
pub mod normalize;
pub mod storage_paths;
pub mod surface;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::*;
pub use catalog::*;
pub use config::*;
pub use error::*;
pub use event_bus::*;
pub use manifest::*;
pub use menu::*;
pub use normalize::*;
pub use storage_paths::*;
pub use surface::*;
pub use tracker::*;
