// src/config/mod.rs
pub mod app;

pub use app::{AppConfig, AuthConfig, StoreConfig, ENV_CONFIG_PATH};
