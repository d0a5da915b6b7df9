pub mod capture_config;

pub use capture_config::*;
