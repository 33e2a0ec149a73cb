//! Application configuration model

pub mod config;

pub use self::config::Configuration;
