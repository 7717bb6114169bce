//! Sitesmith - AI-assisted multi-page website builder

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod session;
