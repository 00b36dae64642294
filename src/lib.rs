//! Stocksignal: incremental OHLCV sync and multi-indicator signal fusion.

pub mod common;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod services;
pub mod signals;
