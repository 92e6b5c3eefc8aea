//! Core domain types and simulation logic.

pub mod backtest;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod series;
pub mod signal;
pub mod sweep;
pub mod universe;
