//! Backforge Core: domain types, bar sources, strategies, execution costs and
//! the market simulator.
//!
//! This crate contains the single-run half of the backtester:
//! - Domain types (bars, orders, trades, positions, portfolio, signals)
//! - Bar sources (in-memory, CSV)
//! - Strategy trait, parameter values and the strategy registry
//! - Execution cost models (slippage, commission, liquidity, partial fills)
//! - Bar-by-bar market simulator with order audit trail and diagnostics
//! - Deterministic RNG hierarchy

pub mod data;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod rng;
pub mod strategy;

pub use engine::{MarketSimulator, SimulationConfig, SimulationError, SimulationOutput};
pub use strategy::{ParamSet, ParamValue, Strategy, StrategyRegistry};
