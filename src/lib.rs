//! stratsim: trading strategy backtester and paced simulation engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and paced sessions in
//! [`simulation`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod simulation;
pub mod cli;
