pub mod clock;
pub mod command;
pub mod config;
pub mod display;
pub mod errors;
pub mod quantile;
pub mod runner;
pub mod types;
