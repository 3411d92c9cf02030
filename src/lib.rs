pub mod chart;
pub mod config;
pub mod deciles;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod table;
pub mod utility;
