pub mod command;
pub mod config;
pub mod dispatch;
pub mod export;
pub mod filter;
pub mod grid;
pub mod logging;
pub mod models;
pub mod network;
pub mod outcome;
pub mod render;
