pub mod account;
pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod plan;
pub mod position;
pub mod req;
pub mod server;
pub mod settlement;
pub mod utils;
pub mod workflow;
