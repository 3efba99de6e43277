pub mod ai;
pub mod api;
pub mod billing;
pub mod config;
pub mod db;
pub mod error;
