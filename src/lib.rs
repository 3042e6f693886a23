pub mod aggregation;
pub mod api;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod db;
pub mod frame;
pub mod retention;
pub mod scheduler;
