pub mod config;
pub mod db;
pub mod error;
pub mod redis_pool;
pub mod registry;
pub mod timeutil;
pub mod types;
