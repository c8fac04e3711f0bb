pub mod api;
pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod mail;
pub mod scheduler;

pub use self::config::Config;
