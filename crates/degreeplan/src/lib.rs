pub mod config;
pub mod db;
pub mod evaluation;
pub mod logging;
