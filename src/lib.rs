pub mod collab;
pub mod config;
pub mod core;
pub mod crawler;
pub mod db;
pub mod error;
pub mod scoring;
