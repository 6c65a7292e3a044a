pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod feed;
pub mod models;
pub mod points;
pub mod storage;
