//! Pemuda Magelang - community content management
//!
//! Talents, communities, the gerak/detak/dampak article channels, products
//! and the Zhub directory, served as a JSON API plus server-rendered pages.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
