//! Morning Dashboard - A personal news dashboard backend
//!
//! This crate relays RSS and Atom feeds for the dashboard view, normalizing
//! them into a single JSON article shape, and serves the configured feed list.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod routes;
pub mod xml;
