//! Coordinator boundary adapters.

pub mod client;

pub use client::HttpCoordinator;
