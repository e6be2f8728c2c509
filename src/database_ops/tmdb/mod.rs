//! TMDB acquisition: catalog client, candidate collection, hand-off artifact and the
//! ingest driver that feeds the relational store.

pub mod client;
pub mod collector;
pub mod handoff;
pub mod ingest;
pub mod models;
pub mod stats;
pub mod strategy;

pub use client::{CatalogError, CatalogSource, TmdbClient};
pub use models::MovieId;
