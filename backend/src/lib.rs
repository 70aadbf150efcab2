//! # ChickERP Backend
//!
//! Record keeping for a small poultry farm: the flock with its pedigree and
//! breed composition, coops, egg production and incubation, feed stock and
//! usage, bird health, and an ad-hoc report builder over birds, eggs and
//! health incidents.
//!
//! ## Architecture
//!
//! - [`api`]: identifier types and the public type surface
//! - [`models`]: domain entities, request payloads and validation
//! - [`reports`]: column registry, query planning, summaries and CSV export
//! - [`db`]: repository traits, the Postgres and in-memory backends, and the
//!   service layer holding the business rules
//! - [`http`]: Axum REST server (feature `http-server`)

// RepositoryError carries rich context for diagnostics.
#![allow(clippy::result_large_err)]

pub mod api;
pub mod db;
pub mod models;
pub mod reports;

#[cfg(feature = "http-server")]
pub mod http;
