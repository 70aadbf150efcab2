//! HTTP server module for the ChickERP backend.
//!
//! An axum REST API over the service layer. Identity comes from the
//! `x-user-id` / `x-user-role` headers set by a trusted upstream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Identity and role checks                               │
//! │  - JSON serialization/deserialization                     │
//! │  - Request id, CORS, compression, error mapping           │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (db::services)                             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db::repositories)                      │
//! │  - LocalRepository / PostgresRepository                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use extract::{CurrentUser, USER_ID_HEADER, USER_ROLE_HEADER};
pub use router::{create_router, REQUEST_ID_HEADER};
pub use state::AppState;
