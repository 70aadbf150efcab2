//! Repository trait definitions for persistence.
//!
//! Responsibilities are split across focused traits so each storage
//! backend implements them one concern at a time:
//!
//! - [`error`]: Error types for repository operations
//! - [`bird`]: Birds, identifiers, composition, weights
//! - [`catalog`]: Breeds and coops
//! - [`egg`]: Egg and incubation records
//! - [`feed`]: Feed inventory and consumption
//! - [`health`]: Incidents, vaccinations, medications
//! - [`report`]: Report execution and saved presets
//!
//! # Convenience Trait Bound
//!
//! For code that needs every capability, use [`FullRepository`]:
//!
//! ```ignore
//! async fn coop_report<R: FullRepository + ?Sized>(repo: &R, id: CoopId) -> RepositoryResult<()> {
//!     let coop = repo.get_coop(id).await?;
//!     let filter = BirdFilter { coop_id: Some(id), ..Default::default() };
//!     let birds = repo.list_birds(&filter, ListParams::default()).await?;

//!     Ok(())
//! }
//! ```

pub mod bird;
pub mod catalog;
pub mod egg;
pub mod error;
pub mod feed;
pub mod health;
pub mod report;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use bird::BirdRepository;
pub use catalog::CatalogRepository;
pub use egg::EggRepository;
pub use feed::FeedRepository;
pub use health::HealthRepository;
pub use report::{PresetRepository, ReportRepository};

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type implementing every repository
/// trait.
pub trait FullRepository:
    BirdRepository
    + CatalogRepository
    + EggRepository
    + FeedRepository
    + HealthRepository
    + ReportRepository
    + PresetRepository
{
}

impl<T> FullRepository for T where
    T: BirdRepository
        + CatalogRepository
        + EggRepository
        + FeedRepository
        + HealthRepository
        + ReportRepository
        + PresetRepository
{
}
