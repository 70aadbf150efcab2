//! Domain model: farm entities, their inputs and validation rules.

pub mod bird;
pub mod breed_composition;
pub mod catalog;
pub mod common;
pub mod egg;
pub mod feed;
pub mod health;
pub mod macros;
pub mod preset;
pub mod validation;

pub use bird::*;
pub use breed_composition::*;
pub use catalog::*;
pub use common::*;
pub use egg::*;
pub use feed::*;
pub use health::*;
pub use preset::*;
pub use validation::{Validate, ValidationError, ValidationResult};
