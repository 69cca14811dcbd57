//! html-migrate: split hand-authored HTML documents into a component
//! project: one global stylesheet, shared components, a page per document
//! and an asset manifest.
//!
//! The pipeline runs analysis → planning → execution → validation; see
//! [`pipeline::Migration`] for the orchestrated form.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod css;
pub mod error;
pub mod executor;
pub mod lines;
pub mod mapper;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod state;
pub mod validate;

pub use error::{MigrationError, Result};
