// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - Database: row-level repository over a PgPool
// - DbStore: implements LeadStore, WorkflowStore, AutoRunStore and CampaignStore

pub mod models;
pub mod repositories;
pub mod store;

pub use models::*;
pub use repositories::*;
pub use store::{create_db_store, DbStore};

use sqlx::migrate::Migrator;

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
