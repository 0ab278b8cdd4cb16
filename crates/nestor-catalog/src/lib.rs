//! Catalog of stored nested program definitions.
//!
//! The catalog is an HTTP service listing programs by title. Entries are
//! fetched with [`CatalogClient`] and turned into runnable programs with
//! [`CatalogEntry::to_program`].

pub mod client;
pub mod entry;

pub use client::{CatalogClient, MAX_PAGES};
pub use entry::{CatalogEntry, EntryId};
