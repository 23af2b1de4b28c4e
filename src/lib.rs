//! Import FIRST Robotics Competition data from The Blue Alliance into a
//! local object store.
//!
//! An [`Importer`] pairs a [`RemoteSource`] (normally a [`TbaClient`]) with an
//! [`ObjectStore`] ([`SqliteStore`] or [`MemoryStore`]) and keeps events,
//! teams, event attendance and rankings in the store in step with the remote.
//! Imports are idempotent: running one twice against unchanged remote data
//! leaves the store exactly as the first run did.

pub use client::TbaClient;
pub use config::{ClientConfig, DeletionPolicy, ImporterConfig, StaleLinkPolicy};
pub use context::EventTeamContext;
pub use error::{ImportError, Result};
pub use importer::{ImportKind, ImportReport, ImportStatus, Importer};
pub use model::*;
pub use remote::RemoteSource;
pub use store::{
    MemoryStore, ObjectStore, SqliteStore, StoreError, StoreResult, StoreTransaction,
    UpsertOutcome,
};
pub use tokio_util::sync::CancellationToken;

mod client;
pub mod config;
mod context;
mod error;
mod importer;
pub mod model;
mod remote;
pub mod store;
