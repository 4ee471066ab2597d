//! File reference catalog and storage request lifecycle engine.
//!
//! The [`Ledger`] keeps, for every `(storage, checksum)`, the owners
//! referencing a file and the requests moving its bytes. Storing a file that
//! is already there only adds an owner; removing the last owner queues its
//! physical deletion; a file re-requested while its deletion is in flight
//! waits as DELAYED and is stored again once the deletion completes.
//!
//! Byte movement follows a two-phase protocol: the ledger claims requests
//! into [`Job`](stowage_core::Job)s, a [`JobExecutor`] runs them against the
//! backends and the resulting [`JobReport`](stowage_core::JobReport) is
//! applied back. [`StorageService`] wires it all together behind an async
//! API and publishes events on an [`EventBus`].
//!
//! # Example
//!
//! ```no_run
//! use stowage_catalog::{StorageService, StowageConfig};
//! use stowage_core::{FileReferenceMetaInfo, StorageRequestItem};
//!
//! # async fn example() -> stowage_error::StowageResult<()> {
//! let service = StorageService::new(&StowageConfig::load()?)?;
//! let meta = FileReferenceMetaInfo::new("abc123", "MD5", "report.pdf", "application/pdf");
//! let item = StorageRequestItem::new("owner-a", meta, "file:///tmp/report.pdf", "online-1");
//! service.store(vec![item], "group-1").await;
//! service.tick(chrono::Utc::now()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod events;
mod executor;
mod groups;
mod ledger;
pub mod reconcile;
mod service;
mod table;

pub use catalog::FileCatalog;
pub use config::{RequestsConfig, RequestsConfigBuilder, StowageConfig};
pub use events::{EventBus, EventPublisher};
pub use executor::JobExecutor;
pub use groups::GroupTracker;
pub use ledger::{AddReferenceOutcome, Ledger};
pub use service::{StorageService, TickSummary};
pub use table::{LedgerRequest, RequestTable};
