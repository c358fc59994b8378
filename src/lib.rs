//! Aircraft watcher for the OpenSky Network.
//!
//! This library provides functionality to:
//! - Resolve a named area, bounding box or country to a query box
//! - Poll the OpenSky state endpoint for aircraft inside the box
//! - Enrich each aircraft with its most recent flight from the last 24 hours
//! - Classify aircraft by emitter category and emit structured records
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐    ┌────────────────┐    ┌─────────────────┐
//! │  AreaResolver  │───▶│  StateFetcher  │───▶│ HistoryEnricher │
//! └────────────────┘    └────────────────┘    └─────────────────┘
//!                               │                      │
//!                               └──────────┬───────────┘
//!                                          ▼
//!                               ┌─────────────────┐    ┌────────────────┐
//!                               │  PollScheduler  │───▶│   RecordSink   │
//!                               │  (+Classifier)  │    │                │
//!                               └─────────────────┘    └────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flightwatch::{
//!     area::{AreaResolver, AreaSelector, StaticCountryBounds},
//!     client::{ClientConfig, Credentials, OpenSkyClient},
//!     record::{CollectingSink, RecordSink},
//!     scheduler::{PollScheduler, SchedulerConfig},
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let selector = AreaSelector::from_parts(Some("RI"), None, None)?;
//!     let bbox = AreaResolver::new(StaticCountryBounds::new()).resolve(&selector)?;
//!
//!     let config = ClientConfig::new(Credentials::new("user", "password"));
//!     let client = Arc::new(OpenSkyClient::new(config)?);
//!
//!     let collected = Arc::new(CollectingSink::new());
//!     let sink: Arc<dyn RecordSink> = collected.clone();
//!
//!     let scheduler = PollScheduler::new(Arc::clone(&client), client, bbox, sink)
//!         .with_config(SchedulerConfig::default().with_limit(10));
//!
//!     scheduler.run(&CancellationToken::new()).await;
//!     println!("{} records", collected.len());
//!
//!     Ok(())
//! }
//! ```

pub mod area;
pub mod classify;
pub mod client;
pub mod protocol;
pub mod record;
pub mod retry;
pub mod scheduler;
pub mod types;

pub use area::{AreaError, AreaResolver, AreaSelector, CountryBoundsLookup, NamedArea, StaticCountryBounds};
pub use classify::{AircraftCategory, CategoryTable, Classifier};
pub use client::{ClientConfig, ClientError, Credentials, HistoryEnricher, OpenSkyClient, StateFetcher};
pub use record::{build_record, CollectingSink, ConsoleSink, RecordSink, TeeSink};
pub use retry::RetryPolicy;
pub use scheduler::{PollReport, PollScheduler, SchedulerConfig, StopReason};
pub use types::{BoundingBox, EnrichedRecord, FlightHistoryEntry, StateVector};
