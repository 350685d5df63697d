//! # Grid Hub
//!
//! Priority-aware admission and dispatch scheduler for a browser-automation
//! grid.
//!
//! Clients ask the hub for a session with some desired capabilities
//! (`browserName = firefox`, ...). Workers (nodes) register slot classes they
//! can host, each with a concurrency limit. When no compatible slot is free
//! the request waits in a pending queue; whenever capacity frees up the hub
//! re-ranks the queue with the installed priority policy and hands out slots
//! best-first.
//!
//! ## Key Features
//!
//! - **Exact capacity accounting**: per slot class and per worker, never
//!   over-admitted, released exactly once per session
//! - **Pluggable priority**: FIFO by default; `ImportantFirst`,
//!   `NumericPriority`, or any closure via `FnPolicy`
//! - **Fresh ranking**: every dispatch pass re-ranks the whole queue, so a
//!   late urgent request jumps ahead the moment a slot frees
//! - **No polling**: blocking waits use a `Condvar`, async waits a `watch`
//!   channel
//! - **Timeouts with opt-out**: admission and idle-session timeouts, both
//!   disableable with the `-1` sentinel
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use grid_hub::core::{
//!     capabilities, Hub, HubOptions, ImportantFirst, MaxConcurrency, SessionRequest,
//!     WorkerRegistration,
//! };
//!
//! let hub = Hub::new(HubOptions::default()).with_policy(Arc::new(ImportantFirst::default()));
//! let firefox = capabilities([("browserName", "firefox")]);
//! hub.register_worker(
//!     WorkerRegistration::new("node-1").with_slot_class(firefox.clone(), MaxConcurrency::Bounded(1)),
//! )?;
//!
//! let running = hub.submit(SessionRequest::new(firefox.clone()))?;
//! let _ordinary = hub.submit(SessionRequest::new(firefox.clone()))?;
//! let urgent = hub.submit(SessionRequest::new(firefox).with_attribute("_important", true))?;
//! assert_eq!(hub.pending_count(), 2);
//!
//! let session = hub.wait_for_assignment(running, None)?.session_id;
//! hub.terminate(session)?;
//! assert!(hub.wait_for_assignment(urgent, None).is_ok());
//! # Ok::<(), grid_hub::core::HubError>(())
//! ```
//!
//! See `tests/priority_demo_test.rs` for the full queue-jumping scenario.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for the hub, nodes, and timeouts.
pub mod config;
/// Builders to construct a hub from configuration.
pub mod builders;
/// Runtime adapters and the transport-facing API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
