//! Vigil Core
//!
//! A single-threaded change-propagation engine. It implements:
//!
//! - Scopes: a caller-owned model plus a registry of watchers
//! - A digest loop that re-runs watchers until the model is stable
//! - Deferred task queues driven by an injected one-shot scheduler
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `scope`: scopes, watchers, the digest loop and the task queues
//! - `schedule`: the deferred-callback abstraction and its implementations
//! - `report`: where caught callable failures go
//! - `config`: scope tunables
//! - `error`: the failures that escape a digest
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use vigil_core::schedule::ManualScheduler;
//! use vigil_core::scope::Scope;
//!
//! #[derive(Default)]
//! struct Person { name: String, upper: String }
//!
//! let scope = Scope::new(Person::default(), Rc::new(ManualScheduler::new()));
//!
//! // Derive one field from another
//! scope.watch_with(
//!     |s| Ok(s.model().name.clone()),
//!     |name: &String, _, s| {
//!         s.model_mut().upper = name.to_uppercase();
//!         Ok(())
//!     },
//! );
//!
//! scope.apply(|s| {
//!     s.model_mut().name = "hideo".into();
//!     Ok(())
//! })?;
//! // The apply digested: upper is now "HIDEO"
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod schedule;
pub mod scope;

pub use config::ScopeConfig;
pub use error::ScopeError;
pub use scope::{Deregistration, Phase, Scope, Watchable};
