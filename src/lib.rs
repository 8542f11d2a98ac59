//! Resolution and targeting engine for embeddable announcement bars.
//!
//! # Overview
//!
//! Each storefront account owns one bar holding an ordered list of messages. For every widget
//! request, the [`Resolver`] looks the account's [`BarConfig`] up in a [`ConfigStore`] and
//! evaluates it against the visitor's [`RequestContext`]: targeting rules narrow the messages down
//! to the eligible ones, time-based rotation picks one of them, and an A/B split chooses the
//! copy to show. The outcome is a [`Decision`], serialized for the widget as a
//! [`DecisionPayload`].
//!
//! Evaluation is pure. Given the same configuration and context (including `now` and the session
//! key), the same message and variant come out.
//!
//! Every shown message produces an impression [`BarEvent`] that is handed to an
//! [`EventEmitter`]. Emission never blocks and never fails a request.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Inside evaluation, nothing fails: inconsistent
//! configuration makes a message ineligible, and [`validate_bar`] reports such problems as
//! diagnostics.
//!
//! # Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log/latest/log/) facade with the
//! `announcement_bar` target.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
mod config;
mod configuration_store;
mod context;
mod decision;
mod error;
mod eval;
mod event_dispatcher;
mod events;
mod models;
mod poller;
mod resolver;
pub mod rotation;
mod sharder;
pub mod targeting;
mod validation;
pub mod variant;

pub use config::{ConfigSource, EventsConfig, Listener, ServerConfig};
pub use configuration_store::{ConfigStore, InMemoryConfigStore, Snapshot};
pub use context::{DeviceType, ParseDeviceTypeError, RequestContext};
pub use decision::{BarSummary, Decision, DecisionPayload, NoBarReason, ResolvedMessage};
pub use error::{Error, Result};
pub use event_dispatcher::{EventDispatcher, EventDispatcherConfig};
pub use events::{BarEvent, EmissionError, EventEmitter, EventType, NoopEventEmitter};
pub use models::{BarConfig, Message, PageTargetingType, Presentation, Timestamp, TryParse};
pub use poller::{PollerThread, PollerThreadConfig};
pub use resolver::Resolver;
pub use sharder::{Md5Sharder, Sharder};
pub use validation::{validate_bar, validate_message, ConfigError};
pub use variant::{ParseTrafficSplitError, RenderedContent, TrafficSplit, Variant};
