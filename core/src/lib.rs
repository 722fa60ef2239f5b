//! # Studio Core
//!
//! Booking and entitlement core of a yoga studio.
//!
//! ## Components
//!
//! - **Package Catalog** ([`catalog`]): purchasable plans with a class allowance and a validity
//!   window
//! - **Entitlement Ledger** ([`ledger`]): which package each member holds, since when, and
//!   their membership status
//! - **Expiry Evaluator** ([`expiry`]): lazily voids packages whose window has passed
//! - **Renewal Engine** ([`renewal`]): assigns a new package in `add` or `replace` mode
//! - **Session Registry** ([`registry`]): sessions, capacity and registrations
//! - **Cancellation Window Guard** ([`cancellation`]): whether a member may still cancel
//! - **Remaining-Classes Calculator** ([`remaining`]): allowance minus usage, computed live
//!
//! [`Studio`] ties them together for member-facing workflows.
//!
//! ## Architecture
//!
//! - Pure transitions: every session change is a [`Reducer`](reducer::Reducer) over the session
//!   document; expiry, renewal and remaining-class arithmetic are plain functions
//! - Injected dependencies: clock, id source, stores and collaborator catalogs arrive through
//!   [`StudioEnvironment`]
//! - Optimistic concurrency: documents carry a [`Version`](store::Version); every mutation is
//!   load → reduce → versioned save, retried on conflict
//!
//! ## Example
//!
//! ```ignore
//! use studio_core::*;
//!
//! let env = StudioEnvironment::new(clock, sessions, entitlements, classes, packages, members);
//! let studio = Studio::new(env, BookingPolicy::default());
//!
//! studio.renew(member_id, ten_class_pass, RenewalMode::Replace).await?;
//! studio.book_class(session_id, member_id, None).await?;
//! let summary = studio.entitlement_summary(member_id).await?;
//! ```

pub mod cancellation;
pub mod catalog;
pub mod environment;
pub mod error;
pub mod expiry;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod reducer;
pub mod registry;
pub mod remaining;
pub mod renewal;
pub mod retry;
pub mod store;
pub mod studio;
pub mod types;

pub use cancellation::{can_cancel, can_cancel_within, CancelWindow};
pub use catalog::{InMemoryPackageCatalog, NewPackage, PackageUpdate};
pub use environment::{
    ClassCatalog, Clock, IdGenerator, MemberDirectory, PackageCatalog, RandomIds, StudioCalendar,
    StudioEnvironment, SystemClock,
};
pub use error::{BookingError, EntitlementGap, EntityKind, Result, StoreError, Transition};
pub use expiry::{ExpiryCheck, ExpiryEvaluator, ExpiryVerdict, SweepReport};
pub use ledger::EntitlementLedger;
pub use memory::{InMemoryEntitlementStore, InMemorySessionStore};
pub use registry::{
    BulkFailure, BulkOutcome, NewSession, SessionRegistry, SessionTemplate, SessionUpdate,
};
pub use remaining::{Remaining, RemainingClassesCalculator, UsagePolicy, UsageScope};
pub use renewal::{RenewalEngine, RenewalMode, RenewalOutcome};
pub use retry::RetryPolicy;
pub use store::{EntitlementStore, SessionQuery, SessionStore, Version, Versioned};
pub use studio::{BookingPolicy, EntitlementSummary, Studio};
pub use types::*;
