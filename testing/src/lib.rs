//! # Studio Testing
//!
//! Testing utilities for the studio booking core.
//!
//! This crate provides:
//! - Controllable implementations of the environment traits (clock, id source, class catalog,
//!   member directory)
//! - [`TestStudio`]: a fully in-memory studio wired to those doubles
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - Fixtures for common classes, packages and sessions
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use studio_testing::{fixtures, TestStudio};
//!
//! #[tokio::test]
//! async fn books_a_class() {
//!     let t = TestStudio::at("2024-01-15T08:00:00Z");
//!     let member = t.add_member("Sam");
//!     let pass = t.add_package(fixtures::ten_class_pass());
//!     t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
//!
//!     let class = t.add_class(fixtures::vinyasa());
//!     let session = t.schedule(class, t.today(), fixtures::slot((18, 0), (19, 0))).await;
//!     t.studio.book_class(session.id, member, None).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod properties;

pub use fixtures::TestStudio;
pub use mocks::{
    test_clock, FixedClock, InMemoryClassCatalog, InMemoryMemberDirectory, SequentialIds,
};
pub use reducer_test::ReducerTest;

/// Route `tracing` output through the test harness's captured stdout.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
