//! Metric names emitted by the booking core.
//!
//! The core only records through the `metrics` facade. Installing a recorder/exporter is left
//! to the embedding application; without one, recording is a no-op.

use metrics::{describe_counter, Unit};

/// Registration attempts, labelled `outcome` (`confirmed`, `full`, `duplicate`, `closed`, ...)
pub const REGISTRATIONS: &str = "studio_registrations_total";

/// Confirmed registrations moved to `cancelled`
pub const CANCELLATIONS: &str = "studio_cancellations_total";

/// Attendance records, labelled `result` (`attended`, `no-show`)
pub const ATTENDANCE: &str = "studio_attendance_total";

/// Optimistic concurrency conflicts, labelled `operation`
pub const CONCURRENCY_CONFLICTS: &str = "studio_concurrency_conflicts_total";

/// Entitlements flipped to `expired`
pub const EXPIRATIONS: &str = "studio_expirations_total";

/// Package renewals, labelled `mode` (`add`, `replace`)
pub const RENEWALS: &str = "studio_renewals_total";

/// Register descriptions for every metric above with the installed recorder.
pub fn describe() {
    describe_counter!(REGISTRATIONS, Unit::Count, "Session registration attempts by outcome");
    describe_counter!(CANCELLATIONS, Unit::Count, "Registrations cancelled");
    describe_counter!(ATTENDANCE, Unit::Count, "Attendance marks by result");
    describe_counter!(
        CONCURRENCY_CONFLICTS,
        Unit::Count,
        "Optimistic concurrency conflicts hit by read-modify-write cycles"
    );
    describe_counter!(EXPIRATIONS, Unit::Count, "Packages found expired and voided");
    describe_counter!(RENEWALS, Unit::Count, "Package renewals by mode");
}
