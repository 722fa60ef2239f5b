//! proptest strategies for studio domain types.

use proptest::prelude::*;
use studio_core::renewal::RenewalMode;
use studio_core::types::{Allowance, MembershipStatus};

/// A step in a randomly generated seat history, addressed by member index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatOp {
    /// Member tries to register
    Register(usize),
    /// Member cancels their confirmed registration
    Cancel(usize),
    /// Staff records attendance for the member
    Attend(usize, bool),
}

/// Finite or unlimited allowance, finite values kept small.
pub fn allowance() -> impl Strategy<Value = Allowance> {
    prop_oneof![
        4 => (0u32..=60).prop_map(Allowance::Limited),
        1 => Just(Allowance::Unlimited),
    ]
}

/// Either renewal mode.
pub fn renewal_mode() -> impl Strategy<Value = RenewalMode> {
    prop_oneof![Just(RenewalMode::Add), Just(RenewalMode::Replace)]
}

/// Any membership status.
pub fn membership_status() -> impl Strategy<Value = MembershipStatus> {
    prop_oneof![
        Just(MembershipStatus::Active),
        Just(MembershipStatus::Inactive),
        Just(MembershipStatus::Suspended),
        Just(MembershipStatus::Expired),
    ]
}

/// Up to `max_len` seat operations over `members` distinct members.
pub fn seat_ops(members: usize, max_len: usize) -> impl Strategy<Value = Vec<SeatOp>> {
    let op = prop_oneof![
        3 => (0..members).prop_map(SeatOp::Register),
        2 => (0..members).prop_map(SeatOp::Cancel),
        1 => (0..members, any::<bool>()).prop_map(|(m, attended)| SeatOp::Attend(m, attended)),
    ];
    proptest::collection::vec(op, 0..max_len)
}
