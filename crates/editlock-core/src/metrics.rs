// Lock operation metrics
// Counters are emitted through the `metrics` facade; the server describes them at startup

use metrics::{counter, describe_counter};

pub const ACQUIRE_TOTAL: &str = "editlock_acquire_total";
pub const RENEW_TOTAL: &str = "editlock_renew_total";
pub const RELEASE_TOTAL: &str = "editlock_release_total";
pub const SWEPT_TOTAL: &str = "editlock_swept_total";

/// Register metric descriptions. Call once at startup.
pub fn describe() {
    describe_counter!(ACQUIRE_TOTAL, "Lock acquire attempts by outcome");
    describe_counter!(RENEW_TOTAL, "Lock renewals by outcome");
    describe_counter!(RELEASE_TOTAL, "Lock releases by outcome");
    describe_counter!(SWEPT_TOTAL, "Expired lock records reclaimed by the sweeper");
}

pub(crate) fn record_acquire(outcome: &'static str) {
    counter!(ACQUIRE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_renew(outcome: &'static str) {
    counter!(RENEW_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_release(outcome: &'static str) {
    counter!(RELEASE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_swept(count: u64) {
    counter!(SWEPT_TOTAL).increment(count);
}
