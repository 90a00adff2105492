//! # Sleep-delay rounding.
//!
//! Timer and clock granularity can make a wake-up land fractionally before
//! the planned occurrence, in which case the next planning pass would see
//! the same occurrence again and fire it twice. Rounding the delay up
//! absorbs that: the delay is stretched toward the next whole second, but
//! never by more than the configured bound, and never shortened.

use std::time::Duration;

/// Rounds `delay` up toward the next whole second, adding at most
/// `max_rounding`. Whole-second delays pass through unchanged.
pub(crate) fn round_up(delay: Duration, max_rounding: Duration) -> Duration {
    if delay.subsec_nanos() == 0 {
        return delay;
    }
    let ceiling = Duration::from_secs(delay.as_secs().saturating_add(1));
    ceiling.min(delay.saturating_add(max_rounding))
}
