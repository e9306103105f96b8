//! Per-destination rate estimator
//!
//! An exponentially-weighted moving average over fixed-width windows,
//! grounded on the original's `clientSend` window-rollover arithmetic
//! (`client.go`): each destination IP accumulates a count of DO-bearing
//! queries per window, and that count decays geometrically across idle
//! windows rather than resetting to zero.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

struct Window {
    cur_score: f64,
    prv_score: f64,
    last_update: Instant,
}

/// Mutual exclusion is the caller's responsibility (see `client::ClientContext`):
/// every method here is a single non-suspending read-modify-write.
pub struct RateEstimator {
    alpha: f64,
    window_size: Duration,
    windows: HashMap<IpAddr, Window>,
}

impl RateEstimator {
    pub fn new(alpha: f64, window_size: Duration) -> Self {
        Self {
            alpha,
            window_size,
            windows: HashMap::new(),
        }
    }

    /// Returns `true` if this is the first DO-bearing query ever seen for
    /// `ip` — the caller should take the UDP path unconditionally in that
    /// case, without consulting [`RateEstimator::score`].
    pub fn is_first_sighting(&self, ip: &IpAddr) -> bool {
        !self.windows.contains_key(ip)
    }

    /// Records a DO-bearing query for `ip` at `now` and returns its updated
    /// score. Creates a fresh window on first sighting, per
    /// `SPEC_FULL.md` §4.3, without folding the creation into the formula
    /// below (there is no previous window to roll over).
    pub fn record(&mut self, ip: IpAddr, now: Instant) -> f64 {
        self.record_and_was_first_sighting(ip, now).1
    }

    /// Same as [`RateEstimator::record`], but also reports whether `ip` had
    /// never been seen before this call. Checking and recording happen under
    /// one borrow of `self`, so two callers racing to be "first" for the same
    /// IP (e.g. from concurrently spawned tasks sharing one `Mutex`) cannot
    /// both observe `true`.
    pub fn record_and_was_first_sighting(&mut self, ip: IpAddr, now: Instant) -> (bool, f64) {
        use std::collections::hash_map::Entry;

        let alpha = self.alpha;
        let window_size = self.window_size;

        let (was_first_sighting, window) = match self.windows.entry(ip) {
            Entry::Vacant(slot) => (
                true,
                slot.insert(Window {
                    cur_score: 1.0,
                    prv_score: 0.0,
                    last_update: now,
                }),
            ),
            Entry::Occupied(slot) => {
                let window = slot.into_mut();
                let elapsed = now.saturating_duration_since(window.last_update);
                if elapsed < window_size {
                    window.cur_score += 1.0;
                } else {
                    let k = (elapsed.as_secs_f64() / window_size.as_secs_f64()).floor();
                    window.prv_score =
                        (window.prv_score + (1.0 - alpha) * window.cur_score) * alpha.powf(k);
                    window.cur_score = 1.0;
                    window.last_update = now;
                }
                (false, window)
            }
        };

        let score = alpha * window.prv_score + (1.0 - alpha) * window.cur_score;
        (was_first_sighting, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[test]
    fn first_sighting_is_reported_before_recording() {
        let estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        assert!(estimator.is_first_sighting(&ip()));
    }

    #[test]
    fn score_accumulates_within_one_window() {
        let mut estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        let t0 = Instant::now();
        estimator.record(ip(), t0);
        estimator.record(ip(), t0 + Duration::from_secs(1));
        let score = estimator.record(ip(), t0 + Duration::from_secs(2));
        // cur_score = 3 after three queries in-window; prv_score still 0.
        assert!((score - 1.5).abs() < 1e-9);
    }

    #[test]
    fn score_decays_across_idle_windows() {
        let mut estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        let t0 = Instant::now();
        for _ in 0..11 {
            estimator.record(ip(), t0);
        }
        // 11 queries all within the first instant => cur_score = 11.
        let score_before = estimator.record(ip(), t0 + Duration::from_secs(5));
        assert!(score_before > 5.0);

        // Jump ahead by exactly one window: rollover with k = 1.
        let score_after = estimator.record(ip(), t0 + Duration::from_secs(10));
        assert!(score_after < score_before);
    }

    #[test]
    fn large_idle_gap_underflows_gracefully() {
        let mut estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        let t0 = Instant::now();
        estimator.record(ip(), t0);
        let score = estimator.record(ip(), t0 + Duration::from_secs(100_000));
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn record_and_was_first_sighting_reports_first_only_once() {
        let mut estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        let t0 = Instant::now();
        let (first, _) = estimator.record_and_was_first_sighting(ip(), t0);
        assert!(first);
        let (first, _) = estimator.record_and_was_first_sighting(ip(), t0 + Duration::from_secs(1));
        assert!(!first);
    }

    #[test]
    fn exact_window_boundary_counts_as_rollover() {
        let mut estimator = RateEstimator::new(0.5, Duration::from_secs(10));
        let t0 = Instant::now();
        estimator.record(ip(), t0);
        estimator.record(ip(), t0 + Duration::from_secs(5));
        // Exactly windowSize later: must roll over, not accumulate.
        let score = estimator.record(ip(), t0 + Duration::from_secs(15));
        // prv = (0 + 0.5*2) * 0.5^1 = 0.5; cur = 1 => score = 0.5*0.5 + 0.5*1 = 0.75
        assert!((score - 0.75).abs() < 1e-9);
    }
}
