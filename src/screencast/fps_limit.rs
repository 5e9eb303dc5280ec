//! Frame-rate limiter, ported from `examples/original_source/src/screencast/fps_limit.c`.
//!
//! Two independent jobs share one struct in the original: pacing frames
//! towards `max_fps`, and periodically logging the achieved average. Both
//! are kept here for fidelity, on `Instant` instead of `clock_gettime`.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

const FPS_MEASURE_PERIOD: Duration = Duration::from_secs(5);

pub struct FpsLimiter {
    max_fps: f64,
    frame_last_time: Option<Instant>,
    fps_last_time: Option<Instant>,
    fps_frame_count: u64,
}

impl FpsLimiter {
    pub fn new(max_fps: f64) -> Self {
        Self {
            max_fps,
            frame_last_time: None,
            fps_last_time: None,
            fps_frame_count: 0,
        }
    }

    pub fn set_max_fps(&mut self, max_fps: f64) {
        self.max_fps = max_fps;
    }

    /// Mark the start of a new capture cycle. No-op when limiting is disabled.
    pub fn measure_start(&mut self) {
        if self.max_fps <= 0.0 {
            return;
        }
        self.frame_last_time = Some(Instant::now());
    }

    /// Returns how long the caller should sleep before requesting the next
    /// frame, or `Duration::ZERO` if the target is already met or limiting
    /// is disabled.
    pub fn measure_end(&mut self) -> Duration {
        if self.max_fps <= 0.0 {
            return Duration::ZERO;
        }
        let Some(last) = self.frame_last_time else {
            return Duration::ZERO;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(last);

        self.measure_fps(now);

        let target = Duration::from_secs_f64(1.0 / self.max_fps);
        if target > elapsed {
            let delay = target - elapsed;
            trace!(
                "fps_limit: elapsed {:?}, target {:?}, delaying {:?}",
                elapsed, target, delay
            );
            delay
        } else {
            trace!(
                "fps_limit: elapsed {:?}, target {:?}, target not met",
                elapsed, target
            );
            Duration::ZERO
        }
    }

    fn measure_fps(&mut self, now: Instant) {
        let Some(last) = self.fps_last_time else {
            self.fps_last_time = Some(now);
            return;
        };

        self.fps_frame_count += 1;
        let elapsed = now.duration_since(last);
        if elapsed < FPS_MEASURE_PERIOD {
            return;
        }

        let avg = self.fps_frame_count as f64 / elapsed.as_secs_f64();
        debug!(
            "fps_limit: average FPS over the last {:.2}s: {:.2}",
            elapsed.as_secs_f64(),
            avg
        );
        self.fps_last_time = Some(now);
        self.fps_frame_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_never_delays() {
        let mut limiter = FpsLimiter::new(0.0);
        limiter.measure_start();
        assert_eq!(limiter.measure_end(), Duration::ZERO);
    }

    #[test]
    fn negative_max_fps_disables_limiting() {
        let mut limiter = FpsLimiter::new(-5.0);
        limiter.measure_start();
        assert_eq!(limiter.measure_end(), Duration::ZERO);
    }

    #[test]
    fn measure_end_without_start_is_zero() {
        let mut limiter = FpsLimiter::new(30.0);
        assert_eq!(limiter.measure_end(), Duration::ZERO);
    }

    #[test]
    fn enabled_limiter_requests_a_delay_for_instant_frames() {
        let mut limiter = FpsLimiter::new(30.0);
        limiter.measure_start();
        let delay = limiter.measure_end();
        assert!(delay > Duration::ZERO);
        assert!(delay <= Duration::from_secs_f64(1.0 / 30.0));
    }
}
