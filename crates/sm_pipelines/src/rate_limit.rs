//! Dual token bucket limiting request rate and token rate independently,
//! with continuous refill and a cooperative wait loop so a paused/cancelled
//! job never blocks past a short poll interval.

use std::time::Instant;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Duration;

struct RateState {
    req_tokens: f64,
    tok_tokens: f64,
    last: Instant,
}

pub struct DualTokenBucket {
    req_rate: f64,
    tok_rate: f64,
    req_capacity: f64,
    tok_capacity: f64,
    state: Mutex<RateState>,
}

const MAX_SLEEP: Duration = Duration::from_millis(2_000);
const MIN_SLEEP: Duration = Duration::from_millis(50);

impl DualTokenBucket {
    pub fn new(req_per_min: u32, tok_per_min: u32) -> Self {
        let now = Instant::now();
        DualTokenBucket {
            req_rate: req_per_min as f64 / 60.0,
            tok_rate: tok_per_min as f64 / 60.0,
            req_capacity: req_per_min as f64,
            tok_capacity: tok_per_min as f64,
            state: Mutex::new(RateState {
                req_tokens: req_per_min as f64,
                tok_tokens: tok_per_min as f64,
                last: now,
            }),
        }
    }

    /// Blocks (cooperatively, in bounded slices) until both a request slot
    /// and `tok_cost` tokens are available, then debits both.
    pub async fn acquire(&self, req_cost: f64, tok_cost: f64) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last).as_secs_f64();
                state.last = now;
                state.req_tokens = (state.req_tokens + elapsed * self.req_rate).min(self.req_capacity);
                state.tok_tokens = (state.tok_tokens + elapsed * self.tok_rate).min(self.tok_capacity);

                if state.req_tokens >= req_cost && state.tok_tokens >= tok_cost {
                    state.req_tokens -= req_cost;
                    state.tok_tokens -= tok_cost;
                    return;
                }

                let need_req = (req_cost - state.req_tokens).max(0.0);
                let need_tok = (tok_cost - state.tok_tokens).max(0.0);
                let wait_req = if self.req_rate > 0.0 {
                    need_req / self.req_rate
                } else {
                    0.5
                };
                let wait_tok = if self.tok_rate > 0.0 {
                    need_tok / self.tok_rate
                } else {
                    0.5
                };
                Duration::from_secs_f64(wait_req.max(wait_tok).max(MIN_SLEEP.as_secs_f64()))
            };

            tokio::time::sleep(wait.min(MAX_SLEEP)).await;
        }
    }
}

/// `min(cap, base * 2^attempt) * (0.5 + uniform(0,1) * 0.5)`.
pub fn backoff_delay(attempt: u32, base: f64, cap: f64) -> Duration {
    let exp = (base * 2f64.powi(attempt as i32)).min(cap);
    let jitter = 0.5 + rand::thread_rng().gen_range(0.0..1.0) * 0.5;
    Duration::from_secs_f64(exp * jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_does_not_block_within_capacity() {
        let bucket = DualTokenBucket::new(120, 200_000);
        let start = Instant::now();
        bucket.acquire(1.0, 100.0).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn backoff_stays_within_cap() {
        for attempt in 0..10 {
            let d = backoff_delay(attempt, 0.5, 20.0);
            assert!(d.as_secs_f64() <= 20.0);
        }
    }
}
