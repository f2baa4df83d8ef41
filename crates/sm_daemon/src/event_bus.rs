//! Per-job publish/subscribe event bus.
//!
//! The Python original's `subscribe` hands back the one shared
//! `asyncio.Queue` per job, which only works for a single live listener. A
//! per-job bounded backlog (capacity 5000, drop-oldest-on-overflow) is the
//! publish side — it is what gives `publish` its monotonic sequence numbers
//! and its lossy-oldest behavior regardless of whether anyone is listening
//! — and every `subscribe` call gets its own `tokio::sync::broadcast`
//! receiver fed from the same publish, so N concurrent SSE clients for one
//! job never starve each other the way a single shared queue would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sm_protocol::Event;
use tokio::sync::{broadcast, Mutex};

const BACKLOG_CAPACITY: usize = 5000;
const BROADCAST_CAPACITY: usize = 5000;

struct JobBus {
    seq: AtomicU64,
    backlog: Mutex<VecDeque<Event>>,
    fanout: broadcast::Sender<Event>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    jobs: Arc<Mutex<HashMap<i64, Arc<JobBus>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    async fn job_bus(&self, job_id: i64) -> Arc<JobBus> {
        let mut jobs = self.jobs.lock().await;
        jobs.entry(job_id)
            .or_insert_with(|| {
                let (fanout, _rx) = broadcast::channel(BROADCAST_CAPACITY);
                Arc::new(JobBus {
                    seq: AtomicU64::new(0),
                    backlog: Mutex::new(VecDeque::with_capacity(BACKLOG_CAPACITY)),
                    fanout,
                })
            })
            .clone()
    }

    /// Assigns the next per-job sequence number, appends to the bounded
    /// backlog (dropping the oldest entry past capacity), and forwards to
    /// any live subscribers. Never blocks.
    pub async fn publish(&self, job_id: i64, kind: &str, payload: Value, ts: f64) -> Event {
        let bus = self.job_bus(job_id).await;
        let seq = bus.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = Event {
            ts,
            seq,
            job_id: job_id.to_string(),
            kind: kind.to_string(),
            payload,
        };

        {
            let mut backlog = bus.backlog.lock().await;
            if backlog.len() >= BACKLOG_CAPACITY {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }

        // No live receivers is not an error here — the backlog already has
        // the event for anyone who subscribes later.
        let _ = bus.fanout.send(event.clone());
        event
    }

    /// Returns the current backlog snapshot (oldest first) plus a receiver
    /// for events published from this moment on.
    pub async fn subscribe(&self, job_id: i64) -> (Vec<Event>, broadcast::Receiver<Event>) {
        let bus = self.job_bus(job_id).await;
        let rx = bus.fanout.subscribe();
        let backlog = bus.backlog.lock().await.iter().cloned().collect();
        (backlog, rx)
    }

    /// Drops a finished job's bus state; safe to call even if nothing ever
    /// subscribed.
    pub async fn drop_job(&self, job_id: i64) {
        self.jobs.lock().await.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sequence_numbers_are_strictly_increasing() {
        let bus = EventBus::new();
        let e1 = bus.publish(1, "job_created", json!({}), 1.0).await;
        let e2 = bus.publish(1, "job_planning_finished", json!({}), 2.0).await;
        assert!(e1.seq < e2.seq);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_without_blocking() {
        let bus = EventBus::new();
        for i in 0..(BACKLOG_CAPACITY + 10) {
            bus.publish(1, "tick", json!({"i": i}), i as f64).await;
        }
        let (backlog, _rx) = bus.subscribe(1).await;
        assert_eq!(backlog.len(), BACKLOG_CAPACITY);
        assert_eq!(backlog.first().unwrap().payload["i"], 10);
    }

    #[tokio::test]
    async fn independent_subscribers_each_get_new_events() {
        let bus = EventBus::new();
        bus.publish(1, "job_created", json!({}), 1.0).await;
        let (_backlog_a, mut rx_a) = bus.subscribe(1).await;
        let (_backlog_b, mut rx_b) = bus.subscribe(1).await;

        bus.publish(1, "job_planning_finished", json!({}), 2.0).await;

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.kind, "job_planning_finished");
        assert_eq!(got_b.kind, "job_planning_finished");
    }
}
