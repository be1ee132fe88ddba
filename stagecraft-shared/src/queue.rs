//! Queue abstraction.
//!
//! The engine treats the queue as a reliable at-least-once transport with
//! visibility timeouts; the concrete transport (SQS, PGMQ, RabbitMQ) is an
//! external collaborator this crate never binds to. `InMemoryQueue` is the
//! reference implementation used by the test suite, backing engine tests
//! without a real message broker.

use crate::error::{EngineError, EngineResult};
use crate::messages::EngineMessage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Opaque handle returned by `poll`, required to `ack` or `nack` the
/// message it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AckToken(u64);

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub ready: usize,
    pub in_flight: usize,
}

/// A reliable, at-least-once message queue with visibility timeouts.
///
/// Implementations must guarantee that a redelivered message is
/// semantically identical to its first delivery; every `stagecraft-core`
/// handler is written to be idempotent under that guarantee.
#[async_trait]
pub trait Queue: Send + Sync + std::fmt::Debug {
    async fn push(&self, message: EngineMessage) -> EngineResult<()>;

    /// Push a message that only becomes visible to `poll` after `delay`
    /// has elapsed — used for retry backoff, pause re-checks, and the
    /// time-window synthetic stage.
    async fn push_delayed(&self, message: EngineMessage, delay: Duration) -> EngineResult<()>;

    /// Pop the next visible message, if any, hiding it from further
    /// `poll` calls until `ack`, `nack`, or the visibility timeout elapses.
    /// A `nack` returns the message to the queue immediately, available
    /// again for the next `poll`.
    async fn poll(&self) -> EngineResult<Option<(EngineMessage, AckToken)>>;

    async fn ack(&self, token: AckToken) -> EngineResult<()>;

    async fn nack(&self, token: AckToken) -> EngineResult<()>;

    async fn stats(&self) -> EngineResult<QueueStats>;
}

struct Entry {
    id: u64,
    message: EngineMessage,
    ready_at: Instant,
}

struct InFlight {
    message: EngineMessage,
    expires_at: Instant,
}

struct State {
    pending: VecDeque<Entry>,
    in_flight: std::collections::HashMap<u64, InFlight>,
    next_id: u64,
}

/// In-memory `Queue` reference implementation. Not crash-safe — it exists
/// purely so handlers and end-to-end scenarios can be exercised without a
/// real broker.
#[derive(Debug)]
pub struct InMemoryQueue {
    visibility_timeout: Duration,
    state: Mutex<State>,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            visibility_timeout,
            state: Mutex::new(State {
                pending: VecDeque::new(),
                in_flight: std::collections::HashMap::new(),
                next_id: 0,
            }),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn push(&self, message: EngineMessage) -> EngineResult<()> {
        self.push_delayed(message, Duration::ZERO).await
    }

    async fn push_delayed(&self, message: EngineMessage, delay: Duration) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.pending.push_back(Entry {
            id,
            message,
            ready_at: Instant::now() + delay,
        });
        Ok(())
    }

    async fn poll(&self) -> EngineResult<Option<(EngineMessage, AckToken)>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        // Visibility timeout expiry: redeliver anything no one ack'd/nack'd
        // in time.
        let expired: Vec<u64> = state
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(entry) = state.in_flight.remove(&id) {
                state.pending.push_back(Entry {
                    id,
                    message: entry.message,
                    ready_at: now,
                });
            }
        }

        let Some(pos) = state.pending.iter().position(|e| e.ready_at <= now) else {
            return Ok(None);
        };
        let entry = state.pending.remove(pos).expect("position just located");
        let token = AckToken(entry.id);
        state.in_flight.insert(
            entry.id,
            InFlight {
                message: entry.message.clone(),
                expires_at: now + self.visibility_timeout,
            },
        );
        Ok(Some((entry.message, token)))
    }

    async fn ack(&self, token: AckToken) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&token.0);
        Ok(())
    }

    async fn nack(&self, token: AckToken) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        match state.in_flight.remove(&token.0) {
            Some(entry) => {
                state.pending.push_front(Entry {
                    id: token.0,
                    message: entry.message,
                    ready_at: Instant::now(),
                });
                Ok(())
            }
            None => Err(EngineError::Queue(format!(
                "nack for unknown or already-acked token {:?}",
                token.0
            ))),
        }
    }

    async fn stats(&self) -> EngineResult<QueueStats> {
        let state = self.state.lock().await;
        Ok(QueueStats {
            ready: state.pending.len(),
            in_flight: state.in_flight.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionId, ExecutionType};

    fn msg(id: ExecutionId) -> EngineMessage {
        EngineMessage::StartExecution {
            execution_type: ExecutionType::Pipeline,
            execution_id: id,
        }
    }

    #[tokio::test]
    async fn push_then_poll_round_trips() {
        let queue = InMemoryQueue::default();
        let id = ExecutionId::new();
        queue.push(msg(id)).await.unwrap();

        let (received, token) = queue.poll().await.unwrap().unwrap();
        assert_eq!(received.execution_id(), id);
        queue.ack(token).await.unwrap();

        assert!(queue.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nack_makes_message_immediately_available_again() {
        let queue = InMemoryQueue::default();
        let id = ExecutionId::new();
        queue.push(msg(id)).await.unwrap();

        let (_received, token) = queue.poll().await.unwrap().unwrap();
        queue.nack(token).await.unwrap();

        let (received_again, _token2) = queue.poll().await.unwrap().unwrap();
        assert_eq!(received_again.execution_id(), id);
    }

    #[tokio::test]
    async fn delayed_push_is_not_visible_immediately() {
        let queue = InMemoryQueue::default();
        let id = ExecutionId::new();
        queue
            .push_delayed(msg(id), Duration::from_millis(50))
            .await
            .unwrap();

        assert!(queue.poll().await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(queue.poll().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn visibility_timeout_redelivers_unacked_message() {
        let queue = InMemoryQueue::new(Duration::from_millis(20));
        let id = ExecutionId::new();
        queue.push(msg(id)).await.unwrap();

        let (_received, _token) = queue.poll().await.unwrap().unwrap();
        assert!(queue.poll().await.unwrap().is_none(), "hidden while in flight");

        tokio::time::sleep(Duration::from_millis(30)).await;
        let redelivered = queue.poll().await.unwrap();
        assert!(redelivered.is_some(), "redelivered after visibility timeout");
    }

    #[tokio::test]
    async fn stats_reports_ready_and_in_flight_counts() {
        let queue = InMemoryQueue::default();
        queue.push(msg(ExecutionId::new())).await.unwrap();
        queue.push(msg(ExecutionId::new())).await.unwrap();
        let _ = queue.poll().await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.in_flight, 1);
    }
}
