//! Bounded hand-off between the producer task and the single consumer.
//!
//! When the consumer falls behind, the oldest undelivered item is dropped so
//! the consumer always sees the freshest state.

use crate::error::{StreamError, StreamResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

enum Terminal {
    /// Producer failed; the error is handed out once, after queued items.
    Failed(Option<StreamError>),
    /// Consumer closed the session.
    Closed,
}

struct Inner<T> {
    items: VecDeque<T>,
    terminal: Option<Terminal>,
}

pub struct BatchQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> BatchQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                terminal: None,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue an item. Returns true if the oldest item was evicted.
    /// Items pushed after termination are discarded.
    pub fn push(&self, item: T) -> bool {
        let evicted = {
            let mut inner = self.inner.lock();
            if inner.terminal.is_some() {
                return false;
            }
            let evicted = if inner.items.len() >= self.capacity {
                inner.items.pop_front().is_some()
            } else {
                false
            };
            inner.items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Record a producer failure. Queued items are still delivered first.
    pub fn fail(&self, error: StreamError) {
        {
            let mut inner = self.inner.lock();
            if inner.terminal.is_some() {
                return;
            }
            inner.terminal = Some(Terminal::Failed(Some(error)));
        }
        self.notify.notify_one();
    }

    /// Close from the consumer side: pending items are discarded.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.items.clear();
            inner.terminal = Some(Terminal::Closed);
        }
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<StreamResult<T>> {
        let mut inner = self.inner.lock();
        if let Some(item) = inner.items.pop_front() {
            return Some(Ok(item));
        }
        match inner.terminal.as_mut() {
            Some(Terminal::Failed(error)) => {
                Some(Err(error.take().unwrap_or(StreamError::SessionClosed)))
            }
            Some(Terminal::Closed) => Some(Err(StreamError::SessionClosed)),
            None => None,
        }
    }

    /// Wait for the next item. After termination the producer's error is
    /// returned once, then `SessionClosed` on every call.
    pub async fn pop(&self) -> StreamResult<T> {
        loop {
            if let Some(result) = self.try_pop() {
                return result;
            }
            self.notify.notified().await;
        }
    }
}
