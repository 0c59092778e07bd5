//! Latest-value publish/subscribe
//!
//! A [`Topic`] hands each published value to every live subscriber. Each
//! subscription is a crossbeam channel of capacity one: when a subscriber
//! has not consumed the previous value, the publisher evicts it before
//! sending, so a reader only ever sees the newest report and nothing queues
//! up behind a slow consumer.
//!
//! A new subscription starts with the current latest value (if any), so a
//! reader that subscribes after the first publish still has data to read.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

struct Subscriber<T> {
    tx: Sender<T>,
    /// Publisher-side handle used to evict an unread value
    evict: Receiver<T>,
    alive: Weak<()>,
}

struct TopicInner<T> {
    latest: Option<T>,
    generation: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// Latest-value topic
pub struct Topic<T> {
    inner: Arc<Mutex<TopicInner<T>>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> Topic<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TopicInner {
                latest: None,
                generation: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Replace the latest value and hand it to every subscriber
    pub fn publish(&self, value: T) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        inner.subscribers.retain(|sub| sub.alive.strong_count() > 0);
        for sub in &inner.subscribers {
            offer(sub, value.clone());
        }

        inner.latest = Some(value);
        inner.generation += 1;
    }

    /// Subscribe, starting from the current latest value
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = bounded(1);
        let token = Arc::new(());
        let sub = Subscriber {
            tx,
            evict: rx.clone(),
            alive: Arc::downgrade(&token),
        };

        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(latest) = inner.latest.clone() {
            offer(&sub, latest);
        }
        inner.subscribers.push(sub);

        Subscription { rx, _token: token }
    }

    /// Most recently published value
    pub fn latest(&self) -> Option<T> {
        self.inner.lock().ok().and_then(|inner| inner.latest.clone())
    }

    /// Number of values published so far
    pub fn generation(&self) -> u64 {
        self.inner.lock().map(|inner| inner.generation).unwrap_or(0)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .subscribers
                    .iter()
                    .filter(|sub| sub.alive.strong_count() > 0)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Send `value`, evicting an unread one if the slot is full
fn offer<T>(sub: &Subscriber<T>, value: T) {
    match sub.tx.try_send(value) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(value)) => {
            let _ = sub.evict.try_recv();
            let _ = sub.tx.try_send(value);
        }
    }
}

/// Reader side of a [`Topic`]
pub struct Subscription<T> {
    rx: Receiver<T>,
    _token: Arc<()>,
}

impl<T> Subscription<T> {
    /// Newest value published since the last call, if any
    pub fn update(&self) -> Option<T> {
        let mut newest = None;
        while let Ok(value) = self.rx.try_recv() {
            newest = Some(value);
        }
        newest
    }

    /// Block up to `timeout` for a value
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        if let Some(value) = self.update() {
            return Some(value);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
