//! In-process request coalescing
//!
//! Maps each digest to the delivery of its single in-flight acquisition.
//! The table is the only shared mutable state of a cache instance and is
//! touched only from here.

use crate::cache::delivery::{Delivery, Publisher, ReadStream};
use crate::cache::digest::Digest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Outcome of joining the pending table
pub enum Join {
    /// Another request is already acquiring this digest
    Attached(ReadStream),
    /// The caller owns a new acquisition and must drive `publisher`
    Started(ReadStream, Publisher),
}

/// Table of in-flight deliveries keyed by digest
#[derive(Debug, Clone, Default)]
pub struct Pending {
    table: Arc<Mutex<HashMap<Digest, Arc<Delivery>>>>,
}

impl Pending {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the in-flight delivery for `digest`, or start a new one
    pub fn join(&self, digest: &Digest) -> Join {
        let mut table = self.lock();

        if let Some(delivery) = table.get(digest) {
            debug!("Coalescing request for {}", digest);
            return Join::Attached(delivery.subscribe());
        }

        let delivery = Delivery::new();
        let stream = delivery.subscribe();
        table.insert(digest.clone(), delivery.clone());

        let pending = self.clone();
        let key = digest.clone();
        let owned = delivery.clone();
        let publisher = Publisher::new(delivery, move || pending.detach(&key, &owned));

        Join::Started(stream, publisher)
    }

    /// Number of digests currently being acquired
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn detach(&self, digest: &Digest, delivery: &Arc<Delivery>) {
        let mut table = self.lock();
        // Only remove our own entry; a later acquisition may have replaced it.
        if table
            .get(digest)
            .is_some_and(|current| Arc::ptr_eq(current, delivery))
        {
            table.remove(digest);
            debug!("Detached pending delivery for {}", digest);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Digest, Arc<Delivery>>> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn digest(c: char) -> Digest {
        Digest::parse(&c.to_string().repeat(64)).unwrap()
    }

    #[tokio::test]
    async fn second_request_attaches() {
        let pending = Pending::new();
        let d = digest('a');

        let Join::Started(first, mut publisher) = pending.join(&d) else {
            panic!("first request should start an acquisition");
        };
        let Join::Attached(second) = pending.join(&d) else {
            panic!("second request should attach");
        };
        assert_eq!(pending.len(), 1);

        let producer = tokio::spawn(async move {
            publisher.send(Bytes::from_static(b"shared"));
            publisher.finish();
        });

        let (a, b) = tokio::join!(first.read_to_end(), second.read_to_end());
        producer.await.unwrap();
        assert_eq!(a.unwrap(), b"shared");
        assert_eq!(b.unwrap(), b"shared");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn detaches_on_first_event() {
        let pending = Pending::new();
        let d = digest('b');

        let Join::Started(stream, publisher) = pending.join(&d) else {
            panic!("expected a new acquisition");
        };
        assert_eq!(pending.len(), 1);

        publisher.finish();
        assert!(pending.is_empty());
        assert!(stream.read_to_end().await.unwrap().is_empty());

        // A request after detachment starts over.
        let again = pending.join(&d);
        assert!(matches!(again, Join::Started(..)));
    }

    #[tokio::test]
    async fn stale_detach_keeps_newer_entry() {
        let pending = Pending::new();
        let d = digest('c');

        let Join::Started(_old_stream, _old_publisher) = pending.join(&d) else {
            panic!("expected a new acquisition");
        };
        let stale = pending.lock().get(&d).cloned().unwrap();
        pending.lock().remove(&d);

        let Join::Started(_stream, _publisher) = pending.join(&d) else {
            panic!("expected a new acquisition");
        };
        pending.detach(&d, &stale);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn distinct_digests_do_not_coalesce() {
        let pending = Pending::new();
        let first = pending.join(&digest('d'));
        let second = pending.join(&digest('e'));
        assert!(matches!(first, Join::Started(..)));
        assert!(matches!(second, Join::Started(..)));
        assert_eq!(pending.len(), 2);

        drop((first, second));
        assert!(pending.is_empty());
    }
}
