//! Deferred request queues.
//!
//! A process defers a request when its own claim on the same resource has
//! priority. Deferred requests are acknowledged later, in the same
//! `(timestamp, requester)` order used to decide who gets a resource.

use citygate_types::{ProcessId, Request, ResourceId, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from inserting into a bounded deferred queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredQueueError {
    /// The queue is full; the request was not buffered and will not be acked.
    #[error("deferred queue for {resource} is full ({capacity} entries)")]
    AtCapacity {
        resource: ResourceId,
        capacity: usize,
    },
}

/// Ordered set of postponed requests for one resource.
///
/// No two entries share `(requester, timestamp)`. Draining goes from highest
/// priority (oldest timestamp, then lowest process id) down.
#[derive(Debug, Clone)]
pub struct DeferredQueue {
    resource: ResourceId,
    entries: BTreeSet<Request>,
    capacity: Option<usize>,
}

impl DeferredQueue {
    /// Create an unbounded queue.
    pub fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            entries: BTreeSet::new(),
            capacity: None,
        }
    }

    /// Create a queue holding at most `capacity` requests.
    pub fn with_capacity(resource: ResourceId, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(resource)
        }
    }

    /// Buffer a request.
    ///
    /// Returns `Ok(false)` if the same `(requester, timestamp)` is already queued.
    pub fn insert(&mut self, request: Request) -> Result<bool, DeferredQueueError> {
        debug_assert_eq!(request.resource, self.resource, "request for another queue");

        if self.entries.contains(&request) {
            return Ok(false);
        }
        if let Some(capacity) = self.capacity {
            if self.entries.len() >= capacity {
                return Err(DeferredQueueError::AtCapacity {
                    resource: self.resource,
                    capacity,
                });
            }
        }
        Ok(self.entries.insert(request))
    }

    /// Check whether a request from `requester` stamped `timestamp` is queued.
    pub fn contains(&self, requester: ProcessId, timestamp: Timestamp) -> bool {
        self.entries
            .contains(&Request::new(requester, timestamp, self.resource))
    }

    /// Remove and return every request, highest priority first.
    pub fn drain(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One deferred queue per resource, created on first use.
#[derive(Debug, Clone, Default)]
pub struct DeferredQueues {
    queues: BTreeMap<ResourceId, DeferredQueue>,
    capacity: Option<usize>,
}

impl DeferredQueues {
    /// Create a set of queues, each bounded by `capacity` if given.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            queues: BTreeMap::new(),
            capacity,
        }
    }

    /// Buffer a request in its resource's queue.
    pub fn insert(&mut self, request: Request) -> Result<bool, DeferredQueueError> {
        let capacity = self.capacity;
        self.queues
            .entry(request.resource)
            .or_insert_with(|| match capacity {
                Some(capacity) => DeferredQueue::with_capacity(request.resource, capacity),
                None => DeferredQueue::new(request.resource),
            })
            .insert(request)
    }

    /// Get the queue of a resource, if anything was ever deferred for it.
    pub fn queue(&self, resource: ResourceId) -> Option<&DeferredQueue> {
        self.queues.get(&resource)
    }

    /// Number of requests deferred for a resource.
    pub fn len_for(&self, resource: ResourceId) -> usize {
        self.queue(resource).map_or(0, DeferredQueue::len)
    }

    /// Remove and return every request deferred for a resource, highest priority first.
    pub fn drain(&mut self, resource: ResourceId) -> Vec<Request> {
        self.queues
            .get_mut(&resource)
            .map(DeferredQueue::drain)
            .unwrap_or_default()
    }

    /// Total number of deferred requests across all resources.
    pub fn total_len(&self) -> usize {
        self.queues.values().map(DeferredQueue::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(ts: u64, pid: u32) -> Request {
        Request::new(ProcessId(pid), Timestamp(ts), ResourceId(0))
    }

    #[test]
    fn test_duplicate_insert_is_a_no_op() {
        let mut queue = DeferredQueue::new(ResourceId(0));
        assert_eq!(queue.insert(req(3, 5)), Ok(true));
        assert_eq!(queue.insert(req(3, 5)), Ok(false));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(ProcessId(5), Timestamp(3)));
    }

    #[test]
    fn test_same_requester_new_timestamp_is_distinct() {
        let mut queue = DeferredQueue::new(ResourceId(0));
        queue.insert(req(3, 5)).unwrap();
        queue.insert(req(8, 5)).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_order_is_timestamp_then_pid() {
        let mut queue = DeferredQueue::new(ResourceId(0));
        for (ts, pid) in [(3, 5), (1, 9), (1, 2)] {
            queue.insert(req(ts, pid)).unwrap();
        }
        let drained: Vec<_> = queue
            .drain()
            .into_iter()
            .map(|r| (r.timestamp.0, r.requester.0))
            .collect();
        assert_eq!(drained, vec![(1, 2), (1, 9), (3, 5)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bounded_queue_rejects_when_full() {
        let mut queue = DeferredQueue::with_capacity(ResourceId(0), 2);
        queue.insert(req(1, 1)).unwrap();
        queue.insert(req(2, 2)).unwrap();
        assert_eq!(
            queue.insert(req(3, 3)),
            Err(DeferredQueueError::AtCapacity {
                resource: ResourceId(0),
                capacity: 2
            })
        );
        // A duplicate of a queued entry is still accepted as a no-op.
        assert_eq!(queue.insert(req(1, 1)), Ok(false));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queues_are_per_resource() {
        let mut queues = DeferredQueues::new(None);
        queues
            .insert(Request::new(ProcessId(1), Timestamp(4), ResourceId(0)))
            .unwrap();
        queues
            .insert(Request::new(ProcessId(2), Timestamp(4), ResourceId(1)))
            .unwrap();
        assert_eq!(queues.len_for(ResourceId(0)), 1);
        assert_eq!(queues.len_for(ResourceId(1)), 1);
        assert_eq!(queues.total_len(), 2);

        let drained = queues.drain(ResourceId(1));
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].requester, ProcessId(2));
        assert_eq!(queues.total_len(), 1);
        assert!(queues.drain(ResourceId(7)).is_empty());
    }

    #[test]
    fn test_queues_inherit_capacity() {
        let mut queues = DeferredQueues::new(Some(1));
        queues.insert(req(1, 1)).unwrap();
        assert!(queues.insert(req(2, 2)).is_err());
    }
}
