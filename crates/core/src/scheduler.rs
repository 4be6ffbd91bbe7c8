//! GATT Scheduler (C2): the two-level priority queue serializing every write
//! and read the session issues against the [`Transport`](ble_link_transport::Transport).

use std::collections::VecDeque;

use ble_link_transport::{GattOp, GattOpKind, OpId, OpOutcome, Priority, Transport, TransportOpError};

/// Result of a completed [`GattOp`], handed back to `Scheduler::on_complete`.
pub struct Completion {
    /// The op this result belongs to.
    pub id: OpId,
    /// `Ok` with the op's outcome, or the transport's reported failure.
    pub result: Result<OpOutcome, TransportOpError>,
}

/// Serializes [`GattOp`]s onto a [`Transport`], one at a time, honoring the
/// two-level priority rule from §4.1: with priority enabled, high-priority
/// ops form a queue prefix and low-priority ops a suffix; inserting a new
/// high-priority op places it at that boundary, never ahead of an existing
/// high-priority op.
pub struct Scheduler {
    priority_enabled: bool,
    dequeue_before_processing: bool,
    pending: Option<GattOp>,
    queue: VecDeque<GattOp>,
    high_priority_len: usize,
}

impl Scheduler {
    /// Builds an empty scheduler.
    #[must_use]
    pub fn new(priority_enabled: bool, dequeue_before_processing: bool) -> Self {
        Self {
            priority_enabled,
            dequeue_before_processing,
            pending: None,
            queue: VecDeque::new(),
            high_priority_len: 0,
        }
    }

    /// Whether an op is currently dispatched and awaiting completion.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of ops waiting behind the pending one.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Enqueues a single op, dispatching it immediately via `transport` if
    /// nothing is currently pending.
    pub fn enqueue(&mut self, op: GattOp, transport: &mut dyn Transport) {
        self.enqueue_many(std::iter::once(op), transport);
    }

    /// Enqueues a batch of ops that all share one priority, inserting them
    /// contiguously at the appropriate queue boundary (§4.1: "A batch must be
    /// inserted contiguously at the appropriate boundary").
    pub fn enqueue_many(&mut self, ops: impl IntoIterator<Item = GattOp>, transport: &mut dyn Transport) {
        let mut ops = ops.into_iter().peekable();
        if ops.peek().is_none() {
            return;
        }

        if self.pending.is_none() {
            let mut ops = ops;
            if let Some(first) = ops.next() {
                self.dispatch(first, transport);
            }
            for op in ops {
                self.insert(op);
            }
            return;
        }

        for op in ops {
            self.insert(op);
        }
    }

    fn insert(&mut self, op: GattOp) {
        match (self.priority_enabled, op.priority) {
            (true, Priority::High) => {
                self.queue.insert(self.high_priority_len, op);
                self.high_priority_len += 1;
            }
            (true, Priority::Low) => self.queue.push_back(op),
            (false, _) => self.queue.push_back(op),
        }
    }

    fn dispatch(&mut self, mut op: GattOp, transport: &mut dyn Transport) {
        op.fire_on_execute();
        if matches!(op.priority, Priority::High) && self.priority_enabled {
            self.high_priority_len = self.high_priority_len.saturating_sub(1);
        }
        transport.dispatch(op.id, &op.kind);
        self.pending = Some(op);
    }

    /// Removes every queued op for which `predicate` returns `true`, without
    /// touching the currently-pending op. Used by flow control to strip
    /// queued `DspsChunk` writes on XOFF.
    pub fn retain_queued(&mut self, mut predicate: impl FnMut(&GattOpKind) -> bool) {
        let high_priority_len = &mut self.high_priority_len;
        let mut index = 0usize;
        self.queue.retain(|op| {
            let keep = predicate(&op.kind);
            if !keep && index < *high_priority_len {
                *high_priority_len -= 1;
            }
            index += 1;
            keep
        });
    }

    /// Drains every queued op for which `predicate` returns `true`, removing
    /// them from the queue and returning them in order. Used by flow control
    /// to move queued `DspsChunk` ops into the pending buffer.
    pub fn drain_queued(&mut self, mut predicate: impl FnMut(&GattOpKind) -> bool) -> Vec<GattOp> {
        let mut drained = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.queue.len());
        let mut new_high_priority_len = 0usize;
        for (index, op) in self.queue.drain(..).enumerate() {
            if predicate(&op.kind) {
                drained.push(op);
            } else {
                if index < self.high_priority_len {
                    new_high_priority_len += 1;
                }
                remaining.push_back(op);
            }
        }
        self.queue = remaining;
        self.high_priority_len = new_high_priority_len;
        drained
    }

    /// Processes the result of the op matching `completion.id` and advances
    /// the queue. Returns the outcome for the caller to route to the
    /// relevant engine (CodeLess or DSPS).
    ///
    /// If `dequeue_before_processing` is set, the next op is dispatched
    /// before this method returns, so the transport's callback may already
    /// be handling the next op's eventual result while this one is still
    /// being processed by the caller.
    pub fn on_complete(&mut self, completion: Completion, transport: &mut dyn Transport) -> Option<GattOp> {
        let Some(finished) = self.pending.take() else {
            return None;
        };
        debug_assert_eq!(finished.id, completion.id, "scheduler completion id mismatch");

        if self.dequeue_before_processing {
            self.dispatch_next(transport);
            Some(finished)
        } else {
            let result = Some(finished);
            self.dispatch_next(transport);
            result
        }
    }

    fn dispatch_next(&mut self, transport: &mut dyn Transport) {
        if let Some(next) = self.queue.pop_front() {
            self.dispatch(next, transport);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_link_test_support::FakeTransport;
    use ble_link_transport::Characteristic;

    fn chunk(id: u64, priority: Priority) -> GattOp {
        GattOp::new(
            OpId::new(id),
            GattOpKind::WriteCommand {
                characteristic: Characteristic::DspsServerRx,
                payload: vec![id as u8],
            },
            priority,
        )
    }

    #[test]
    fn scenario_s6_priority_insertion_order() {
        let (mut transport, _rx) = FakeTransport::new();
        let mut scheduler = Scheduler::new(true, false);

        // A1 dispatches immediately (nothing pending yet).
        scheduler.enqueue(chunk(1, Priority::Low), &mut transport);
        // A2, A3 queue as low priority; H inserts ahead of them; A4 appends after.
        scheduler.enqueue(chunk(2, Priority::Low), &mut transport);
        scheduler.enqueue(chunk(3, Priority::Low), &mut transport);
        scheduler.enqueue(chunk(4, Priority::High), &mut transport);
        scheduler.enqueue(chunk(5, Priority::Low), &mut transport);

        // Drive completions in dispatch order until the queue drains.
        while scheduler.has_pending() {
            let pending_id = transport.dispatched().last().unwrap().id();
            scheduler.on_complete(
                Completion { id: pending_id, result: Ok(OpOutcome::Written) },
                &mut transport,
            );
        }

        let order: Vec<u64> = transport.dispatched().iter().map(|op| op.id().get()).collect();
        assert_eq!(order, vec![1, 4, 2, 3, 5]);
    }
}
