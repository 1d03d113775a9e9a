//! First-come, first-served gate that lets one load run at a time.
//!
//! A [`Ticket`] is taken on the thread that requests the load, which fixes
//! its place in line. The worker thread later trades it for a
//! [`LoadPermit`]. The permit is `Send`, so it can ride along with the
//! "loading finished" task onto the UI thread; dropping it lets the next
//! ticket through.

use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

#[derive(Default)]
struct GateState {
    next_ticket: u64,
    now_serving: u64,
    abandoned: BTreeSet<u64>,
}

impl GateState {
    /// Moves past the current holder and any abandoned tickets behind it.
    fn advance(&mut self) {
        self.now_serving += 1;
        while self.abandoned.remove(&self.now_serving) {
            self.now_serving += 1;
        }
    }
}

/// Mutual-exclusion resource owned by one load coordinator.
#[derive(Default)]
pub struct LoadGate {
    state: Mutex<GateState>,
    turn: Condvar,
}

impl LoadGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves the next place in line.
    pub fn take_ticket(self: &Arc<Self>) -> Ticket {
        let mut state = self.lock();
        let number = state.next_ticket;
        state.next_ticket += 1;
        Ticket {
            gate: Arc::clone(self),
            number,
            redeemed: false,
        }
    }

    /// Whether a permit is held or tickets are waiting.
    pub fn is_busy(&self) -> bool {
        let state = self.lock();
        state.now_serving != state.next_ticket
    }

    fn release(&self) {
        let mut state = self.lock();
        state.advance();
        self.turn.notify_all();
    }

    fn abandon(&self, number: u64) {
        let mut state = self.lock();
        if state.now_serving == number {
            state.advance();
            self.turn.notify_all();
        } else {
            state.abandoned.insert(number);
        }
    }
}

/// A reserved place in line. Dropping it unused gives the place up.
pub struct Ticket {
    gate: Arc<LoadGate>,
    number: u64,
    redeemed: bool,
}

impl Ticket {
    /// Blocks until every earlier ticket has been served.
    pub fn wait(mut self) -> LoadPermit {
        self.redeemed = true;
        let mut state = self.gate.lock();
        while state.now_serving != self.number {
            state = self
                .gate
                .turn
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        drop(state);

        LoadPermit {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.redeemed {
            self.gate.abandon(self.number);
        }
    }
}

/// Exclusive right to mutate the coordinator's state. Released on drop.
#[must_use = "the gate is released as soon as the permit is dropped"]
pub struct LoadPermit {
    gate: Arc<LoadGate>,
}

impl Drop for LoadPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_are_granted_in_ticket_order() {
        let gate = LoadGate::new();
        let first = gate.take_ticket();
        let second = gate.take_ticket();
        let third = gate.take_ticket();
        let (tx, rx) = mpsc::channel();

        // Start the waiters in reverse order; they must still finish in order.
        let handles: Vec<_> = [(3, third), (2, second)]
            .into_iter()
            .map(|(id, ticket)| {
                let tx = tx.clone();
                thread::spawn(move || {
                    let _permit = ticket.wait();
                    tx.send(id).unwrap();
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        {
            let _permit = first.wait();
            tx.send(1).unwrap();
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let order: Vec<i32> = rx.try_iter().collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn permit_can_be_released_on_another_thread() {
        let gate = LoadGate::new();
        let permit = gate.take_ticket().wait();
        assert!(gate.is_busy());

        thread::spawn(move || drop(permit)).join().unwrap();

        assert!(!gate.is_busy());
        let _again = gate.take_ticket().wait();
    }

    #[test]
    fn dropped_tickets_do_not_stall_the_line() {
        let gate = LoadGate::new();
        let first = gate.take_ticket();
        let skipped = gate.take_ticket();
        let last = gate.take_ticket();

        drop(skipped);
        drop(first.wait());

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _permit = last.wait();
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn dropping_the_current_ticket_passes_the_turn() {
        let gate = LoadGate::new();
        let first = gate.take_ticket();
        let second = gate.take_ticket();

        drop(first);

        let _permit = second.wait();
        assert!(gate.is_busy());
    }
}
