use crate::config::schema::OverlapPolicy;
use crate::event::Settings;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Last received settings per key context.
#[derive(Debug, Default)]
pub struct SettingsCache {
    by_context: HashMap<String, Arc<Settings>>,
}

impl SettingsCache {
    /// Replace the context's settings wholesale and return the new snapshot.
    pub fn replace(&mut self, context: &str, settings: Settings) -> Arc<Settings> {
        let snapshot = Arc::new(settings);
        self.by_context
            .insert(context.to_string(), Arc::clone(&snapshot));
        snapshot
    }

    /// Current snapshot; empty if nothing was received yet.
    pub fn get(&self, context: &str) -> Arc<Settings> {
        self.by_context.get(context).cloned().unwrap_or_default()
    }

    pub fn remove(&mut self, context: &str) {
        self.by_context.remove(context);
    }

    pub fn len(&self) -> usize {
        self.by_context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_context.is_empty()
    }
}

/// One in-flight fade per key context.
///
/// Each claim takes a ticket when it is made; tickets are served in order, so
/// queued presses run in press order.
#[derive(Debug, Clone)]
pub struct SequenceLocks {
    policy: OverlapPolicy,
    lanes: Arc<Mutex<HashMap<String, Lane>>>,
}

#[derive(Debug)]
struct Lane {
    next_ticket: u64,
    turns: Arc<watch::Sender<Turns>>,
}

impl Lane {
    fn is_idle(&self) -> bool {
        self.turns.borrow().serving == self.next_ticket
    }
}

#[derive(Debug, Default)]
struct Turns {
    serving: u64,
    /// Tickets given up before their turn came.
    abandoned: BTreeSet<u64>,
}

impl Turns {
    fn finish(&mut self, ticket: u64) {
        if ticket != self.serving {
            self.abandoned.insert(ticket);
            return;
        }
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// A place in a context's queue. Dropping it unused gives the place up.
#[derive(Debug)]
pub struct Claim {
    ticket: u64,
    turns: Option<Arc<watch::Sender<Turns>>>,
}

impl Claim {
    /// Wait until every earlier claim for the context has finished.
    pub async fn acquire(mut self) -> SequenceGuard {
        if let Some(turns) = &self.turns {
            let ticket = self.ticket;
            let mut turn = turns.subscribe();
            // The sender lives in `self`, so this only returns on our turn.
            let _ = turn.wait_for(|t| t.serving == ticket).await;
        }
        SequenceGuard {
            ticket: self.ticket,
            turns: self.turns.take(),
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Some(turns) = self.turns.take() {
            turns.send_modify(|t| t.finish(self.ticket));
        }
    }
}

/// Held while a fade runs; dropping it admits the next claim.
#[derive(Debug)]
pub struct SequenceGuard {
    ticket: u64,
    turns: Option<Arc<watch::Sender<Turns>>>,
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        if let Some(turns) = self.turns.take() {
            turns.send_modify(|t| t.finish(self.ticket));
        }
    }
}

impl SequenceLocks {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            lanes: Arc::default(),
        }
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<String, Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the context's next turn. Returns `None` when a fade is running
    /// and the policy is `Drop`.
    pub fn claim(&self, context: &str) -> Option<Claim> {
        let mut lanes = self.lanes();
        let lane = lanes.entry(context.to_string()).or_insert_with(|| Lane {
            next_ticket: 0,
            turns: Arc::new(watch::Sender::new(Turns::default())),
        });

        if !lane.is_idle() && self.policy == OverlapPolicy::Drop {
            return None;
        }
        let ticket = lane.next_ticket;
        lane.next_ticket += 1;
        Some(Claim {
            ticket,
            turns: Some(Arc::clone(&lane.turns)),
        })
    }

    /// Drop the context's entry if nothing is running or waiting on it.
    pub fn forget(&self, context: &str) {
        let mut lanes = self.lanes();
        let idle = lanes
            .get(context)
            .is_some_and(|lane| lane.is_idle() && Arc::strong_count(&lane.turns) == 1);
        if idle {
            lanes.remove(context);
        }
    }

    /// Number of contexts currently tracked.
    pub fn len(&self) -> usize {
        self.lanes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
