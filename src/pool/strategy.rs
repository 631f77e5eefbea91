// src/pool/strategy.rs

//! Ordering policies for pool members.
//!
//! A [`Strategy`] sees only the read-only [`Schedulable`] view of each
//! member and returns them in the order workers should pick them up.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use crate::types::{Key, Priority, StrategyKind};

/// What a strategy may know about a pool member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedulable {
    key: Key,
    timeout: Option<Duration>,
    priority: Priority,
    position: usize,
}

impl Schedulable {
    /// A zero timeout is treated as no timeout.
    pub fn new(
        key: impl Into<Key>,
        timeout: Option<Duration>,
        priority: Priority,
        position: usize,
    ) -> Self {
        Self {
            key: key.into(),
            timeout: timeout.filter(|t| !t.is_zero()),
            priority,
            position,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Submission order within the pool, starting at 0.
    pub fn position(&self) -> usize {
        self.position
    }
}

pub trait Strategy: Send + Sync + fmt::Debug {
    /// Return `items` in execution order.
    fn schedule(&self, items: Vec<Schedulable>) -> Vec<Schedulable>;
}

/// Ascending timeout with "no timeout" last.
fn by_timeout(a: &Schedulable, b: &Schedulable) -> Ordering {
    match (a.timeout, b.timeout) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Highest priority first, then shortest timeout, then submission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityFirst;

impl Strategy for PriorityFirst {
    fn schedule(&self, mut items: Vec<Schedulable>) -> Vec<Schedulable> {
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| by_timeout(a, b))
                .then_with(|| a.position.cmp(&b.position))
        });
        items
    }
}

/// Shortest timeout first; ties keep submission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestTimeoutFirst;

impl Strategy for ShortestTimeoutFirst {
    fn schedule(&self, mut items: Vec<Schedulable>) -> Vec<Schedulable> {
        items.sort_by(|a, b| by_timeout(a, b).then_with(|| a.position.cmp(&b.position)));
        items
    }
}

/// Submission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl Strategy for Fifo {
    fn schedule(&self, mut items: Vec<Schedulable>) -> Vec<Schedulable> {
        items.sort_by_key(|s| s.position);
        items
    }
}

impl From<StrategyKind> for Box<dyn Strategy> {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Priority => Box::new(PriorityFirst),
            StrategyKind::ShortestTimeout => Box::new(ShortestTimeoutFirst),
            StrategyKind::Fifo => Box::new(Fifo),
        }
    }
}

/// Run `strategy` and return member positions in execution order.
///
/// The result always names every position exactly once: positions the
/// strategy dropped are appended in submission order, duplicates and
/// unknown positions are ignored.
pub fn execution_order(strategy: &dyn Strategy, items: Vec<Schedulable>) -> Vec<usize> {
    let total = items.len();
    let scheduled = strategy.schedule(items);

    let mut seen = vec![false; total];
    let mut order = Vec::with_capacity(total);
    let mut ignored = 0usize;
    for item in scheduled {
        match seen.get_mut(item.position) {
            Some(slot) if !*slot => {
                *slot = true;
                order.push(item.position);
            }
            _ => ignored += 1,
        }
    }

    let missing = seen
        .iter()
        .enumerate()
        .filter(|(_, s)| !**s)
        .map(|(pos, _)| pos)
        .collect::<Vec<_>>();
    if ignored > 0 || !missing.is_empty() {
        warn!(
            ?strategy,
            ignored,
            missing = missing.len(),
            "strategy returned an inconsistent schedule; normalizing"
        );
    }
    order.extend(missing);

    debug!(?order, "pool execution order");
    order
}
