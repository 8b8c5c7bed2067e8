//! Bounded referrer chain traversal
//!
//! The walk is an explicit loop with an accumulator and a visited set. The
//! storage lookup is done by the caller, [`ChainWalker`] only decides what to
//! fetch next and when to stop.

use rustc_hash::FxHashSet;

use super::models::Distributor;
use crate::core_types::DistributorId;

/// Why a chain walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStop {
    /// `max_depth` members collected
    MaxDepth,
    /// Topmost member has no referrer
    Root,
    /// A referenced distributor does not exist
    Missing(DistributorId),
    /// A referenced distributor is disabled
    Disabled(DistributorId),
    /// A referenced distributor is already in the chain
    Cycle(DistributorId),
}

/// Referrer chain, nearest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferrerChain {
    pub members: Vec<Distributor>,
    pub stop: ChainStop,
}

impl ReferrerChain {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug)]
pub struct ChainWalker {
    max_depth: usize,
    pending: Option<DistributorId>,
    visited: FxHashSet<DistributorId>,
    members: Vec<Distributor>,
    stop: ChainStop,
}

impl ChainWalker {
    pub fn new(start: DistributorId, max_depth: usize) -> Self {
        Self {
            max_depth,
            pending: (max_depth > 0).then_some(start),
            visited: FxHashSet::default(),
            members: Vec::with_capacity(max_depth.min(16)),
            stop: ChainStop::MaxDepth,
        }
    }

    /// Distributor id to load next, `None` once the walk is over
    #[inline]
    pub fn pending(&self) -> Option<DistributorId> {
        self.pending
    }

    /// Feed the lookup result for [`Self::pending`]
    pub fn visit(&mut self, found: Option<Distributor>) {
        let Some(expected) = self.pending.take() else {
            return;
        };

        let distributor = match found {
            Some(d) => d,
            None => {
                self.stop = ChainStop::Missing(expected);
                return;
            }
        };
        if !distributor.is_active() {
            self.stop = ChainStop::Disabled(distributor.id);
            return;
        }

        self.visited.insert(distributor.id);
        let next = distributor.referrer_id;
        self.members.push(distributor);

        if self.members.len() >= self.max_depth {
            self.stop = ChainStop::MaxDepth;
            return;
        }
        match next {
            None => self.stop = ChainStop::Root,
            Some(id) if self.visited.contains(&id) => {
                tracing::warn!(
                    distributor_id = id,
                    depth = self.members.len(),
                    "Referrer cycle detected - chain truncated"
                );
                self.stop = ChainStop::Cycle(id);
            }
            Some(id) => self.pending = Some(id),
        }
    }

    pub fn finish(self) -> ReferrerChain {
        ReferrerChain {
            members: self.members,
            stop: self.stop,
        }
    }
}
