//! Latest-report publication.
//!
//! Passes may be started from several threads (a reload triggered while an
//! earlier pass is still running). Each pass takes a [`PassTicket`] before it
//! starts; when it finishes it may only publish if no pass that started
//! *later* has already published. Readers always get a complete
//! [`ResolutionReport`] behind an `Arc`, never a partially built one.
//!
//! ```text
//! begin_pass ─▶ ticket 1 ──────────────── resolve ───────────▶ publish(1)  rejected
//! begin_pass ─▶ ticket 2 ─── resolve ──▶ publish(2)  accepted
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::api::{Context, Options, ResolutionReport, resolve_with};
use crate::distribution::DistributionFile;
use crate::npc::NpcFilterData;
use crate::Result;

/// Generation number handed out by [`AssignmentStore::begin_pass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassTicket(u64);

impl PassTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct Published {
    generation: u64,
    report: Option<Arc<ResolutionReport>>,
}

/// Holder of the most recently published report.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    next_generation: AtomicU64,
    published: RwLock<Published>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a generation for a pass about to start.
    pub fn begin_pass(&self) -> PassTicket {
        PassTicket(self.next_generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Publish `report` unless a newer pass already did. Returns whether the
    /// report was accepted.
    pub fn publish(&self, ticket: PassTicket, report: ResolutionReport) -> bool {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        if ticket.0 <= published.generation {
            debug!(ticket = ticket.0, current = published.generation, "discarding stale report");
            return false;
        }
        published.generation = ticket.0;
        published.report = Some(Arc::new(report));
        true
    }

    /// The latest published report, if any.
    pub fn current(&self) -> Option<Arc<ResolutionReport>> {
        self.published.read().unwrap_or_else(PoisonError::into_inner).report.clone()
    }

    /// Generation of the latest published report; 0 before the first publish.
    pub fn generation(&self) -> u64 {
        self.published.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Run a full pass and publish its result.
    ///
    /// A failed or cancelled pass publishes nothing and leaves the previous
    /// report in place. `Ok(false)` means the pass completed but was
    /// superseded.
    pub fn run(
        &self,
        files: &[DistributionFile],
        npcs: &[NpcFilterData],
        context: &Context<'_>,
        options: &Options,
    ) -> Result<bool> {
        let ticket = self.begin_pass();
        let report = resolve_with(files, npcs, context, options)?;
        Ok(self.publish(ticket, report))
    }
}
