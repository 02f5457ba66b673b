//! Outfit and keyword distribution preview.
//!
//! Reads SPID (`*_DISTR.ini`) and SkyPatcher npc rule files, and works out for
//! every actor in a data snapshot which outfit (and which keywords) the rules
//! assign, which entry wins, and where entries fight over the same actor.
//!
//! ```text
//! loader::discover ─▶ parse_rules ─▶ Vec<DistributionFile> ─┐
//!                                                           ├─▶ resolve_with ─▶ ResolutionReport
//! loader::load_snapshot ─▶ DataSnapshot { forms, npcs } ────┘
//! ```
//!
//! Nothing is rolled: chance-gated entries are reported with their chance and
//! take part in winner selection like any other entry.

#[macro_use]
mod macros;

mod api;
mod engine;

pub mod assignment;
pub mod distribution;
pub mod error;
pub mod form;
pub mod loader;
pub mod npc;
pub mod parser;
pub mod store;

pub use api::{Context, Options, ResolutionReport, resolve, resolve_with};
pub use assignment::{AssignmentStats, NpcOutfitAssignment, OutfitDistribution, UnresolvedDistribution};
pub use distribution::{
    Dialect, DistributionEntry, DistributionFile, DistributionLine, DistributionTarget, FormFilter, KeywordFilter,
    LevelRange, LineKind, TargetCategory, TraitFilters,
};
pub use engine::{CancellationToken, FilterMask, PassMetrics, aggregate, describe, matches};
pub use error::{Error, Result};
pub use form::{FormIndex, FormKey, FormKind, FormRecord};
pub use npc::{DataSnapshot, NpcFilterData};
pub use parser::{RuleSource, parse as parse_rules};
pub use store::{AssignmentStore, PassTicket};
