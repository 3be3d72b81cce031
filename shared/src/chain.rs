//! Chain recalculation for product stock ledgers
//!
//! A product's movement history forms a chain ordered by time (insertion
//! order breaking ties): the first entry starts from a baseline of 0 and
//! every later entry's
//! `before` equals the previous entry's `after`. Inserting, editing, or
//! deleting a historical entry disturbs every entry after it, so the chain
//! must be rebuilt. The rebuild preserves each untouched entry's delta
//! (`after - before` as stored) and rebases it onto the new running total.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One ledger row as the recalculation walk sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub id: Uuid,
    pub before: i64,
    pub after: i64,
}

impl ChainEntry {
    pub fn new(id: Uuid, before: i64, after: i64) -> Self {
        Self { id, before, after }
    }

    /// The quantity change this entry represents, as currently stored
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// A row whose stored `before`/`after` values must be rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRewrite {
    pub id: Uuid,
    pub before: i64,
    pub after: i64,
}

impl ChainRewrite {
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// Result of one recalculation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Rows whose stored values changed. Proportional to the disturbed
    /// suffix, not the whole history.
    pub rewrites: Vec<ChainRewrite>,
    /// Terminal stock of the rebuilt chain (0 for an empty chain)
    pub terminal_stock: i64,
    /// Lowest `after` anywhere in the rebuilt chain (0 for an empty chain)
    pub min_after: i64,
}

impl ChainOutcome {
    /// True if the rebuilt chain would drive stock negative at any point
    pub fn goes_negative(&self) -> bool {
        self.min_after < 0
    }
}

/// A violated chain invariant. Indicates a bug or out-of-band data damage;
/// callers surface this loudly rather than patching it silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("movement {id} breaks chain continuity: before={found}, expected {expected}")]
    Discontinuity {
        id: Uuid,
        expected: i64,
        found: i64,
    },
}

/// Rebuild a movement chain after a mutation.
///
/// `entries` is the full chain in chronological order, already reflecting
/// the structural change:
///
/// - **Delete**: the removed row is absent from `entries`.
/// - **Insert** (including out-of-order): the new row is present at its
///   chronological position with `before = 0, after = delta`, so its stored
///   delta equals the requested quantity change.
/// - **Edit**: the row is present (re-sorted if its timestamp changed) and
///   `pinned` carries its id and the caller-supplied target `after`.
///
/// The walk starts from a running total of 0; repositioning or deleting the
/// first movement therefore shifts the whole chain's baseline back to 0.
pub fn rebuild_chain(entries: &[ChainEntry], pinned: Option<(Uuid, i64)>) -> ChainOutcome {
    let mut running = 0i64;
    let mut min_after: Option<i64> = None;
    let mut rewrites = Vec::new();

    for entry in entries {
        let after = match pinned {
            // The edited entry takes the caller's target value; its original
            // delta is captured by the caller before this pass.
            Some((id, target)) if id == entry.id => target,
            _ => running + entry.delta(),
        };

        if entry.before != running || entry.after != after {
            rewrites.push(ChainRewrite {
                id: entry.id,
                before: running,
                after,
            });
        }

        running = after;
        min_after = Some(min_after.map_or(after, |m| m.min(after)));
    }

    ChainOutcome {
        rewrites,
        terminal_stock: running,
        min_after: min_after.unwrap_or(0),
    }
}

/// Check chain continuity: baseline 0, and every `before` equal to the
/// previous `after`.
pub fn verify_chain(entries: &[ChainEntry]) -> Result<(), ChainViolation> {
    let mut expected = 0i64;
    for entry in entries {
        if entry.before != expected {
            return Err(ChainViolation::Discontinuity {
                id: entry.id,
                expected,
                found: entry.before,
            });
        }
        expected = entry.after;
    }
    Ok(())
}
