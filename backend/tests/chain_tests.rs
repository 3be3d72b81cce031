//! Chain recalculation tests
//!
//! Covers the ledger chain properties:
//! - Chain continuity after any rebuild
//! - Terminal stock equals the sum of deltas
//! - Idempotent recomputation
//! - Delta conservation under edits

use proptest::prelude::*;
use uuid::Uuid;

use shared::chain::{rebuild_chain, verify_chain, ChainEntry, ChainOutcome};

fn entry(before: i64, after: i64) -> ChainEntry {
    ChainEntry::new(Uuid::new_v4(), before, after)
}

/// Build a contiguous chain from a list of deltas
fn chain_from_deltas(deltas: &[i64]) -> Vec<ChainEntry> {
    let mut running = 0i64;
    deltas
        .iter()
        .map(|delta| {
            let e = entry(running, running + delta);
            running += delta;
            e
        })
        .collect()
}

/// Apply an outcome's rewrites to an in-memory chain
fn apply_rewrites(chain: &[ChainEntry], outcome: &ChainOutcome) -> Vec<ChainEntry> {
    chain
        .iter()
        .map(|e| {
            outcome
                .rewrites
                .iter()
                .find(|rw| rw.id == e.id)
                .map(|rw| ChainEntry::new(e.id, rw.before, rw.after))
                .unwrap_or(*e)
        })
        .collect()
}

// ============================================================================
// Scenario Tests
// ============================================================================

mod scenarios {
    use super::*;

    /// Restock +10 then sale -3: chain is (0,10), (10,7), stock 7
    #[test]
    fn restock_then_sale() {
        let chain = chain_from_deltas(&[10, -3]);
        assert_eq!((chain[0].before, chain[0].after), (0, 10));
        assert_eq!((chain[1].before, chain[1].after), (10, 7));
        assert!(verify_chain(&chain).is_ok());
        assert_eq!(rebuild_chain(&chain, None).terminal_stock, 7);
    }

    /// Correcting the restock from 10 to 20 shifts the sale to (20, 17)
    /// while preserving its delta of -3
    #[test]
    fn restock_correction_shifts_sale() {
        let chain = chain_from_deltas(&[10, -3]);
        let restock_id = chain[0].id;

        let outcome = rebuild_chain(&chain, Some((restock_id, 20)));
        assert_eq!(outcome.terminal_stock, 17);

        let repaired = apply_rewrites(&chain, &outcome);
        assert_eq!((repaired[0].before, repaired[0].after), (0, 20));
        assert_eq!((repaired[1].before, repaired[1].after), (20, 17));
        assert_eq!(repaired[1].delta(), -3);
        assert!(verify_chain(&repaired).is_ok());
    }

    /// Deleting the restock leaves the sale starting from 0, which would
    /// drive stock to -3; the outcome flags this so the caller can reject
    /// the deletion
    #[test]
    fn deleting_seed_restock_flags_negative_stock() {
        let chain = chain_from_deltas(&[10, -3]);
        let without_restock = vec![chain[1]];

        let outcome = rebuild_chain(&without_restock, None);
        assert_eq!(outcome.terminal_stock, -3);
        assert_eq!(outcome.min_after, -3);
        assert!(outcome.goes_negative());
    }

    /// A backdated restock inserted at the front rebases every later
    /// movement without changing their deltas
    #[test]
    fn backdated_restock_rebases_suffix() {
        let original = chain_from_deltas(&[10, -4]);
        let inserted = entry(0, 5);
        let chain = vec![inserted, original[0], original[1]];

        let outcome = rebuild_chain(&chain, None);
        assert_eq!(outcome.terminal_stock, 11);

        let repaired = apply_rewrites(&chain, &outcome);
        assert!(verify_chain(&repaired).is_ok());
        assert_eq!(repaired[1].delta(), 10);
        assert_eq!(repaired[2].delta(), -4);
    }

    /// Editing a mid-chain movement only disturbs the suffix
    #[test]
    fn rewrites_are_limited_to_the_disturbed_suffix() {
        let chain = chain_from_deltas(&[5, 5, -2, 8]);
        let third_id = chain[2].id;

        // Pin the third movement to the after-value it already has: only
        // rows whose values change are rewritten, so nothing is emitted
        let unchanged = rebuild_chain(&chain, Some((third_id, 8)));
        assert!(unchanged.rewrites.is_empty());

        // Pin it to a different value: the first two movements stay put
        let outcome = rebuild_chain(&chain, Some((third_id, 9)));
        let rewritten_ids: Vec<Uuid> = outcome.rewrites.iter().map(|rw| rw.id).collect();
        assert!(!rewritten_ids.contains(&chain[0].id));
        assert!(!rewritten_ids.contains(&chain[1].id));
        assert!(rewritten_ids.contains(&chain[2].id));
        assert!(rewritten_ids.contains(&chain[3].id));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Rebuilding any chain, however damaged its stored values, restores
    /// continuity, and the terminal stock equals the sum of stored deltas
    #[test]
    fn rebuild_restores_continuity(
        pairs in prop::collection::vec((0i64..100, 0i64..100), 0..20)
    ) {
        let chain: Vec<ChainEntry> = pairs.iter().map(|(b, a)| entry(*b, *a)).collect();
        let outcome = rebuild_chain(&chain, None);
        let repaired = apply_rewrites(&chain, &outcome);

        prop_assert!(verify_chain(&repaired).is_ok());

        let expected: i64 = chain.iter().map(|e| e.delta()).sum();
        prop_assert_eq!(outcome.terminal_stock, expected);
    }

    /// Running the recalculation twice with no mutation in between yields
    /// no further rewrites and the same terminal stock
    #[test]
    fn rebuild_is_idempotent(
        pairs in prop::collection::vec((0i64..100, 0i64..100), 0..20)
    ) {
        let chain: Vec<ChainEntry> = pairs.iter().map(|(b, a)| entry(*b, *a)).collect();
        let first = rebuild_chain(&chain, None);
        let repaired = apply_rewrites(&chain, &first);

        let second = rebuild_chain(&repaired, None);
        prop_assert!(second.rewrites.is_empty());
        prop_assert_eq!(second.terminal_stock, first.terminal_stock);
    }

    /// Editing one movement's after-value never changes any other
    /// movement's delta
    #[test]
    fn edit_preserves_other_deltas(
        deltas in prop::collection::vec(-20i64..20, 1..15),
        pick in any::<prop::sample::Index>(),
        target in 0i64..200,
    ) {
        let chain = chain_from_deltas(&deltas);
        let pinned_id = chain[pick.index(chain.len())].id;

        let outcome = rebuild_chain(&chain, Some((pinned_id, target)));
        let repaired = apply_rewrites(&chain, &outcome);

        prop_assert!(verify_chain(&repaired).is_ok());
        for (original, rebuilt) in chain.iter().zip(&repaired) {
            if original.id != pinned_id {
                prop_assert_eq!(original.delta(), rebuilt.delta());
            }
        }
    }

    /// Deleting a movement removes exactly its delta from the terminal
    /// stock
    #[test]
    fn delete_removes_only_its_delta(
        deltas in prop::collection::vec(1i64..20, 2..15),
        pick in any::<prop::sample::Index>(),
    ) {
        let chain = chain_from_deltas(&deltas);
        let idx = pick.index(chain.len());
        let removed_delta = chain[idx].delta();
        let total: i64 = deltas.iter().sum();

        let mut remaining = chain.clone();
        remaining.remove(idx);

        let outcome = rebuild_chain(&remaining, None);
        prop_assert_eq!(outcome.terminal_stock, total - removed_delta);

        let repaired = apply_rewrites(&remaining, &outcome);
        prop_assert!(verify_chain(&repaired).is_ok());
    }
}
