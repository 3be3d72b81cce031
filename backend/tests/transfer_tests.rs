//! Transfer validation, numbering, and ledger-leg tests

use uuid::Uuid;

use shared::chain::{rebuild_chain, verify_chain, ChainEntry};
use shared::models::format_transfer_number;
use shared::validation::{validate_transfer_request, TransferLine};

fn line(quantity: i64) -> TransferLine {
    TransferLine {
        product_id: Uuid::new_v4(),
        quantity,
    }
}

// ============================================================================
// Transfer Numbering
// ============================================================================

mod numbering {
    use super::*;

    #[test]
    fn numbers_are_zero_padded_to_four_digits() {
        assert_eq!(format_transfer_number(2026, 1), "TRF-2026-0001");
        assert_eq!(format_transfer_number(2026, 999), "TRF-2026-0999");
        assert_eq!(format_transfer_number(2026, 1000), "TRF-2026-1000");
    }

    #[test]
    fn numbers_keep_growing_past_the_padding() {
        assert_eq!(format_transfer_number(2027, 123_456), "TRF-2027-123456");
    }

    /// Sequences are scoped per year, so the same sequence value in two
    /// different years still yields distinct numbers
    #[test]
    fn numbers_are_distinct_across_years() {
        assert_ne!(
            format_transfer_number(2026, 7),
            format_transfer_number(2027, 7)
        );
    }
}

// ============================================================================
// Request Validation
// ============================================================================

mod request_validation {
    use super::*;

    #[test]
    fn same_branch_transfer_is_rejected() {
        let branch = Uuid::new_v4();
        assert!(validate_transfer_request(branch, branch, &[line(1)]).is_err());
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &[]).is_err());
    }

    /// One bad line poisons the whole request; transfers are all-or-nothing
    /// from validation onward
    #[test]
    fn any_non_positive_quantity_rejects_the_whole_request() {
        let items = [line(5), line(3), line(0)];
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &items).is_err());

        let items = [line(5), line(-2)];
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &items).is_err());
    }

    #[test]
    fn well_formed_request_is_accepted() {
        let items = [line(3), line(7), line(1)];
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &items).is_ok());
    }
}

// ============================================================================
// Transfer Legs on Future-Dated Ledgers
// ============================================================================

mod future_dated_ledgers {
    use super::*;

    fn entry(before: i64, after: i64) -> ChainEntry {
        ChainEntry::new(Uuid::new_v4(), before, after)
    }

    /// A ledger may hold a future-dated movement, so a transfer leg dated
    /// now can land chronologically before the terminal row. The leg must
    /// then go through the out-of-order rebuild: stored as `(0, -qty)` at
    /// its position, with the future row rebased on top of it.
    #[test]
    fn out_leg_before_future_row_keeps_the_chain_contiguous() {
        // (t0: 0→5) then a future-dated restock (t+1h: 5→8); a transfer of
        // 3 units executes now, between the two
        let seed = entry(0, 5);
        let leg = entry(0, -3);
        let future = entry(5, 8);
        let chain = [seed, leg, future];

        let outcome = rebuild_chain(&chain, None);
        assert!(!outcome.goes_negative());
        // Cached stock must match the chronological terminal, not 8 - 3
        // applied to the stale cache
        assert_eq!(outcome.terminal_stock, 5);

        let repaired: Vec<ChainEntry> = chain
            .iter()
            .map(|e| {
                outcome
                    .rewrites
                    .iter()
                    .find(|rw| rw.id == e.id)
                    .map(|rw| ChainEntry::new(e.id, rw.before, rw.after))
                    .unwrap_or(*e)
            })
            .collect();
        assert!(verify_chain(&repaired).is_ok());
        assert_eq!((repaired[1].before, repaired[1].after), (5, 2));
        // The future row keeps its delta and is rebased
        assert_eq!((repaired[2].before, repaired[2].after), (2, 5));
    }

    /// When the future-dated movement is a sale the mid-chain withdrawal
    /// can overdraw it; the rebuild flags this so the leg is rejected
    /// instead of recording negative stock
    #[test]
    fn out_leg_that_overdraws_a_future_sale_is_flagged() {
        // (t0: 0→5), leg of -4 now, future-dated sale (5→2)
        let chain = [entry(0, 5), entry(0, -4), entry(5, 2)];

        let outcome = rebuild_chain(&chain, None);
        assert!(outcome.goes_negative());
        assert_eq!(outcome.min_after, -2);
    }
}
