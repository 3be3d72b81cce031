//! Validation utilities for the Branch Stock Ledger

use uuid::Uuid;

/// One requested transfer line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Validate the shape of a transfer request before touching any state.
///
/// Stock sufficiency is checked later, inside the transfer transaction,
/// against the locked source rows.
pub fn validate_transfer_request(
    from_branch_id: Uuid,
    to_branch_id: Uuid,
    items: &[TransferLine],
) -> Result<(), &'static str> {
    if from_branch_id == to_branch_id {
        return Err("Source and destination branches must differ");
    }
    if items.is_empty() {
        return Err("Transfer must contain at least one item");
    }
    for item in items {
        if item.quantity <= 0 {
            return Err("Transfer quantities must be positive");
        }
    }
    Ok(())
}

/// Validate a movement quantity (positive; adjustments use an absolute
/// target and are validated separately).
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a free-text reason (required, bounded)
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("Reason must not be empty");
    }
    if trimmed.len() > 500 {
        return Err("Reason must be 500 characters or fewer");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64) -> TransferLine {
        TransferLine {
            product_id: Uuid::new_v4(),
            quantity,
        }
    }

    #[test]
    fn same_branch_transfer_rejected() {
        let branch = Uuid::new_v4();
        assert!(validate_transfer_request(branch, branch, &[line(1)]).is_err());
    }

    #[test]
    fn empty_transfer_rejected() {
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &[]).is_err());
    }

    #[test]
    fn non_positive_line_rejected() {
        let items = [line(3), line(0)];
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &items).is_err());
    }

    #[test]
    fn well_formed_transfer_accepted() {
        let items = [line(3), line(7)];
        assert!(validate_transfer_request(Uuid::new_v4(), Uuid::new_v4(), &items).is_ok());
    }

    #[test]
    fn reason_must_be_present_and_bounded() {
        assert!(validate_reason("damaged in storage").is_ok());
        assert!(validate_reason("  ").is_err());
        assert!(validate_reason(&"x".repeat(501)).is_err());
    }
}
