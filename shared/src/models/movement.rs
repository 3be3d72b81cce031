//! Stock movement kinds and their arithmetic

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kinds of stock movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Sale,
    Restock,
    Adjustment,
    ReturnIn,
    ReturnOut,
    TransferIn,
    TransferOut,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Sale => "sale",
            MovementKind::Restock => "restock",
            MovementKind::Adjustment => "adjustment",
            MovementKind::ReturnIn => "return_in",
            MovementKind::ReturnOut => "return_out",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(MovementKind::Sale),
            "restock" => Some(MovementKind::Restock),
            "adjustment" => Some(MovementKind::Adjustment),
            "return_in" => Some(MovementKind::ReturnIn),
            "return_out" => Some(MovementKind::ReturnOut),
            "transfer_in" => Some(MovementKind::TransferIn),
            "transfer_out" => Some(MovementKind::TransferOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of applying a movement kind to a current stock level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMovement {
    /// Stock after the movement
    pub after: i64,
    /// True if a sale was clamped at zero instead of going negative
    pub clamped: bool,
}

/// Why a movement could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("insufficient stock: have {available}, requested {requested}")]
    Insufficient { available: i64, requested: i64 },
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    #[error("adjustment target cannot be negative")]
    NegativeTarget,
}

impl MovementKind {
    /// Compute the `after` value for applying this kind with `quantity` on
    /// top of `before`.
    ///
    /// For `Adjustment` the quantity is the absolute target stock, not a
    /// relative change. A `Sale` that would overdraw is clamped at zero and
    /// flagged; every other subtracting kind rejects the overdraw outright.
    pub fn apply(self, before: i64, quantity: i64) -> Result<AppliedMovement, ApplyError> {
        match self {
            MovementKind::Adjustment => {
                if quantity < 0 {
                    return Err(ApplyError::NegativeTarget);
                }
                Ok(AppliedMovement {
                    after: quantity,
                    clamped: false,
                })
            }
            _ if quantity <= 0 => Err(ApplyError::NonPositiveQuantity),
            MovementKind::Restock | MovementKind::ReturnIn | MovementKind::TransferIn => {
                Ok(AppliedMovement {
                    after: before + quantity,
                    clamped: false,
                })
            }
            MovementKind::Sale => {
                if quantity > before {
                    Ok(AppliedMovement {
                        after: 0,
                        clamped: true,
                    })
                } else {
                    Ok(AppliedMovement {
                        after: before - quantity,
                        clamped: false,
                    })
                }
            }
            MovementKind::ReturnOut | MovementKind::TransferOut => {
                if quantity > before {
                    Err(ApplyError::Insufficient {
                        available: before,
                        requested: quantity,
                    })
                } else {
                    Ok(AppliedMovement {
                        after: before - quantity,
                        clamped: false,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restock_adds() {
        let applied = MovementKind::Restock.apply(7, 10).unwrap();
        assert_eq!(applied.after, 17);
        assert!(!applied.clamped);
    }

    #[test]
    fn sale_subtracts() {
        let applied = MovementKind::Sale.apply(10, 3).unwrap();
        assert_eq!(applied.after, 7);
        assert!(!applied.clamped);
    }

    #[test]
    fn overdrawn_sale_clamps_at_zero() {
        let applied = MovementKind::Sale.apply(2, 5).unwrap();
        assert_eq!(applied.after, 0);
        assert!(applied.clamped);
    }

    #[test]
    fn transfer_out_rejects_overdraw() {
        let err = MovementKind::TransferOut.apply(5, 10).unwrap_err();
        assert_eq!(
            err,
            ApplyError::Insufficient {
                available: 5,
                requested: 10
            }
        );
    }

    #[test]
    fn adjustment_sets_absolute_target() {
        let applied = MovementKind::Adjustment.apply(42, 0).unwrap();
        assert_eq!(applied.after, 0);
        assert!(MovementKind::Adjustment.apply(42, -1).is_err());
    }

    #[test]
    fn non_positive_quantity_rejected() {
        assert_eq!(
            MovementKind::Restock.apply(0, 0).unwrap_err(),
            ApplyError::NonPositiveQuantity
        );
        assert_eq!(
            MovementKind::Sale.apply(10, -2).unwrap_err(),
            ApplyError::NonPositiveQuantity
        );
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            MovementKind::Sale,
            MovementKind::Restock,
            MovementKind::Adjustment,
            MovementKind::ReturnIn,
            MovementKind::ReturnOut,
            MovementKind::TransferIn,
            MovementKind::TransferOut,
        ] {
            assert_eq!(MovementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::from_str("unknown"), None);
    }
}
