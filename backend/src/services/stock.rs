//! Stock adjustment service
//!
//! Applies single movements to a product's ledger and keeps the chain and
//! the cached stock value consistent under historical inserts, edits, and
//! deletions. Every mutating operation runs in one transaction with a
//! row-level lock on the product, so two concurrent adjustments can never
//! compute from the same stale stock value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_quantity, validate_reason};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ApplyError, MovementKind};
use crate::services::ledger::{self, NewMovement, Product, StockMovement};

/// Stock adjustment service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    ledger: LedgerConfig,
}

/// Input for recording a movement
#[derive(Debug, Deserialize)]
pub struct RecordMovementInput {
    pub product_id: Uuid,
    pub kind: MovementKind,
    /// Quantity for relative kinds; the absolute target stock for
    /// adjustments
    pub quantity: i64,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    /// Defaults to now; an earlier timestamp takes the out-of-order insert
    /// path and recalculates the disturbed suffix of the chain
    pub occurred_at: Option<DateTime<Utc>>,
}

/// A recorded movement with the product's new cached stock
#[derive(Debug, Serialize)]
pub struct RecordedMovement {
    pub movement: StockMovement,
    pub new_stock: i64,
    /// True if a sale was clamped at zero instead of overdrawing
    pub clamped: bool,
}

/// Input for editing a movement
#[derive(Debug, Deserialize)]
pub struct EditMovementInput {
    /// The corrected `after` value; the movement's delta changes, every
    /// later movement keeps its own delta and shifts
    pub new_after: i64,
    pub new_reason: Option<String>,
    pub new_occurred_at: Option<DateTime<Utc>>,
}

/// Result of a bulk delete
#[derive(Debug, Serialize)]
pub struct BulkDeleteOutcome {
    pub deleted: u64,
    pub new_stock: i64,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Record one movement atomically and return it with the new stock.
    ///
    /// Movements dated now (or later than everything in the chain) append;
    /// backdated movements are inserted at their chronological position and
    /// the rest of the chain is rebuilt around them.
    pub async fn record_movement(
        &self,
        user_id: Uuid,
        input: RecordMovementInput,
    ) -> AppResult<RecordedMovement> {
        validate_reason(&input.reason).map_err(|message| AppError::Validation {
            field: "reason".to_string(),
            message: message.to_string(),
        })?;

        let mut tx = self.db.begin().await?;
        let product = ledger::lock_product(&mut tx, input.product_id).await?;

        let occurred_at = input.occurred_at.unwrap_or_else(Utc::now);
        let last_time = ledger::last_movement_time(&mut tx, product.id).await?;
        let backdated = last_time.map_or(false, |t| occurred_at < t);

        let recorded = if backdated {
            self.record_backdated(&mut tx, &product, user_id, &input, occurred_at)
                .await?
        } else {
            self.record_append(&mut tx, &product, user_id, &input, occurred_at)
                .await?
        };

        tx.commit().await?;
        Ok(recorded)
    }

    /// Append path: the movement lands at the end of the chain, so its
    /// `before` is the product's cached stock and nothing else moves.
    async fn record_append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &Product,
        user_id: Uuid,
        input: &RecordMovementInput,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<RecordedMovement> {
        let applied = input
            .kind
            .apply(product.stock, input.quantity)
            .map_err(map_apply_error)?;

        if applied.clamped {
            tracing::warn!(
                product_id = %product.id,
                stock = product.stock,
                quantity = input.quantity,
                "Sale clamped at zero to avoid negative stock"
            );
        }

        let movement = ledger::insert_movement(
            tx,
            &NewMovement {
                product_id: product.id,
                kind: input.kind,
                before: product.stock,
                after: applied.after,
                reason: input.reason.clone(),
                reference_id: input.reference_id,
                reference_type: input.reference_type.clone(),
                user_id: Some(user_id),
                occurred_at,
            },
        )
        .await?;

        ledger::set_product_stock(tx, product.id, applied.after).await?;

        Ok(RecordedMovement {
            movement,
            new_stock: applied.after,
            clamped: applied.clamped,
        })
    }

    /// Out-of-order path: insert the row at its chronological position with
    /// its requested delta stored as `(0, ±quantity)`, then rebuild the
    /// chain. Backdated adjustments pin their absolute target instead. Any
    /// rebuild that would drive stock negative is rejected outright; the
    /// sale clamping rule applies only to append-time sales.
    async fn record_backdated(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &Product,
        user_id: Uuid,
        input: &RecordMovementInput,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<RecordedMovement> {
        let (after, pinned_target) = match input.kind {
            MovementKind::Adjustment => {
                if input.quantity < 0 {
                    return Err(AppError::Validation {
                        field: "quantity".to_string(),
                        message: "Adjustment target cannot be negative".to_string(),
                    });
                }
                (input.quantity, Some(input.quantity))
            }
            MovementKind::Restock | MovementKind::ReturnIn | MovementKind::TransferIn => {
                validate_positive(input.quantity)?;
                (input.quantity, None)
            }
            MovementKind::Sale | MovementKind::ReturnOut | MovementKind::TransferOut => {
                validate_positive(input.quantity)?;
                (-input.quantity, None)
            }
        };

        let inserted = ledger::insert_movement(
            tx,
            &NewMovement {
                product_id: product.id,
                kind: input.kind,
                before: 0,
                after,
                reason: input.reason.clone(),
                reference_id: input.reference_id,
                reference_type: input.reference_type.clone(),
                user_id: Some(user_id),
                occurred_at,
            },
        )
        .await?;

        let pinned = pinned_target.map(|target| (inserted.id, target));
        let outcome = ledger::rebuild_and_persist(tx, product.id, pinned).await?;

        // The rebuild may have rewritten the new row's before/after
        let movement = ledger::get_movement(tx, inserted.id).await?;

        Ok(RecordedMovement {
            movement,
            new_stock: outcome.terminal_stock,
            clamped: false,
        })
    }

    /// Edit a movement's `after` value (and optionally its reason or
    /// timestamp), recalculating every later movement. Only before/after
    /// values shift on other movements; their deltas are preserved.
    pub async fn edit_movement(
        &self,
        movement_id: Uuid,
        input: EditMovementInput,
    ) -> AppResult<StockMovement> {
        if input.new_after < 0 {
            return Err(AppError::Validation {
                field: "new_after".to_string(),
                message: "Stock after a movement cannot be negative".to_string(),
            });
        }
        if let Some(reason) = &input.new_reason {
            validate_reason(reason).map_err(|message| AppError::Validation {
                field: "new_reason".to_string(),
                message: message.to_string(),
            })?;
        }

        let mut tx = self.db.begin().await?;
        let product_id = movement_product_id(&mut tx, movement_id).await?;
        let product = ledger::lock_product(&mut tx, product_id).await?;

        // Decided before the timestamp changes: was this the seed movement?
        let was_seed = ledger::is_seed_movement(&mut tx, product.id, movement_id).await?;

        if let Some(reason) = &input.new_reason {
            sqlx::query("UPDATE stock_movements SET reason = $1 WHERE id = $2")
                .bind(reason)
                .bind(movement_id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(occurred_at) = input.new_occurred_at {
            sqlx::query("UPDATE stock_movements SET occurred_at = $1 WHERE id = $2")
                .bind(occurred_at)
                .bind(movement_id)
                .execute(&mut *tx)
                .await?;
        }

        ledger::rebuild_and_persist(&mut tx, product.id, Some((movement_id, input.new_after)))
            .await?;

        // Moving the seed movement's timestamp moves the product's creation
        // marker with it (named behavior, see LedgerConfig).
        if let Some(created_at) = seed_created_at(was_seed, input.new_occurred_at, &self.ledger) {
            sqlx::query("UPDATE products SET created_at = $1 WHERE id = $2")
                .bind(created_at)
                .bind(product.id)
                .execute(&mut *tx)
                .await?;
        }

        let updated = ledger::get_movement(&mut tx, movement_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete one movement, recalculating the rest of the chain. Deleting
    /// the chain's first movement shifts the baseline back to 0; if that
    /// would drive any later movement negative the deletion is rejected.
    pub async fn delete_movement(&self, movement_id: Uuid) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let product_id = movement_product_id(&mut tx, movement_id).await?;
        ledger::lock_product(&mut tx, product_id).await?;

        sqlx::query("DELETE FROM stock_movements WHERE id = $1")
            .bind(movement_id)
            .execute(&mut *tx)
            .await?;

        let outcome = ledger::rebuild_and_persist(&mut tx, product_id, None).await?;

        tx.commit().await?;
        Ok(outcome.terminal_stock)
    }

    /// Delete every movement carrying the given reference without
    /// recalculating the chain, then reconcile the cached stock from the
    /// ledger's terminal movement inside the same transaction.
    ///
    /// This trades chain contiguity for speed on large deletes: the
    /// surviving chain may have gaps, but the cached stock is correct. Use
    /// `delete_movement` when contiguity must be preserved.
    pub async fn bulk_delete_without_recalculation(
        &self,
        product_id: Uuid,
        reference_id: Uuid,
        reference_type: Option<String>,
    ) -> AppResult<BulkDeleteOutcome> {
        let mut tx = self.db.begin().await?;
        let product = ledger::lock_product(&mut tx, product_id).await?;

        let result = match &reference_type {
            Some(reference_type) => {
                sqlx::query(
                    "DELETE FROM stock_movements \
                     WHERE product_id = $1 AND reference_id = $2 AND reference_type = $3",
                )
                .bind(product.id)
                .bind(reference_id)
                .bind(reference_type)
                .execute(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(
                    "DELETE FROM stock_movements WHERE product_id = $1 AND reference_id = $2",
                )
                .bind(product.id)
                .bind(reference_id)
                .execute(&mut *tx)
                .await?
            }
        };

        let terminal = ledger::terminal_stock(&mut tx, product.id).await?;
        ledger::set_product_stock(&mut tx, product.id, terminal).await?;

        tx.commit().await?;
        Ok(BulkDeleteOutcome {
            deleted: result.rows_affected(),
            new_stock: terminal,
        })
    }

    /// Recompute the cached stock strictly from the ledger's terminal
    /// movement and persist it. Manual repair tool for drift.
    pub async fn reconcile(&self, product_id: Uuid) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let product = ledger::lock_product(&mut tx, product_id).await?;

        let terminal = ledger::terminal_stock(&mut tx, product.id).await?;
        if terminal != product.stock {
            tracing::warn!(
                product_id = %product.id,
                cached = product.stock,
                ledger = terminal,
                "Cached stock drifted from ledger; repairing"
            );
        }
        ledger::set_product_stock(&mut tx, product.id, terminal).await?;

        tx.commit().await?;
        Ok(terminal)
    }

    /// Movement history for a product, newest first. Read path; runs
    /// against the latest committed state without locks.
    pub async fn movement_history(
        &self,
        product_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<StockMovement>> {
        let product_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, kind, quantity_before, quantity_after, delta,
                   reason, reference_id, reference_type, user_id, occurred_at, created_at
            FROM stock_movements
            WHERE product_id = $1
            ORDER BY occurred_at DESC, seq DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(product_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: movements,
            pagination: PaginationMeta {
                page: pagination.page,
                per_page: pagination.per_page,
                total,
            },
        })
    }

}

/// The new `created_at` for a product whose seed movement was edited, if
/// the edit should re-sync it: the edited movement must be the seed, the
/// edit must actually change the timestamp, and the behavior must be
/// enabled in config.
fn seed_created_at(
    was_seed: bool,
    new_occurred_at: Option<DateTime<Utc>>,
    config: &LedgerConfig,
) -> Option<DateTime<Utc>> {
    if was_seed && config.sync_seed_timestamp {
        new_occurred_at
    } else {
        None
    }
}

/// Look up the owning product of a movement
async fn movement_product_id(
    tx: &mut Transaction<'_, Postgres>,
    movement_id: Uuid,
) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT product_id FROM stock_movements WHERE id = $1")
        .bind(movement_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))
}

fn validate_positive(quantity: i64) -> AppResult<()> {
    validate_quantity(quantity).map_err(|message| AppError::Validation {
        field: "quantity".to_string(),
        message: message.to_string(),
    })
}

fn map_apply_error(err: ApplyError) -> AppError {
    match err {
        ApplyError::Insufficient { .. } => AppError::InsufficientStock(err.to_string()),
        ApplyError::NonPositiveQuantity | ApplyError::NegativeTarget => AppError::Validation {
            field: "quantity".to_string(),
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sync_seed_timestamp: bool) -> LedgerConfig {
        LedgerConfig {
            sync_seed_timestamp,
        }
    }

    #[test]
    fn seed_edit_with_timestamp_resyncs_created_at() {
        let ts = Utc::now();
        assert_eq!(seed_created_at(true, Some(ts), &config(true)), Some(ts));
    }

    #[test]
    fn seed_resync_respects_the_config_switch() {
        let ts = Utc::now();
        assert_eq!(seed_created_at(true, Some(ts), &config(false)), None);
    }

    #[test]
    fn non_seed_edits_never_touch_created_at() {
        let ts = Utc::now();
        assert_eq!(seed_created_at(false, Some(ts), &config(true)), None);
    }

    #[test]
    fn seed_edit_without_timestamp_change_leaves_created_at_alone() {
        assert_eq!(seed_created_at(true, None, &config(true)), None);
    }
}
