//! Ledger store primitives
//!
//! Low-level building blocks shared by the stock and transfer services.
//! Every function borrows the caller's transaction so multi-step operations
//! stay atomic: either the whole operation commits or none of it does.
//!
//! Write ordering is deliberate: movement rows are written before the
//! product's cached stock. A crash in between leaves the cached value stale
//! but the ledger intact, and reconciliation repairs the cache from the
//! ledger's terminal movement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use shared::chain::{rebuild_chain, verify_chain, ChainEntry, ChainOutcome, ChainRewrite};

use crate::error::{AppError, AppResult};
use crate::models::MovementKind;

/// Product row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub image_url: Option<String>,
    pub barcode: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub min_stock: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock movement row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub kind: String,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub delta: i64,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

const MOVEMENT_COLUMNS: &str = "id, product_id, kind, quantity_before, quantity_after, delta, \
     reason, reference_id, reference_type, user_id, occurred_at, created_at";

const PRODUCT_COLUMNS: &str = "id, branch_id, sku, name, description, category, supplier, \
     image_url, barcode, cost_price, selling_price, min_stock, stock, created_at, updated_at";

/// A movement about to be appended
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub kind: MovementKind,
    pub before: i64,
    pub after: i64,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// Load a product row and take a row-level lock on it, serializing
/// concurrent adjustments against the same product.
pub async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Lock every product row a transfer will touch, in one ascending-id pass:
/// the source products plus their SKU counterparts in the destination
/// branch. Opposing concurrent transfers then acquire the same rows in the
/// same order and cannot deadlock on them.
pub async fn lock_transfer_products(
    tx: &mut Transaction<'_, Postgres>,
    source_ids: &[Uuid],
    to_branch_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"
        SELECT id FROM products
        WHERE id = ANY($1)
           OR (branch_id = $2
               AND sku IN (SELECT sku FROM products WHERE id = ANY($1)))
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(source_ids)
    .bind(to_branch_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Load the full movement chain for a product, ordered by the chain key
/// `(occurred_at, seq)`.
pub async fn load_chain(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> AppResult<Vec<ChainEntry>> {
    let rows = sqlx::query_as::<_, (Uuid, i64, i64)>(
        r#"
        SELECT id, quantity_before, quantity_after
        FROM stock_movements
        WHERE product_id = $1
        ORDER BY occurred_at ASC, seq ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, before, after)| ChainEntry::new(id, before, after))
        .collect())
}

/// Fetch one movement by id
pub async fn get_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement_id: Uuid,
) -> AppResult<StockMovement> {
    sqlx::query_as::<_, StockMovement>(&format!(
        "SELECT {} FROM stock_movements WHERE id = $1",
        MOVEMENT_COLUMNS
    ))
    .bind(movement_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Movement".to_string()))
}

/// Append one movement row. The stored delta is always derived from the
/// before/after pair.
pub async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewMovement,
) -> AppResult<StockMovement> {
    let movement = sqlx::query_as::<_, StockMovement>(&format!(
        r#"
        INSERT INTO stock_movements (
            product_id, kind, quantity_before, quantity_after, delta,
            reason, reference_id, reference_type, user_id, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(new.product_id)
    .bind(new.kind.as_str())
    .bind(new.before)
    .bind(new.after)
    .bind(new.after - new.before)
    .bind(&new.reason)
    .bind(new.reference_id)
    .bind(&new.reference_type)
    .bind(new.user_id)
    .bind(new.occurred_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok(movement)
}

/// Persist the corrected before/after values produced by a chain rebuild
pub async fn apply_rewrites(
    tx: &mut Transaction<'_, Postgres>,
    rewrites: &[ChainRewrite],
) -> AppResult<()> {
    for rewrite in rewrites {
        sqlx::query(
            r#"
            UPDATE stock_movements
            SET quantity_before = $1, quantity_after = $2, delta = $2 - $1
            WHERE id = $3
            "#,
        )
        .bind(rewrite.before)
        .bind(rewrite.after)
        .bind(rewrite.id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Write the product's cached stock. Callers invoke this after all movement
/// writes in the same transaction.
pub async fn set_product_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    stock: i64,
) -> AppResult<()> {
    sqlx::query("UPDATE products SET stock = $1, updated_at = now() WHERE id = $2")
        .bind(stock)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The chain's terminal stock: the last movement's `quantity_after`, or 0
/// for a product with no movements.
pub async fn terminal_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> AppResult<i64> {
    let last = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT quantity_after
        FROM stock_movements
        WHERE product_id = $1
        ORDER BY occurred_at DESC, seq DESC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(last.unwrap_or(0))
}

/// The timestamp of the product's last movement, if any. Used to decide
/// whether a new movement appends or must take the out-of-order path.
pub async fn last_movement_time(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> AppResult<Option<DateTime<Utc>>> {
    let last = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT occurred_at
        FROM stock_movements
        WHERE product_id = $1
        ORDER BY occurred_at DESC, seq DESC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(last)
}

/// Rebuild the chain, persist the changed rows, re-verify the result, and
/// write the new cached stock. The re-verification should never fail; if it
/// does, something is wrong with the recalculation itself and the
/// transaction is abandoned.
pub async fn rebuild_and_persist(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    pinned: Option<(Uuid, i64)>,
) -> AppResult<ChainOutcome> {
    let chain = load_chain(tx, product_id).await?;
    let outcome = rebuild_chain(&chain, pinned);

    if outcome.goes_negative() {
        return Err(AppError::InsufficientStock(format!(
            "Recalculated chain would drive stock to {}",
            outcome.min_after
        )));
    }

    apply_rewrites(tx, &outcome.rewrites).await?;

    let repaired = load_chain(tx, product_id).await?;
    verify_chain(&repaired)
        .map_err(|violation| AppError::ConsistencyViolation(violation.to_string()))?;

    set_product_stock(tx, product_id, outcome.terminal_stock).await?;
    Ok(outcome)
}

/// Whether the movement is the chronologically first one for its product.
/// The seed movement doubles as the product's creation marker for downstream
/// reporting, so edits to its timestamp may re-sync the product record.
pub async fn is_seed_movement(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    movement_id: Uuid,
) -> AppResult<bool> {
    let first = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM stock_movements
        WHERE product_id = $1
        ORDER BY occurred_at ASC, seq ASC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(first == Some(movement_id))
}
