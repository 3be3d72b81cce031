//! Transfer coordinator
//!
//! Moves stock between branches as one atomic unit. A transfer with N line
//! items decrements each source product's ledger, increments (or creates)
//! the matching destination product, and writes immutable audit lines, all
//! inside a single transaction. If any line fails, nothing is persisted:
//! no movements, no stock changes, no transfer record.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::validation::{validate_transfer_request, TransferLine};

use crate::error::{AppError, AppResult};
use crate::models::{format_transfer_number, MovementKind, TransferStatus};
use crate::services::ledger::{self, NewMovement, Product};

/// Transfer coordination service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Input for executing a transfer
#[derive(Debug, Deserialize)]
pub struct TransferInput {
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub items: Vec<TransferItemInput>,
    pub notes: Option<String>,
}

/// One requested transfer line
#[derive(Debug, Deserialize)]
pub struct TransferItemInput {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Transfer record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transfer {
    pub id: Uuid,
    pub transfer_number: String,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Immutable transfer audit line. Captures product identity at transfer
/// time, independent of later renames or deletions.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransferItem {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
}

/// A transfer with its audit lines
#[derive(Debug, Serialize)]
pub struct TransferWithItems {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub items: Vec<TransferItem>,
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Execute a multi-item transfer from one branch to another.
    ///
    /// Source products are locked in ascending id order before any write.
    /// Per item: the source ledger gets a `transfer_out` movement; the
    /// destination product (matched by SKU, created from the source
    /// product's descriptive fields if absent) gets a `transfer_in`
    /// movement. Insufficient stock on any line aborts the whole transfer.
    pub async fn transfer(&self, user_id: Uuid, input: TransferInput) -> AppResult<TransferWithItems> {
        let lines: Vec<TransferLine> = input
            .items
            .iter()
            .map(|item| TransferLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        validate_transfer_request(input.from_branch_id, input.to_branch_id, &lines).map_err(
            |message| AppError::Validation {
                field: "transfer".to_string(),
                message: message.to_string(),
            },
        )?;

        let mut tx = self.db.begin().await?;

        let from_branch_name = branch_name(&mut tx, input.from_branch_id, "Source branch").await?;
        let to_branch_name =
            branch_name(&mut tx, input.to_branch_id, "Destination branch").await?;

        // Consistent lock order across concurrent transfers: sources and
        // their destination counterparts in one ascending-id pass
        let mut source_ids: Vec<Uuid> = input.items.iter().map(|item| item.product_id).collect();
        source_ids.sort();
        source_ids.dedup();
        ledger::lock_transfer_products(&mut tx, &source_ids, input.to_branch_id).await?;

        let now = Utc::now();
        let transfer_number = next_transfer_number(&mut tx, now.year()).await?;

        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (transfer_number, from_branch_id, to_branch_id, user_id, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, transfer_number, from_branch_id, to_branch_id, user_id, notes, status, created_at
            "#,
        )
        .bind(&transfer_number)
        .bind(input.from_branch_id)
        .bind(input.to_branch_id)
        .bind(user_id)
        .bind(&input.notes)
        .bind(TransferStatus::Completed.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let line = self
                .transfer_item(
                    &mut tx,
                    &transfer,
                    user_id,
                    item,
                    &from_branch_name,
                    &to_branch_name,
                    input.to_branch_id,
                    input.from_branch_id,
                )
                .await?;
            items.push(line);
        }

        tx.commit().await?;

        tracing::info!(
            transfer_number = %transfer.transfer_number,
            items = items.len(),
            "Transfer completed"
        );

        Ok(TransferWithItems { transfer, items })
    }

    /// Process one line: source out, destination in, audit line.
    #[allow(clippy::too_many_arguments)]
    async fn transfer_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        transfer: &Transfer,
        user_id: Uuid,
        item: &TransferItemInput,
        from_branch_name: &str,
        to_branch_name: &str,
        to_branch_id: Uuid,
        from_branch_id: Uuid,
    ) -> AppResult<TransferItem> {
        let source = ledger::lock_product(tx, item.product_id).await?;
        if source.branch_id != from_branch_id {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: format!(
                    "Product {} does not belong to the source branch",
                    source.sku
                ),
            });
        }

        // Availability is checked against the locked row, inside the
        // transaction that performs the move
        MovementKind::TransferOut
            .apply(source.stock, item.quantity)
            .map_err(|_| {
                AppError::InsufficientStock(format!(
                    "{} has {} units at {}, requested {}",
                    source.name, source.stock, from_branch_name, item.quantity
                ))
            })?;

        transfer_leg(
            tx,
            source.id,
            source.stock,
            MovementKind::TransferOut,
            -item.quantity,
            format!("Transfer {} to {}", transfer.transfer_number, to_branch_name),
            transfer.id,
            user_id,
        )
        .await?;

        // Destination product matched by SKU within the destination branch
        let destination = find_destination(tx, to_branch_id, &source.sku).await?;
        let in_reason = format!(
            "Transfer {} from {}",
            transfer.transfer_number, from_branch_name
        );
        match destination {
            Some(dest) => {
                transfer_leg(
                    tx,
                    dest.id,
                    dest.stock,
                    MovementKind::TransferIn,
                    item.quantity,
                    in_reason,
                    transfer.id,
                    user_id,
                )
                .await?;
            }
            None => {
                // Clone the source product's descriptive fields into the
                // destination branch; its ledger starts from a baseline of 0
                let dest_id = clone_product(tx, &source, to_branch_id, item.quantity).await?;
                transfer_leg(
                    tx,
                    dest_id,
                    0,
                    MovementKind::TransferIn,
                    item.quantity,
                    in_reason,
                    transfer.id,
                    user_id,
                )
                .await?;
            }
        }

        let line = sqlx::query_as::<_, TransferItem>(
            r#"
            INSERT INTO transfer_items (transfer_id, product_id, product_name, sku, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, transfer_id, product_id, product_name, sku, quantity
            "#,
        )
        .bind(transfer.id)
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.sku)
        .bind(item.quantity)
        .fetch_one(&mut **tx)
        .await?;

        Ok(line)
    }

    /// Get a transfer with its audit lines
    pub async fn get_transfer(&self, transfer_id: Uuid) -> AppResult<TransferWithItems> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, transfer_number, from_branch_id, to_branch_id, user_id, notes, status, created_at
            FROM transfers
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        let items = self.transfer_items(transfer_id).await?;
        Ok(TransferWithItems { transfer, items })
    }

    /// List transfers touching a branch (as source or destination), newest
    /// first; all transfers when no branch is given.
    pub async fn list_transfers(&self, branch_id: Option<Uuid>) -> AppResult<Vec<TransferWithItems>> {
        let transfers = match branch_id {
            Some(branch_id) => {
                sqlx::query_as::<_, Transfer>(
                    r#"
                    SELECT id, transfer_number, from_branch_id, to_branch_id, user_id, notes, status, created_at
                    FROM transfers
                    WHERE from_branch_id = $1 OR to_branch_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(branch_id)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Transfer>(
                    r#"
                    SELECT id, transfer_number, from_branch_id, to_branch_id, user_id, notes, status, created_at
                    FROM transfers
                    ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.db)
                .await?
            }
        };

        let mut result = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let items = self.transfer_items(transfer.id).await?;
            result.push(TransferWithItems { transfer, items });
        }
        Ok(result)
    }

    async fn transfer_items(&self, transfer_id: Uuid) -> AppResult<Vec<TransferItem>> {
        let items = sqlx::query_as::<_, TransferItem>(
            r#"
            SELECT id, transfer_id, product_id, product_name, sku, quantity
            FROM transfer_items
            WHERE transfer_id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }
}

/// Append one transfer leg to a product's ledger.
///
/// A leg dated now normally lands at the end of the chain and keeps its
/// `before` equal to the cached stock. When the ledger already holds a
/// future-dated movement the leg is chronologically earlier than the
/// terminal row, so it takes the out-of-order path: the row is inserted
/// with its delta stored as `(0, ±quantity)` and the chain is rebuilt
/// around it, which also rejects the leg if any later movement would go
/// negative.
#[allow(clippy::too_many_arguments)]
async fn transfer_leg(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    cached_stock: i64,
    kind: MovementKind,
    signed_delta: i64,
    reason: String,
    transfer_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let now = Utc::now();
    let last = ledger::last_movement_time(tx, product_id).await?;
    let backdated = last.map_or(false, |t| now < t);

    let (before, after) = if backdated {
        (0, signed_delta)
    } else {
        (cached_stock, cached_stock + signed_delta)
    };

    ledger::insert_movement(
        tx,
        &NewMovement {
            product_id,
            kind,
            before,
            after,
            reason,
            reference_id: Some(transfer_id),
            reference_type: Some("transfer".to_string()),
            user_id: Some(user_id),
            occurred_at: now,
        },
    )
    .await?;

    if backdated {
        ledger::rebuild_and_persist(tx, product_id, None).await?;
    } else {
        ledger::set_product_stock(tx, product_id, after).await?;
    }
    Ok(())
}

/// Allocate the next transfer number from the atomic per-year counter
async fn next_transfer_number(
    tx: &mut Transaction<'_, Postgres>,
    year: i32,
) -> AppResult<String> {
    let sequence = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO transfer_sequences (year, last_value)
        VALUES ($1, 1)
        ON CONFLICT (year)
        DO UPDATE SET last_value = transfer_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(year)
    .fetch_one(&mut **tx)
    .await?;

    Ok(format_transfer_number(year, sequence))
}

async fn branch_name(
    tx: &mut Transaction<'_, Postgres>,
    branch_id: Uuid,
    label: &str,
) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM branches WHERE id = $1")
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(label.to_string()))
}

/// Find and lock the destination product by SKU
async fn find_destination(
    tx: &mut Transaction<'_, Postgres>,
    branch_id: Uuid,
    sku: &str,
) -> AppResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, branch_id, sku, name, description, category, supplier,
               image_url, barcode, cost_price, selling_price, min_stock, stock,
               created_at, updated_at
        FROM products
        WHERE branch_id = $1 AND sku = $2
        FOR UPDATE
        "#,
    )
    .bind(branch_id)
    .bind(sku)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(product)
}

/// Create the destination product as a clone of the source's descriptive
/// fields, with initial stock equal to the transferred quantity
async fn clone_product(
    tx: &mut Transaction<'_, Postgres>,
    source: &Product,
    to_branch_id: Uuid,
    quantity: i64,
) -> AppResult<Uuid> {
    let dest_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products (
            branch_id, sku, name, description, category, supplier,
            image_url, barcode, cost_price, selling_price, min_stock, stock
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(to_branch_id)
    .bind(&source.sku)
    .bind(&source.name)
    .bind(&source.description)
    .bind(&source.category)
    .bind(&source.supplier)
    .bind(&source.image_url)
    .bind(&source.barcode)
    .bind(source.cost_price)
    .bind(source.selling_price)
    .bind(source.min_stock)
    .bind(quantity)
    .fetch_one(&mut **tx)
    .await?;

    Ok(dest_id)
}
