//! Database operations for the `price_ledger` table.
//!
//! One row per variant touched by a named batch, recording the pre-discount
//! price. The `(store_id, variant_id, batch_name)` uniqueness constraint is
//! the only concurrency guard for duplicate batch submissions: a race loses
//! with [`DbError::UniqueViolation`] instead of silently overwriting history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::{map_insert_error, DbError};

/// A row from the `price_ledger` table.
///
/// Serialized field names match the public batch-info contract.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LedgerEntryRow {
    pub id: i64,
    #[serde(rename = "storeId")]
    pub store_id: String,
    #[serde(rename = "variantId")]
    pub variant_id: String,
    #[serde(rename = "originalPrice")]
    pub original_price: Decimal,
    #[serde(rename = "price_updation_name")]
    pub batch_name: String,
    #[serde(rename = "collectionId")]
    pub collection_id: String,
    pub percentage: Decimal,
    pub applied: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A ledger row to insert; `applied` starts false and `created_at` defaults
/// in the database.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry<'a> {
    pub store_id: &'a str,
    pub variant_id: &'a str,
    pub original_price: Decimal,
    pub batch_name: &'a str,
    pub collection_id: &'a str,
    pub percentage: Decimal,
}

/// Inserts all rows for a batch in a single transaction.
///
/// Either every row lands or none do, so two concurrent submissions of the
/// same batch name cannot interleave partial histories.
///
/// # Errors
///
/// Returns [`DbError::UniqueViolation`] if any `(store, variant, batch)` key
/// already exists, or [`DbError::Sqlx`] on other failures. On error the
/// transaction is rolled back.
pub async fn insert_batch_entries(
    pool: &PgPool,
    entries: &[NewLedgerEntry<'_>],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        sqlx::query(
            "INSERT INTO price_ledger \
                 (store_id, variant_id, original_price, batch_name, collection_id, percentage) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.store_id)
        .bind(entry.variant_id)
        .bind(entry.original_price)
        .bind(entry.batch_name)
        .bind(entry.collection_id)
        .bind(entry.percentage)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;
    }

    tx.commit().await?;
    Ok(entries.len())
}

/// Fetches one ledger row for `(store, batch)`, if any exists.
///
/// Used by the duplicate-batch guard and the batch-info lookup; any row of
/// the batch carries the batch-level fields (collection, percentage).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_batch_entry(
    pool: &PgPool,
    store_id: &str,
    batch_name: &str,
) -> Result<Option<LedgerEntryRow>, DbError> {
    let row = sqlx::query_as::<_, LedgerEntryRow>(
        "SELECT id, store_id, variant_id, original_price, batch_name, \
                collection_id, percentage, applied, created_at \
         FROM price_ledger \
         WHERE store_id = $1 AND batch_name = $2 \
         ORDER BY id \
         LIMIT 1",
    )
    .bind(store_id)
    .bind(batch_name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every ledger row for `(store, batch)`, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_batch_entries(
    pool: &PgPool,
    store_id: &str,
    batch_name: &str,
) -> Result<Vec<LedgerEntryRow>, DbError> {
    let rows = sqlx::query_as::<_, LedgerEntryRow>(
        "SELECT id, store_id, variant_id, original_price, batch_name, \
                collection_id, percentage, applied, created_at \
         FROM price_ledger \
         WHERE store_id = $1 AND batch_name = $2 \
         ORDER BY id",
    )
    .bind(store_id)
    .bind(batch_name)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches one ledger row for `(store, collection)`, if any batch has touched
/// that collection.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_collection_entry(
    pool: &PgPool,
    store_id: &str,
    collection_id: &str,
) -> Result<Option<LedgerEntryRow>, DbError> {
    let row = sqlx::query_as::<_, LedgerEntryRow>(
        "SELECT id, store_id, variant_id, original_price, batch_name, \
                collection_id, percentage, applied, created_at \
         FROM price_ledger \
         WHERE store_id = $1 AND collection_id = $2 \
         ORDER BY id \
         LIMIT 1",
    )
    .bind(store_id)
    .bind(collection_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Marks the given variants' rows as applied after their product's price
/// mutation succeeded remotely.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_entries_applied(
    pool: &PgPool,
    store_id: &str,
    batch_name: &str,
    variant_ids: &[String],
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE price_ledger \
         SET applied = TRUE \
         WHERE store_id = $1 AND batch_name = $2 AND variant_id = ANY($3)",
    )
    .bind(store_id)
    .bind(batch_name)
    .bind(variant_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Deletes the given variants' rows for a batch.
///
/// Called per product as rollback restores it, so an aborted rollback leaves
/// only still-unrestored rows behind.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_entries_for_variants(
    pool: &PgPool,
    store_id: &str,
    batch_name: &str,
    variant_ids: &[String],
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM price_ledger \
         WHERE store_id = $1 AND batch_name = $2 AND variant_id = ANY($3)",
    )
    .bind(store_id)
    .bind(batch_name)
    .bind(variant_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Deletes every remaining row for `(store, batch)` and returns the count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_batch(pool: &PgPool, store_id: &str, batch_name: &str) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM price_ledger WHERE store_id = $1 AND batch_name = $2")
        .bind(store_id)
        .bind(batch_name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entry<'a>(store: &'a str, variant: &'a str, batch: &'a str) -> NewLedgerEntry<'a> {
        NewLedgerEntry {
            store_id: store,
            variant_id: variant,
            original_price: Decimal::new(1999, 2),
            batch_name: batch,
            collection_id: "42",
            percentage: Decimal::new(20, 0),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn insert_and_list_batch_entries(pool: PgPool) {
        let entries = vec![
            entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale"),
            entry("shop.example.com", "gid://shopify/ProductVariant/2", "sale"),
        ];
        let inserted = insert_batch_entries(&pool, &entries).await.expect("insert");
        assert_eq!(inserted, 2);

        let rows = list_batch_entries(&pool, "shop.example.com", "sale")
            .await
            .expect("list");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.applied));
        assert_eq!(rows[0].original_price, Decimal::new(1999, 2));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_batch_insert_is_a_unique_violation(pool: PgPool) {
        let entries = vec![entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale")];
        insert_batch_entries(&pool, &entries).await.expect("first insert");

        let result = insert_batch_entries(&pool, &entries).await;
        assert!(
            matches!(result, Err(DbError::UniqueViolation)),
            "expected UniqueViolation, got: {result:?}"
        );

        // The failed transaction must not have added rows.
        let rows = list_batch_entries(&pool, "shop.example.com", "sale")
            .await
            .expect("list");
        assert_eq!(rows.len(), 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn same_variant_in_different_batches_is_allowed(pool: PgPool) {
        let first = vec![entry("shop.example.com", "gid://shopify/ProductVariant/1", "spring")];
        let second = vec![entry("shop.example.com", "gid://shopify/ProductVariant/1", "summer")];
        insert_batch_entries(&pool, &first).await.expect("spring");
        insert_batch_entries(&pool, &second).await.expect("summer");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn mark_entries_applied_flags_only_named_variants(pool: PgPool) {
        let entries = vec![
            entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale"),
            entry("shop.example.com", "gid://shopify/ProductVariant/2", "sale"),
        ];
        insert_batch_entries(&pool, &entries).await.expect("insert");

        let updated = mark_entries_applied(
            &pool,
            "shop.example.com",
            "sale",
            &["gid://shopify/ProductVariant/1".to_owned()],
        )
        .await
        .expect("mark applied");
        assert_eq!(updated, 1);

        let rows = list_batch_entries(&pool, "shop.example.com", "sale")
            .await
            .expect("list");
        let flagged: Vec<bool> = rows.iter().map(|r| r.applied).collect();
        assert_eq!(flagged, vec![true, false]);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn delete_entries_for_variants_leaves_the_rest(pool: PgPool) {
        let entries = vec![
            entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale"),
            entry("shop.example.com", "gid://shopify/ProductVariant/2", "sale"),
        ];
        insert_batch_entries(&pool, &entries).await.expect("insert");

        let deleted = delete_entries_for_variants(
            &pool,
            "shop.example.com",
            "sale",
            &["gid://shopify/ProductVariant/2".to_owned()],
        )
        .await
        .expect("delete variants");
        assert_eq!(deleted, 1);

        let rows = list_batch_entries(&pool, "shop.example.com", "sale")
            .await
            .expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].variant_id, "gid://shopify/ProductVariant/1");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn delete_batch_removes_all_rows(pool: PgPool) {
        let entries = vec![
            entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale"),
            entry("shop.example.com", "gid://shopify/ProductVariant/2", "sale"),
        ];
        insert_batch_entries(&pool, &entries).await.expect("insert");

        let deleted = delete_batch(&pool, "shop.example.com", "sale")
            .await
            .expect("delete batch");
        assert_eq!(deleted, 2);

        let row = find_batch_entry(&pool, "shop.example.com", "sale")
            .await
            .expect("find");
        assert!(row.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn find_collection_entry_matches_any_batch(pool: PgPool) {
        let entries = vec![entry("shop.example.com", "gid://shopify/ProductVariant/1", "sale")];
        insert_batch_entries(&pool, &entries).await.expect("insert");

        let row = find_collection_entry(&pool, "shop.example.com", "42")
            .await
            .expect("find")
            .expect("row exists");
        assert_eq!(row.batch_name, "sale");

        let missing = find_collection_entry(&pool, "shop.example.com", "999")
            .await
            .expect("find");
        assert!(missing.is_none());
    }

    #[test]
    fn ledger_row_serializes_with_contract_field_names() {
        let row = LedgerEntryRow {
            id: 1,
            store_id: "shop.example.com".to_owned(),
            variant_id: "gid://shopify/ProductVariant/1".to_owned(),
            original_price: Decimal::new(1000, 2),
            batch_name: "sale".to_owned(),
            collection_id: "42".to_owned(),
            percentage: Decimal::new(20, 0),
            applied: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["storeId"], "shop.example.com");
        assert_eq!(json["price_updation_name"], "sale");
        assert!(json.get("originalPrice").is_some());
        assert!(json.get("batch_name").is_none());
    }
}
