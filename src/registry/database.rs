//! Batch Registry Database
//!
//! SQLite tables:
//! - `bookings`: raw shipment records waiting to be batched
//! - `batches`: one row per stored batch (exported metrics)
//! - `batch_shipments`: batch membership, in admission order
//!
//! A booking counts as pending until it appears in `batch_shipments`.

use crate::{
    BatchRecord, Measurement, RecordId, Shipment, ShipmentId, ShipmentRecord,
    pool::{ShipmentIntake, ShipmentSource},
    registry::BatchSink,
    validation::validate_shipments,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tracing::{debug, info, warn};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS bookings (
        id TEXT PRIMARY KEY,
        dimension_height REAL,
        dimension_width REAL,
        dimension_length REAL,
        weight REAL,
        delivery_address TEXT NOT NULL DEFAULT '',
        priority TEXT,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS batches (
        name TEXT PRIMARY KEY,
        zone TEXT,
        volume REAL NOT NULL,
        weight REAL NOT NULL,
        shipment_count INTEGER NOT NULL,
        zone_count INTEGER NOT NULL,
        efficiency REAL NOT NULL,
        fill_ratio REAL NOT NULL,
        weight_ratio REAL NOT NULL,
        delivery_window_days INTEGER NOT NULL,
        estimated_delivery_date TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS batch_shipments (
        batch_name TEXT NOT NULL REFERENCES batches(name),
        shipment_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (batch_name, shipment_id)
    )",
];

/// Batch metadata registry
///
/// Owns a SQLite connection pool. Constructed once at process start and
/// shared by reference with the cycle runner.
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    /// Connect to the database at `url`, creating it and the schema if needed
    ///
    /// # Arguments
    /// * `url` - SQLite URL, e.g. `sqlite://pooler.db` or `sqlite::memory:`
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true);

        // A single long-lived connection keeps `sqlite::memory:` databases alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {url}"))?;

        let registry = Self { pool };
        registry.migrate().await?;
        info!("Registry connected to {}", url);
        Ok(registry)
    }

    /// Private in-memory database
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a booking to be picked up by the next fetch
    pub async fn insert_booking(&self, record: &ShipmentRecord) -> anyhow::Result<()> {
        self.insert_bookings(std::slice::from_ref(record)).await
    }

    /// Insert several bookings in one transaction
    ///
    /// Every record must convert into a valid shipment and ids must be
    /// unique within the call; otherwise nothing is written. Text
    /// measurements are stored as REAL.
    pub async fn insert_bookings(&self, records: &[ShipmentRecord]) -> anyhow::Result<()> {
        let shipments = records
            .iter()
            .cloned()
            .map(Shipment::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        validate_shipments(&shipments)?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            let id = ShipmentId::from(record.id.clone());
            let numeric = |value: &Option<Measurement>| -> anyhow::Result<Option<f64>> {
                match value {
                    None => Ok(None),
                    Some(Measurement::Number(n)) => Ok(Some(*n)),
                    Some(Measurement::Text(raw)) => raw
                        .trim()
                        .parse::<f64>()
                        .map(Some)
                        .with_context(|| format!("booking {id}: {raw:?} is not numeric")),
                }
            };

            sqlx::query(
                "INSERT INTO bookings
                 (id, dimension_height, dimension_width, dimension_length, weight, delivery_address, priority, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(numeric(&record.height)?)
            .bind(numeric(&record.width)?)
            .bind(numeric(&record.length)?)
            .bind(numeric(&record.weight)?)
            .bind(&record.destination)
            .bind(record.priority.as_deref())
            .bind(record.created_at.map(|t| t.to_rfc3339()))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert booking {id}"))?;
        }
        tx.commit().await?;

        debug!("Inserted {} bookings", records.len());
        Ok(())
    }

    /// Bookings not yet recorded as a member of any batch
    pub async fn pending_bookings(&self) -> anyhow::Result<Vec<ShipmentRecord>> {
        let rows = sqlx::query(
            "SELECT id, dimension_height, dimension_width, dimension_length, weight,
                    delivery_address, priority, created_at
             FROM bookings
             WHERE id NOT IN (SELECT shipment_id FROM batch_shipments)
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let created_at: Option<String> = row.try_get("created_at")?;
            let created_at = created_at.and_then(|raw| match parse_timestamp(&raw) {
                Some(t) => Some(t),
                None => {
                    warn!("Booking {}: ignoring unparseable created_at {:?}", id, raw);
                    None
                }
            });

            records.push(ShipmentRecord {
                height: row.try_get::<Option<f64>, _>("dimension_height")?.map(Measurement::Number),
                width: row.try_get::<Option<f64>, _>("dimension_width")?.map(Measurement::Number),
                length: row.try_get::<Option<f64>, _>("dimension_length")?.map(Measurement::Number),
                weight: row.try_get::<Option<f64>, _>("weight")?.map(Measurement::Number),
                destination: row.try_get("delivery_address")?,
                priority: row.try_get("priority")?,
                created_at,
                id: RecordId::Text(id),
            });
        }

        debug!("Fetched {} pending bookings", records.len());
        Ok(records)
    }

    /// Store a batch and its membership in one transaction
    pub async fn store_batch(&self, record: &BatchRecord) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO batches
             (name, zone, volume, weight, shipment_count, zone_count, efficiency, fill_ratio,
              weight_ratio, delivery_window_days, estimated_delivery_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.name)
        .bind(record.zone.as_deref())
        .bind(record.volume)
        .bind(record.weight)
        .bind(record.shipment_count as i64)
        .bind(record.zone_count as i64)
        .bind(record.efficiency)
        .bind(record.fill_ratio)
        .bind(record.weight_ratio)
        .bind(i64::from(record.delivery_window_days))
        .bind(record.estimated_delivery_date.to_rfc3339())
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, shipment_id) in record.shipment_ids.iter().enumerate() {
            sqlx::query("INSERT INTO batch_shipments (batch_name, shipment_id, position) VALUES (?, ?, ?)")
                .bind(&record.name)
                .bind(shipment_id.as_str())
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Stored batch {} ({} shipments)", record.name, record.shipment_count);
        Ok(())
    }

    /// Read a stored batch back by name
    pub async fn load_batch(&self, name: &str) -> anyhow::Result<Option<BatchRecord>> {
        let Some(row) = sqlx::query("SELECT * FROM batches WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let members = sqlx::query(
            "SELECT shipment_id FROM batch_shipments WHERE batch_name = ? ORDER BY position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        let shipment_ids = members
            .into_iter()
            .map(|m| m.try_get::<String, _>("shipment_id").map(ShipmentId::from))
            .collect::<Result<Vec<_>, _>>()?;

        let timestamp = |column: &str| -> anyhow::Result<DateTime<Utc>> {
            let raw: String = row.try_get(column)?;
            parse_timestamp(&raw).with_context(|| format!("batch {name}: bad {column} {raw:?}"))
        };

        Ok(Some(BatchRecord {
            name: row.try_get("name")?,
            zone: row.try_get("zone")?,
            volume: row.try_get("volume")?,
            weight: row.try_get("weight")?,
            shipment_count: row.try_get::<i64, _>("shipment_count")? as usize,
            zone_count: row.try_get::<i64, _>("zone_count")? as usize,
            efficiency: row.try_get("efficiency")?,
            fill_ratio: row.try_get("fill_ratio")?,
            weight_ratio: row.try_get("weight_ratio")?,
            delivery_window_days: row.try_get::<i64, _>("delivery_window_days")? as u32,
            estimated_delivery_date: timestamp("estimated_delivery_date")?,
            created_at: timestamp("created_at")?,
            shipment_ids,
        }))
    }

    /// Number of stored batches
    pub async fn batch_count(&self) -> anyhow::Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as usize)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl BatchSink for Registry {
    async fn store(&self, record: &BatchRecord) -> anyhow::Result<()> {
        self.store_batch(record).await
    }
}

#[async_trait]
impl ShipmentSource for Registry {
    async fn fetch(&self) -> anyhow::Result<Vec<ShipmentRecord>> {
        self.pending_bookings().await
    }
}

#[async_trait]
impl ShipmentIntake for Registry {
    async fn submit(&self, records: Vec<ShipmentRecord>) -> anyhow::Result<usize> {
        self.insert_bookings(&records).await?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ValidationError,
        batch::{Batch, Capacity},
    };

    fn booking(id: &str, height: Measurement, address: &str) -> ShipmentRecord {
        ShipmentRecord {
            id: RecordId::Text(id.to_string()),
            height: Some(height),
            width: Some(Measurement::Number(50.0)),
            length: Some(Measurement::Number(50.0)),
            weight: Some(Measurement::Number(4.0)),
            destination: address.to_string(),
            priority: Some("express".to_string()),
            created_at: None,
        }
    }

    fn sample_batch() -> Batch {
        let capacity = Capacity::new(1.0, None).unwrap();
        let created_at = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
        let mut batch = Batch::new("batch-test-001", capacity, created_at).with_zone("Oslo");
        for id in ["b1", "b2"] {
            let shipment = Shipment::new(id, 50.0, 50.0, 50.0, 4.0, "Gate 1, Oslo, NO").unwrap();
            assert!(batch.add_shipment(&shipment));
        }
        batch
    }

    #[tokio::test]
    async fn test_bookings_round_through_source() {
        let registry = Registry::in_memory().await.unwrap();
        registry
            .insert_booking(&booking("b1", Measurement::Text("40".into()), "Gate 1, Oslo, NO"))
            .await
            .unwrap();
        registry
            .insert_booking(&booking("b2", Measurement::Number(60.0), "Gate 2, Oslo, NO"))
            .await
            .unwrap();

        let records = registry.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, RecordId::Text("b1".into()));
        assert_eq!(records[0].height, Some(Measurement::Number(40.0)));
        assert_eq!(records[1].destination, "Gate 2, Oslo, NO");
        assert_eq!(records[1].priority.as_deref(), Some("express"));

        let shipment = Shipment::from_record(records[0].clone()).unwrap();
        assert!((shipment.volume() - 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_store_and_load_batch() {
        let registry = Registry::in_memory().await.unwrap();
        let record = sample_batch().to_record();

        registry.store(&record).await.unwrap();
        assert_eq!(registry.batch_count().await.unwrap(), 1);

        let loaded = registry.load_batch("batch-test-001").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(registry.load_batch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batched_bookings_are_no_longer_pending() {
        let registry = Registry::in_memory().await.unwrap();
        for id in ["b1", "b2", "b3"] {
            registry
                .insert_booking(&booking(id, Measurement::Number(50.0), "Gate, Oslo, NO"))
                .await
                .unwrap();
        }

        registry.store_batch(&sample_batch().to_record()).await.unwrap();

        let pending = registry.pending_bookings().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, RecordId::Text("b3".into()));
    }

    #[tokio::test]
    async fn test_duplicate_batch_name_fails_atomically() {
        let registry = Registry::in_memory().await.unwrap();
        let record = sample_batch().to_record();
        registry.store_batch(&record).await.unwrap();

        assert!(registry.store_batch(&record).await.is_err());
        assert_eq!(registry.batch_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_booking_is_not_stored() {
        let registry = Registry::in_memory().await.unwrap();

        let err = registry
            .insert_booking(&booking("bad", Measurement::Number(-5.0), "Gate, Oslo, NO"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::NegativeMeasurement { field: "height", .. })
        ));

        let err = registry
            .insert_booking(&booking("", Measurement::Number(5.0), "Gate, Oslo, NO"))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<ValidationError>(), Some(&ValidationError::EmptyShipmentId));

        assert!(registry.pending_bookings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submitted_bookings_are_all_or_nothing() {
        let registry = Registry::in_memory().await.unwrap();
        registry
            .insert_booking(&booking("b1", Measurement::Number(50.0), "Gate, Oslo, NO"))
            .await
            .unwrap();

        // b1 already exists, so b2 must not be written either
        let clash = vec![
            booking("b2", Measurement::Number(50.0), "Gate, Oslo, NO"),
            booking("b1", Measurement::Number(50.0), "Gate, Oslo, NO"),
        ];
        assert!(registry.submit(clash).await.is_err());

        let repeated = vec![
            booking("b3", Measurement::Number(50.0), "Gate, Oslo, NO"),
            booking("b3", Measurement::Number(60.0), "Gate, Oslo, NO"),
        ];
        assert!(registry.submit(repeated).await.is_err());

        let pending = registry.pending_bookings().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, RecordId::Text("b1".into()));

        let accepted = registry
            .submit(vec![booking("b4", Measurement::Text("30".into()), "Gate, Oslo, NO")])
            .await
            .unwrap();
        assert_eq!(accepted, 1);
    }

    /// Write a row directly, bypassing booking validation
    async fn insert_raw_booking(registry: &Registry, id: &str, height: f64) {
        sqlx::query(
            "INSERT INTO bookings (id, dimension_height, dimension_width, dimension_length, weight, delivery_address)
             VALUES (?, ?, 100, 100, 10, 'Gate, Oslo, NO')",
        )
        .bind(id)
        .bind(height)
        .execute(&registry.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stored_bad_booking_does_not_block_cycles() {
        use crate::{AggregationOrchestrator, config::AggregationConfig, scheduler::SchedulingPolicyType};

        let registry = Registry::in_memory().await.unwrap();
        insert_raw_booking(&registry, "bad", -5.0).await;
        insert_raw_booking(&registry, "good", 100.0).await;
        let orchestrator =
            AggregationOrchestrator::new(AggregationConfig::default(), SchedulingPolicyType::PriorityValue);

        let first = orchestrator.run_cycle(&registry, &registry).await.unwrap();
        assert_eq!(first.fetched, 2);
        assert_eq!(first.persisted, 1);
        assert_eq!(first.rejected.len(), 1);
        assert_eq!(first.rejected[0].shipment_id.as_str(), "bad");
        assert!(first.rejected[0].reason.contains("height"));

        // The bad row stays pending and is reported again; nothing else is held up
        let second = orchestrator.run_cycle(&registry, &registry).await.unwrap();
        assert_eq!(second.fetched, 1);
        assert_eq!(second.rejected.len(), 1);
        assert!(second.aggregation.batches.is_empty());
        assert_eq!(registry.batch_count().await.unwrap(), 1);
    }
}
