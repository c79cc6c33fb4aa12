use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curbside_core::spot::booking_from_columns;
use curbside_core::{CoreError, CoreResult, ParkingSpot, SpotChanges, SpotId, SpotStore};
use sqlx::PgPool;
use tracing::{error, info};

/// Postgres-backed [`SpotStore`].
///
/// Each conditional primitive is a single UPDATE whose WHERE clause carries the
/// availability check, so Postgres row locking provides the atomicity.
pub struct PgSpotStore {
    pool: PgPool,
}

impl PgSpotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert spots whose id is not taken yet. Returns how many were inserted.
    pub async fn seed(&self, spots: &[ParkingSpot]) -> CoreResult<u64> {
        let mut inserted = 0;
        for spot in spots {
            let result = sqlx::query(
                r#"
                INSERT INTO parking_spots (id, name, lat, lng, booking_price_per_hour)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(spot.id)
            .bind(&spot.name)
            .bind(spot.lat)
            .bind(spot.lng)
            .bind(spot.booking_price_per_hour)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

            inserted += result.rows_affected();
        }
        info!("Seeded {} parking spots into Postgres", inserted);
        Ok(inserted)
    }

    async fn exists(&self, id: SpotId) -> CoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM parking_spots WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }
}

#[derive(sqlx::FromRow)]
struct SpotRow {
    id: SpotId,
    name: String,
    lat: f64,
    lng: f64,
    booking_price_per_hour: f64,
    booked_by_user_id: Option<String>,
    booked_until: Option<DateTime<Utc>>,
}

impl SpotRow {
    fn into_spot(self) -> CoreResult<ParkingSpot> {
        let booking = booking_from_columns(self.id, self.booked_by_user_id, self.booked_until)
            .map_err(|e| CoreError::StorageUnavailable(format!("corrupt parking_spots row: {}", e)))?;

        Ok(ParkingSpot {
            id: self.id,
            name: self.name,
            lat: self.lat,
            lng: self.lng,
            booking_price_per_hour: self.booking_price_per_hour,
            booking,
        })
    }
}

fn storage_error(e: sqlx::Error) -> CoreError {
    error!("Postgres error: {}", e);
    CoreError::StorageUnavailable(e.to_string())
}

fn booking_columns(changes: SpotChanges) -> (Option<String>, Option<DateTime<Utc>>) {
    match changes {
        SpotChanges::Book(b) => (Some(b.user_id), Some(b.until)),
        SpotChanges::Release => (None, None),
    }
}

#[async_trait]
impl SpotStore for PgSpotStore {
    async fn get(&self, id: SpotId) -> CoreResult<ParkingSpot> {
        let row = sqlx::query_as::<_, SpotRow>(
            r#"
            SELECT id, name, lat, lng, booking_price_per_hour, booked_by_user_id, booked_until
            FROM parking_spots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.ok_or(CoreError::NotFound(id))?.into_spot()
    }

    async fn conditional_update(
        &self,
        id: SpotId,
        expected_available: bool,
        at: DateTime<Utc>,
        changes: SpotChanges,
    ) -> CoreResult<ParkingSpot> {
        let (booked_by_user_id, booked_until) = booking_columns(changes);

        let row = sqlx::query_as::<_, SpotRow>(
            r#"
            UPDATE parking_spots
            SET booked_by_user_id = $2, booked_until = $3
            WHERE id = $1
              AND ((booked_until IS NULL OR booked_until <= $4) = $5)
            RETURNING id, name, lat, lng, booking_price_per_hour, booked_by_user_id, booked_until
            "#,
        )
        .bind(id)
        .bind(booked_by_user_id)
        .bind(booked_until)
        .bind(at)
        .bind(expected_available)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if let Some(row) = row {
            return row.into_spot();
        }

        // Zero rows: either the predicate failed or the spot is gone.
        if self.exists(id).await? {
            Err(CoreError::Conflict(id))
        } else {
            Err(CoreError::NotFound(id))
        }
    }

    async fn bulk_expire(&self, before: DateTime<Utc>) -> CoreResult<Vec<ParkingSpot>> {
        let rows = sqlx::query_as::<_, SpotRow>(
            r#"
            UPDATE parking_spots
            SET booked_by_user_id = NULL, booked_until = NULL
            WHERE booked_until < $1
            RETURNING id, name, lat, lng, booking_price_per_hour, booked_by_user_id, booked_until
            "#,
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        // RETURNING has no defined order.
        let mut spots = rows.into_iter().map(SpotRow::into_spot).collect::<CoreResult<Vec<_>>>()?;
        spots.sort_by_key(|s| s.id);
        Ok(spots)
    }

    async fn list_all(&self) -> CoreResult<Vec<ParkingSpot>> {
        let rows = sqlx::query_as::<_, SpotRow>(
            r#"
            SELECT id, name, lat, lng, booking_price_per_hour, booked_by_user_id, booked_until
            FROM parking_spots
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(SpotRow::into_spot).collect()
    }
}
