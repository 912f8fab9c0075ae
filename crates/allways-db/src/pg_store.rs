//! `PostgreSQL` implementation of [`Store`].
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! to avoid requiring a live database at build time. All queries are
//! parameterized.

use std::collections::{BTreeMap, BTreeSet};

use allways_types::{
    CivilId, ControlBox, ControlBoxId, CrossingRequestId, EmergencyRequestId,
    EmergencyVehicleRequest, LightStatus, Pedestrian, PedestrianCrossingRequest,
    PedestrianSemaphore, PriorityLevel, SemaphoreId, SemaphoreKind, TmcId, TrafficSemaphore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::store::Store;

// =============================================================================
// Row types
// =============================================================================

/// A row from the `control_box` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ControlBoxRow {
    /// Control box id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-text location.
    pub location: String,
    /// Owning TMC.
    pub tmc_id: Uuid,
    /// Network username.
    pub network_username: String,
    /// Network secret.
    pub network_secret: Option<String>,
}

impl From<ControlBoxRow> for ControlBox {
    fn from(row: ControlBoxRow) -> Self {
        Self {
            id: ControlBoxId::from(row.id),
            name: row.name,
            location: row.location,
            tmc_id: TmcId::from(row.tmc_id),
            network_username: row.network_username,
            network_secret: row.network_secret,
        }
    }
}

/// A row from the `t_semaphore` table (destinations are fetched separately).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrafficRow {
    /// Semaphore id.
    pub id: Uuid,
    /// Owning control box.
    pub control_box_id: Uuid,
    /// Display name.
    pub name: String,
    /// Intersection location.
    pub location: i32,
    /// Red channel.
    pub gpio_red: i32,
    /// Yellow channel.
    pub gpio_yellow: i32,
    /// Green channel.
    pub gpio_green: i32,
    /// Stored status name.
    pub status: String,
}

impl TrafficRow {
    fn into_semaphore(self, destinations: BTreeSet<i32>) -> TrafficSemaphore {
        TrafficSemaphore {
            id: SemaphoreId::from(self.id),
            control_box_id: ControlBoxId::from(self.control_box_id),
            name: self.name,
            location: self.location,
            gpio_red: self.gpio_red,
            gpio_yellow: self.gpio_yellow,
            gpio_green: self.gpio_green,
            status: LightStatus::from_stored(Some(&self.status)),
            destinations,
        }
    }
}

/// A row from the `p_semaphore` table.
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(clippy::struct_excessive_bools)]
pub struct PedestrianSemaphoreRow {
    /// Semaphore id.
    pub id: Uuid,
    /// Owning control box.
    pub control_box_id: Uuid,
    /// Display name.
    pub name: String,
    /// Intersection location.
    pub location: i32,
    /// Red channel.
    pub gpio_red: i32,
    /// Green channel.
    pub gpio_green: i32,
    /// Stored status name.
    pub status: String,
    /// Card reader fitted.
    pub has_card_reader: bool,
    /// Buzzer fitted.
    pub has_buzzer: bool,
    /// Button fitted.
    pub has_button: bool,
    /// Button channel.
    pub gpio_button: Option<i32>,
    /// Button threshold.
    pub button_threshold: Option<i32>,
}

impl From<PedestrianSemaphoreRow> for PedestrianSemaphore {
    fn from(row: PedestrianSemaphoreRow) -> Self {
        Self {
            id: SemaphoreId::from(row.id),
            control_box_id: ControlBoxId::from(row.control_box_id),
            name: row.name,
            location: row.location,
            gpio_red: row.gpio_red,
            gpio_green: row.gpio_green,
            status: LightStatus::from_stored(Some(&row.status)),
            has_card_reader: row.has_card_reader,
            has_buzzer: row.has_buzzer,
            has_button: row.has_button,
            gpio_button: row.gpio_button,
            button_threshold: row.button_threshold,
        }
    }
}

/// A row from the `pedestrian` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PedestrianRow {
    /// Civil id.
    pub cc_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Physical tag id.
    pub physical_tag_id: Option<String>,
    /// Disability level.
    pub disability: i32,
}

impl TryFrom<PedestrianRow> for Pedestrian {
    type Error = DbError;

    fn try_from(row: PedestrianRow) -> Result<Self, Self::Error> {
        let cc_id = CivilId::parse(&row.cc_id)
            .ok_or_else(|| DbError::Corrupt(String::from("pedestrian with blank cc_id")))?;
        Ok(Self {
            cc_id,
            name: row.name,
            physical_tag_id: row.physical_tag_id,
            disability: row.disability,
        })
    }
}

/// A row from the `emergency_vehicle` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmergencyRow {
    /// Log row id.
    pub id: Uuid,
    /// Requesting TMC.
    pub tmc_id: Uuid,
    /// Control box at time of request.
    pub control_box_id: Uuid,
    /// License plate.
    pub license_plate: String,
    /// Origin location.
    pub origin: i32,
    /// Destination number.
    pub destination: i32,
    /// Urgency code.
    pub priority_level: i16,
    /// Request time.
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<EmergencyRow> for EmergencyVehicleRequest {
    type Error = DbError;

    fn try_from(row: EmergencyRow) -> Result<Self, Self::Error> {
        let priority_level = PriorityLevel::from_code(i64::from(row.priority_level))
            .ok_or_else(|| {
                DbError::Corrupt(format!("unknown priority level {}", row.priority_level))
            })?;
        Ok(Self {
            id: EmergencyRequestId::from(row.id),
            tmc_id: TmcId::from(row.tmc_id),
            control_box_id: ControlBoxId::from(row.control_box_id),
            license_plate: row.license_plate,
            origin: row.origin,
            destination: row.destination,
            priority_level,
            timestamp: row.timestamp,
        })
    }
}

/// A row from the `pedestrian_crossing` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrossingRow {
    /// Log row id.
    pub id: Uuid,
    /// Pedestrian semaphore.
    pub semaphore_id: Uuid,
    /// Registrant civil id, if attributed.
    pub pedestrian_cc_id: Option<String>,
    /// Request time.
    pub timestamp: DateTime<Utc>,
}

impl From<CrossingRow> for PedestrianCrossingRequest {
    fn from(row: CrossingRow) -> Self {
        Self {
            id: CrossingRequestId::from(row.id),
            semaphore_id: SemaphoreId::from(row.semaphore_id),
            pedestrian_id: row.pedestrian_cc_id.as_deref().and_then(CivilId::parse),
            timestamp: row.timestamp,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

const TRAFFIC_COLUMNS: &str =
    "t.id, t.control_box_id, t.name, t.location, t.gpio_red, t.gpio_yellow, t.gpio_green, t.status";

const PEDESTRIAN_SEMAPHORE_COLUMNS: &str = "id, control_box_id, name, location, gpio_red, gpio_green, status, \
     has_card_reader, has_buzzer, has_button, gpio_button, button_threshold";

/// [`Store`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub(crate) const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch destination sets for the given traffic rows and assemble them.
    async fn with_destinations(
        &self,
        rows: Vec<TrafficRow>,
    ) -> Result<Vec<TrafficSemaphore>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let pairs = sqlx::query_as::<_, (Uuid, i32)>(
            r"SELECT semaphore_id, destination FROM destination WHERE semaphore_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut sets: BTreeMap<Uuid, BTreeSet<i32>> = BTreeMap::new();
        for (semaphore_id, destination) in pairs {
            sets.entry(semaphore_id).or_default().insert(destination);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let destinations = sets.remove(&row.id).unwrap_or_default();
                row.into_semaphore(destinations)
            })
            .collect())
    }

    async fn traffic_where<T>(
        &self,
        clause: &str,
        value: T,
    ) -> Result<Vec<TrafficSemaphore>, DbError>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    {
        let sql = format!("SELECT {TRAFFIC_COLUMNS} FROM t_semaphore t {clause}");
        let rows = sqlx::query_as::<_, TrafficRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        self.with_destinations(rows).await
    }

    async fn pedestrian_semaphores_where<T>(
        &self,
        clause: &str,
        value: T,
    ) -> Result<Vec<PedestrianSemaphore>, DbError>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    {
        let sql = format!("SELECT {PEDESTRIAN_SEMAPHORE_COLUMNS} FROM p_semaphore {clause}");
        let rows = sqlx::query_as::<_, PedestrianSemaphoreRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PedestrianSemaphore::from).collect())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_control_boxes(&self) -> Result<Vec<ControlBox>, DbError> {
        let rows = sqlx::query_as::<_, ControlBoxRow>(
            r"SELECT id, name, location, tmc_id, network_username, network_secret
              FROM control_box
              ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ControlBox::from).collect())
    }

    async fn get_control_box(&self, id: ControlBoxId) -> Result<Option<ControlBox>, DbError> {
        let row = sqlx::query_as::<_, ControlBoxRow>(
            r"SELECT id, name, location, tmc_id, network_username, network_secret
              FROM control_box
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ControlBox::from))
    }

    async fn upsert_control_box(&self, record: ControlBox) -> Result<ControlBox, DbError> {
        let row = sqlx::query_as::<_, ControlBoxRow>(
            r"INSERT INTO control_box (id, name, location, tmc_id, network_username, network_secret)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (id) DO UPDATE SET
                  name = EXCLUDED.name,
                  location = EXCLUDED.location,
                  tmc_id = EXCLUDED.tmc_id,
                  network_username = EXCLUDED.network_username,
                  network_secret = COALESCE(EXCLUDED.network_secret, control_box.network_secret)
              RETURNING id, name, location, tmc_id, network_username, network_secret",
        )
        .bind(record.id.into_inner())
        .bind(&record.name)
        .bind(&record.location)
        .bind(record.tmc_id.into_inner())
        .bind(&record.network_username)
        .bind(&record.network_secret)
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(control_box_id = %record.id, "Upserted control box");
        Ok(ControlBox::from(row))
    }

    async fn delete_control_box(&self, id: ControlBoxId) -> Result<bool, DbError> {
        let result = sqlx::query(r"DELETE FROM control_box WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_traffic_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.traffic_where(
            "WHERE t.control_box_id = $1 ORDER BY t.location, t.id",
            control_box_id.into_inner(),
        )
        .await
    }

    async fn list_pedestrian_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<PedestrianSemaphore>, DbError> {
        self.pedestrian_semaphores_where(
            "WHERE control_box_id = $1 ORDER BY location, id",
            control_box_id.into_inner(),
        )
        .await
    }

    async fn get_traffic(&self, id: SemaphoreId) -> Result<Option<TrafficSemaphore>, DbError> {
        let found = self
            .traffic_where("WHERE t.id = $1", id.into_inner())
            .await?;
        Ok(found.into_iter().next())
    }

    async fn get_pedestrian_semaphore(
        &self,
        id: SemaphoreId,
    ) -> Result<Option<PedestrianSemaphore>, DbError> {
        let found = self
            .pedestrian_semaphores_where("WHERE id = $1", id.into_inner())
            .await?;
        Ok(found.into_iter().next())
    }

    async fn traffic_at_location(&self, location: i32) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.traffic_where("WHERE t.location = $1 ORDER BY t.id", location)
            .await
    }

    async fn pedestrian_at_location(
        &self,
        location: i32,
    ) -> Result<Vec<PedestrianSemaphore>, DbError> {
        self.pedestrian_semaphores_where("WHERE location = $1 ORDER BY id", location)
            .await
    }

    async fn upsert_traffic(
        &self,
        mut record: TrafficSemaphore,
    ) -> Result<TrafficSemaphore, DbError> {
        let id = record.id.into_inner();
        let mut tx = self.pool.begin().await?;

        // Status is only written on insert; updates keep the stored value.
        let (status,) = sqlx::query_as::<_, (String,)>(
            r"INSERT INTO t_semaphore (id, control_box_id, name, location, gpio_red, gpio_yellow, gpio_green, status)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (id) DO UPDATE SET
                  control_box_id = EXCLUDED.control_box_id,
                  name = EXCLUDED.name,
                  location = EXCLUDED.location,
                  gpio_red = EXCLUDED.gpio_red,
                  gpio_yellow = EXCLUDED.gpio_yellow,
                  gpio_green = EXCLUDED.gpio_green
              RETURNING status",
        )
        .bind(id)
        .bind(record.control_box_id.into_inner())
        .bind(&record.name)
        .bind(record.location)
        .bind(record.gpio_red)
        .bind(record.gpio_yellow)
        .bind(record.gpio_green)
        .bind(record.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(r"DELETE FROM destination WHERE semaphore_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let destinations: Vec<i32> = record.destinations.iter().copied().collect();
        sqlx::query(
            r"INSERT INTO destination (semaphore_id, destination)
              SELECT $1, d FROM UNNEST($2::INTEGER[]) AS d",
        )
        .bind(id)
        .bind(&destinations)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        record.status = LightStatus::from_stored(Some(&status));
        tracing::debug!(
            semaphore_id = %record.id,
            destinations = destinations.len(),
            "Upserted traffic semaphore"
        );
        Ok(record)
    }

    async fn upsert_pedestrian_semaphore(
        &self,
        record: PedestrianSemaphore,
    ) -> Result<PedestrianSemaphore, DbError> {
        let sql = format!(
            r"INSERT INTO p_semaphore ({PEDESTRIAN_SEMAPHORE_COLUMNS})
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
              ON CONFLICT (id) DO UPDATE SET
                  control_box_id = EXCLUDED.control_box_id,
                  name = EXCLUDED.name,
                  location = EXCLUDED.location,
                  gpio_red = EXCLUDED.gpio_red,
                  gpio_green = EXCLUDED.gpio_green,
                  has_card_reader = EXCLUDED.has_card_reader,
                  has_buzzer = EXCLUDED.has_buzzer,
                  has_button = EXCLUDED.has_button,
                  gpio_button = EXCLUDED.gpio_button,
                  button_threshold = EXCLUDED.button_threshold
              RETURNING {PEDESTRIAN_SEMAPHORE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PedestrianSemaphoreRow>(&sql)
            .bind(record.id.into_inner())
            .bind(record.control_box_id.into_inner())
            .bind(&record.name)
            .bind(record.location)
            .bind(record.gpio_red)
            .bind(record.gpio_green)
            .bind(record.status.as_str())
            .bind(record.has_card_reader)
            .bind(record.has_buzzer)
            .bind(record.has_button)
            .bind(record.gpio_button)
            .bind(record.button_threshold)
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!(semaphore_id = %record.id, "Upserted pedestrian semaphore");
        Ok(PedestrianSemaphore::from(row))
    }

    async fn delete_semaphore(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
    ) -> Result<bool, DbError> {
        // `destination` rows cascade with their traffic semaphore.
        let sql = match kind {
            SemaphoreKind::Traffic => r"DELETE FROM t_semaphore WHERE id = $1",
            SemaphoreKind::Pedestrian => r"DELETE FROM p_semaphore WHERE id = $1",
        };
        let result = sqlx::query(sql)
            .bind(id.into_inner())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn traffic_serving(&self, destination: i32) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.traffic_where(
            "JOIN destination d ON d.semaphore_id = t.id \
             WHERE d.destination = $1 ORDER BY t.location, t.id",
            destination,
        )
        .await
    }

    async fn set_status(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
        status: LightStatus,
    ) -> Result<Option<LightStatus>, DbError> {
        let sql = match kind {
            SemaphoreKind::Traffic => {
                r"UPDATE t_semaphore SET status = $2 WHERE id = $1 RETURNING status"
            }
            SemaphoreKind::Pedestrian => {
                r"UPDATE p_semaphore SET status = $2 WHERE id = $1 RETURNING status"
            }
        };
        let committed = sqlx::query_as::<_, (String,)>(sql)
            .bind(id.into_inner())
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(committed.map(|(s,)| LightStatus::from_stored(Some(&s))))
    }

    async fn upsert_pedestrian(&self, record: Pedestrian) -> Result<Pedestrian, DbError> {
        let row = sqlx::query_as::<_, PedestrianRow>(
            r"INSERT INTO pedestrian (cc_id, name, physical_tag_id, disability)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (cc_id) DO UPDATE SET
                  name = EXCLUDED.name,
                  physical_tag_id = EXCLUDED.physical_tag_id,
                  disability = EXCLUDED.disability
              RETURNING cc_id, name, physical_tag_id, disability",
        )
        .bind(record.cc_id.as_str())
        .bind(&record.name)
        .bind(&record.physical_tag_id)
        .bind(record.disability)
        .fetch_one(&self.pool)
        .await?;
        Pedestrian::try_from(row)
    }

    async fn get_pedestrian(&self, cc_id: &CivilId) -> Result<Option<Pedestrian>, DbError> {
        let row = sqlx::query_as::<_, PedestrianRow>(
            r"SELECT cc_id, name, physical_tag_id, disability FROM pedestrian WHERE cc_id = $1",
        )
        .bind(cc_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Pedestrian::try_from).transpose()
    }

    async fn find_pedestrian_by_tag(&self, tag: &str) -> Result<Option<Pedestrian>, DbError> {
        let row = sqlx::query_as::<_, PedestrianRow>(
            r"SELECT cc_id, name, physical_tag_id, disability FROM pedestrian WHERE physical_tag_id = $1",
        )
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Pedestrian::try_from).transpose()
    }

    async fn append_emergency(
        &self,
        record: EmergencyVehicleRequest,
    ) -> Result<EmergencyVehicleRequest, DbError> {
        sqlx::query(
            r#"INSERT INTO emergency_vehicle (id, tmc_id, control_box_id, license_plate, origin, destination, priority_level, "timestamp")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(record.id.into_inner())
        .bind(record.tmc_id.into_inner())
        .bind(record.control_box_id.into_inner())
        .bind(&record.license_plate)
        .bind(record.origin)
        .bind(record.destination)
        .bind(record.priority_level.code())
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn recent_emergency(&self, limit: u32) -> Result<Vec<EmergencyVehicleRequest>, DbError> {
        let rows = sqlx::query_as::<_, EmergencyRow>(
            r#"SELECT id, tmc_id, control_box_id, license_plate, origin, destination, priority_level, "timestamp"
               FROM emergency_vehicle
               ORDER BY "timestamp" DESC, id DESC
               LIMIT $1"#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(EmergencyVehicleRequest::try_from)
            .collect()
    }

    async fn append_crossing(
        &self,
        record: PedestrianCrossingRequest,
    ) -> Result<PedestrianCrossingRequest, DbError> {
        sqlx::query(
            r#"INSERT INTO pedestrian_crossing (id, semaphore_id, pedestrian_cc_id, "timestamp")
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(record.id.into_inner())
        .bind(record.semaphore_id.into_inner())
        .bind(record.pedestrian_id.as_ref().map(CivilId::as_str))
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn recent_crossings(
        &self,
        limit: u32,
    ) -> Result<Vec<PedestrianCrossingRequest>, DbError> {
        let rows = sqlx::query_as::<_, CrossingRow>(
            r#"SELECT id, semaphore_id, pedestrian_cc_id, "timestamp"
               FROM pedestrian_crossing
               ORDER BY "timestamp" DESC, id DESC
               LIMIT $1"#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(PedestrianCrossingRequest::from)
            .collect())
    }
}
