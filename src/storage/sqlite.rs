//! SQLite-backed [`ResourceStore`].
//!
//! Each entity kind has its own table holding the canonical JSON of the
//! validated entity. A commit runs inside one `BEGIN IMMEDIATE` sqlx
//! transaction: references and the superseded version are re-checked there,
//! so a concurrent writer either sees the whole graph or none of it. Lock
//! contention that outlasts the busy timeout is reported as a conflict.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

use crate::domain::{
    Certificate, CertificateId, CertificateType, CommittedId, Configuration, ConfigurationId,
    Loadbalancer, LoadbalancerId, NewCertificate, ResourceGraph, Route, RouteId, ServiceTarget,
    ServiceTargetId,
};
use crate::errors::{AglbError, Result};
use crate::storage::repository::{certificate_owners, check_supersedes, ResourceStore};
use crate::storage::DbPool;

/// Tables whose rows carry a JSON body
#[derive(Debug, Clone, Copy)]
enum EntityTable {
    Loadbalancers,
    Configurations,
    Routes,
    ServiceTargets,
}

impl EntityTable {
    fn name(self) -> &'static str {
        match self {
            EntityTable::Loadbalancers => "loadbalancers",
            EntityTable::Configurations => "configurations",
            EntityTable::Routes => "routes",
            EntityTable::ServiceTargets => "service_targets",
        }
    }

    fn resource_type(self) -> &'static str {
        match self {
            EntityTable::Loadbalancers => "loadbalancer",
            EntityTable::Configurations => "configuration",
            EntityTable::Routes => "route",
            EntityTable::ServiceTargets => "service_target",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct BodyRow {
    body: String,
    version: i64,
}

#[derive(Debug, Clone, FromRow)]
struct CertificateRow {
    id: i64,
    label: String,
    certificate_type: String,
}

impl TryFrom<CertificateRow> for Certificate {
    type Error = AglbError;

    fn try_from(row: CertificateRow) -> Result<Self> {
        let certificate_type = match row.certificate_type.as_str() {
            "ca" => CertificateType::Ca,
            "downstream" => CertificateType::Downstream,
            other => {
                return Err(AglbError::serialization(format!(
                    "certificate {} has unknown type '{}'",
                    row.id, other
                )))
            }
        };
        Ok(Certificate { id: CertificateId::new(row.id), label: row.label, certificate_type })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_entity<T: DeserializeOwned>(
        &self,
        table: EntityTable,
        id: i64,
    ) -> Result<Option<(T, i64)>> {
        let sql = format!("SELECT body, version FROM {} WHERE id = $1", table.name());
        let row = sqlx::query_as::<_, BodyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, table = table.name(), id, "Failed to fetch entity");
                AglbError::database(
                    e,
                    format!("Failed to get {} with ID '{}'", table.resource_type(), id),
                )
            })?;

        row.map(|row| {
            let entity = serde_json::from_str(&row.body).map_err(|e| {
                AglbError::serialization(format!(
                    "Stored {} {} is not valid JSON: {}",
                    table.resource_type(),
                    id,
                    e
                ))
            })?;
            Ok((entity, row.version))
        })
        .transpose()
    }

    /// Write a validated graph in one `BEGIN IMMEDIATE` transaction. Taking
    /// the write lock up front means a second writer waits on the busy
    /// timeout instead of failing halfway through a deferred upgrade.
    async fn commit_graph(&self, graph: &ResourceGraph) -> Result<CommittedId> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| AglbError::database(e, "Failed to begin commit transaction"))?;

        let references = &graph.references;
        for id in &references.configurations {
            ensure_exists(&mut *tx, "configurations", "configuration", id.get()).await?;
        }
        for id in &references.routes {
            ensure_exists(&mut *tx, "routes", "route", id.get()).await?;
        }
        for id in &references.service_targets {
            ensure_exists(&mut *tx, "service_targets", "service_target", id.get()).await?;
        }
        for id in &references.certificates {
            ensure_exists(&mut *tx, "certificates", "certificate", id.get()).await?;
        }

        let stored_version = match &graph.loadbalancer {
            Some(loadbalancer) => stored_version(&mut *tx, loadbalancer.id).await?,
            None => None,
        };
        check_supersedes(graph, stored_version)?;

        let now = chrono::Utc::now();

        // Targets reused by id are committed already and never rewritten
        for target in &graph.service_targets {
            if references.service_targets.contains(&target.id) {
                continue;
            }
            insert_entity(
                &mut *tx,
                EntityTable::ServiceTargets,
                target.id.get(),
                &target.label,
                target,
                now,
            )
            .await?;
        }
        for route in &graph.routes {
            insert_entity(&mut *tx, EntityTable::Routes, route.id.get(), &route.label, route, now).await?;
        }
        for configuration in &graph.configurations {
            insert_entity(
                &mut *tx,
                EntityTable::Configurations,
                configuration.id.get(),
                &configuration.label,
                configuration,
                now,
            )
            .await?;
            clear_certificate_owner(&mut *tx, "configuration", configuration.id.get()).await?;
        }
        for (certificate_id, owner_kind, owner_id) in certificate_owners(graph) {
            sqlx::query(
                "INSERT OR IGNORE INTO certificate_references (certificate_id, owner_kind, owner_id) VALUES ($1, $2, $3)",
            )
            .bind(certificate_id.get())
            .bind(owner_kind)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AglbError::database(e, "Failed to record certificate reference"))?;
        }

        if let Some(loadbalancer) = &graph.loadbalancer {
            write_loadbalancer(&mut *tx, graph, loadbalancer, now).await?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit resource graph");
            AglbError::database(e, "Failed to commit resource graph")
        })?;

        tracing::info!(
            root = ?graph.root,
            configurations = graph.configurations.len(),
            routes = graph.routes.len(),
            service_targets = graph.service_targets.len(),
            "Committed resource graph"
        );

        Ok(graph.root)
    }

    async fn delete_unreferenced_certificate(&self, id: CertificateId) -> Result<()> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| AglbError::database(e, "Failed to begin delete transaction"))?;

        ensure_exists(&mut *tx, "certificates", "certificate", id.get()).await?;

        let owners = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM certificate_references WHERE certificate_id = $1",
        )
        .bind(id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AglbError::database(e, "Failed to count certificate references"))?;

        if owners > 0 {
            return Err(AglbError::conflict(
                format!("certificate {} is still referenced by {} resource(s)", id, owners),
                "certificate",
            ));
        }

        sqlx::query("DELETE FROM certificates WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| AglbError::database(e, format!("Failed to delete certificate '{}'", id)))?;

        tx.commit()
            .await
            .map_err(|e| AglbError::database(e, "Failed to commit certificate deletion"))?;

        tracing::info!(certificate_id = %id, "Deleted certificate");
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for SqliteStore {
    #[instrument(skip(self), fields(loadbalancer_id = %id), name = "db_get_loadbalancer_by_id")]
    async fn get_loadbalancer_by_id(&self, id: LoadbalancerId) -> Result<Option<Loadbalancer>> {
        let found = self.fetch_entity::<Loadbalancer>(EntityTable::Loadbalancers, id.get()).await?;
        Ok(found.map(|(mut loadbalancer, version)| {
            loadbalancer.version = version;
            loadbalancer
        }))
    }

    #[instrument(skip(self), fields(configuration_id = %id), name = "db_get_configuration_by_id")]
    async fn get_configuration_by_id(&self, id: ConfigurationId) -> Result<Option<Configuration>> {
        let found = self.fetch_entity(EntityTable::Configurations, id.get()).await?;
        Ok(found.map(|(configuration, _)| configuration))
    }

    #[instrument(skip(self), fields(route_id = %id), name = "db_get_route_by_id")]
    async fn get_route_by_id(&self, id: RouteId) -> Result<Option<Route>> {
        let found = self.fetch_entity(EntityTable::Routes, id.get()).await?;
        Ok(found.map(|(route, _)| route))
    }

    #[instrument(skip(self), fields(service_target_id = %id), name = "db_get_service_target_by_id")]
    async fn get_service_target_by_id(&self, id: ServiceTargetId) -> Result<Option<ServiceTarget>> {
        let found = self.fetch_entity(EntityTable::ServiceTargets, id.get()).await?;
        Ok(found.map(|(target, _)| target))
    }

    #[instrument(skip(self), fields(certificate_id = %id), name = "db_get_certificate_by_id")]
    async fn get_certificate_by_id(&self, id: CertificateId) -> Result<Option<Certificate>> {
        let row = sqlx::query_as::<_, CertificateRow>(
            "SELECT id, label, certificate_type FROM certificates WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, certificate_id = %id, "Failed to get certificate by ID");
            AglbError::database(e, format!("Failed to get certificate with ID '{}'", id))
        })?;

        row.map(Certificate::try_from).transpose()
    }

    #[instrument(skip(self), name = "db_max_id")]
    async fn max_id(&self) -> Result<i64> {
        let max = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(id) FROM (
                SELECT id FROM loadbalancers
                UNION ALL SELECT id FROM configurations
                UNION ALL SELECT id FROM routes
                UNION ALL SELECT id FROM service_targets
                UNION ALL SELECT id FROM certificates
            )",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AglbError::database(e, "Failed to read highest entity id"))?;

        Ok(max.unwrap_or(0))
    }

    #[instrument(
        skip(self, graph),
        fields(root = ?graph.root, entities = graph.entity_count()),
        name = "db_commit_graph"
    )]
    async fn commit(&self, graph: &ResourceGraph) -> Result<CommittedId> {
        self.commit_graph(graph).await.map_err(|e| busy_as_conflict(e, "loadbalancer"))
    }

    #[instrument(skip(self, certificate), fields(certificate_id = %certificate.id), name = "db_insert_certificate")]
    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate> {
        let result = sqlx::query(
            "INSERT INTO certificates (id, label, certificate_type, certificate, private_key, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(certificate.id.get())
        .bind(&certificate.label)
        .bind(certificate.certificate_type.as_str())
        .bind(&certificate.certificate)
        .bind(&certificate.key)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    certificate_id = %certificate.id,
                    certificate_type = %certificate.certificate_type,
                    "Created certificate"
                );
                Ok(certificate.summary())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AglbError::conflict(
                    format!("certificate id {} is already in use", certificate.id),
                    "certificate",
                ))
            }
            Err(e) => {
                tracing::error!(error = %e, certificate_id = %certificate.id, "Failed to create certificate");
                Err(AglbError::database(e, format!("Failed to create certificate '{}'", certificate.label)))
            }
        }
    }

    #[instrument(skip(self), fields(certificate_id = %id), name = "db_delete_certificate")]
    async fn delete_certificate(&self, id: CertificateId) -> Result<()> {
        self.delete_unreferenced_certificate(id).await.map_err(|e| busy_as_conflict(e, "certificate"))
    }
}

/// SQLite primary result codes for lock contention (`SQLITE_BUSY`, `SQLITE_LOCKED`).
/// Extended codes carry the primary code in the low byte.
fn is_lock_contention(error: &dyn sqlx::error::DatabaseError) -> bool {
    error
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

/// Lock contention means another writer won the race; report it as a
/// retryable conflict rather than a database failure.
fn busy_as_conflict(error: AglbError, resource_type: &str) -> AglbError {
    match error {
        AglbError::Database { source: sqlx::Error::Database(db_err), context }
            if is_lock_contention(&*db_err) =>
        {
            tracing::warn!(error = %db_err, %context, "Database is locked by a concurrent writer");
            AglbError::conflict(
                format!("{}: database is locked by a concurrent writer, retry the request", context),
                resource_type,
            )
        }
        other => other,
    }
}

async fn exists(conn: &mut SqliteConnection, table: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = $1", table);
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AglbError::database(e, format!("Failed to look up {} {}", table, id)))?;
    Ok(count > 0)
}

async fn ensure_exists(
    conn: &mut SqliteConnection,
    table: &str,
    resource_type: &str,
    id: i64,
) -> Result<()> {
    if exists(conn, table, id).await? {
        Ok(())
    } else {
        tracing::warn!(resource_type, id, "Referenced entity disappeared before commit");
        Err(AglbError::not_found(resource_type, id.to_string()))
    }
}

async fn stored_version(conn: &mut SqliteConnection, id: LoadbalancerId) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT version FROM loadbalancers WHERE id = $1")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AglbError::database(e, format!("Failed to read version of loadbalancer {}", id)))
}

fn to_body<T: Serialize>(table: EntityTable, id: i64, entity: &T) -> Result<String> {
    serde_json::to_string(entity).map_err(|e| {
        AglbError::serialization(format!(
            "Failed to serialize {} {}: {}",
            table.resource_type(),
            id,
            e
        ))
    })
}

async fn insert_entity<T: Serialize>(
    conn: &mut SqliteConnection,
    table: EntityTable,
    id: i64,
    label: &str,
    entity: &T,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if exists(conn, table.name(), id).await? {
        return Err(AglbError::conflict(
            format!("{} id {} is already in use", table.resource_type(), id),
            table.resource_type(),
        ));
    }

    let body = to_body(table, id, entity)?;
    let sql = format!(
        "INSERT INTO {} (id, label, body, version, created_at, updated_at) VALUES ($1, $2, $3, 1, $4, $5)",
        table.name()
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(label)
        .bind(&body)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, table = table.name(), id, "Failed to insert entity");
            AglbError::database(e, format!("Failed to create {} '{}'", table.resource_type(), label))
        })?;
    Ok(())
}

async fn clear_certificate_owner(conn: &mut SqliteConnection, owner_kind: &str, owner_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM certificate_references WHERE owner_kind = $1 AND owner_id = $2")
        .bind(owner_kind)
        .bind(owner_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AglbError::database(e, "Failed to clear certificate references"))?;
    Ok(())
}

async fn write_loadbalancer(
    conn: &mut SqliteConnection,
    graph: &ResourceGraph,
    loadbalancer: &Loadbalancer,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let body = to_body(EntityTable::Loadbalancers, loadbalancer.id.get(), loadbalancer)?;

    let Some(supersedes) = graph.supersedes else {
        sqlx::query(
            "INSERT INTO loadbalancers (id, label, hostname, body, version, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(loadbalancer.id.get())
        .bind(&loadbalancer.label)
        .bind(&loadbalancer.hostname)
        .bind(&body)
        .bind(loadbalancer.version)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AglbError::database(e, format!("Failed to create loadbalancer '{}'", loadbalancer.label))
        })?;
        return Ok(());
    };

    // The version guard repeats check_supersedes inside the UPDATE itself
    let result = sqlx::query(
        "UPDATE loadbalancers SET label = $1, hostname = $2, body = $3, version = $4, updated_at = $5 WHERE id = $6 AND version = $7",
    )
    .bind(&loadbalancer.label)
    .bind(&loadbalancer.hostname)
    .bind(&body)
    .bind(loadbalancer.version)
    .bind(now)
    .bind(supersedes.id.get())
    .bind(supersedes.version)
    .execute(&mut *conn)
    .await
    .map_err(|e| AglbError::database(e, format!("Failed to update loadbalancer {}", supersedes.id)))?;

    if result.rows_affected() == 0 {
        return Err(AglbError::conflict(
            format!("loadbalancer {} was modified concurrently", supersedes.id),
            "loadbalancer",
        ));
    }
    Ok(())
}
