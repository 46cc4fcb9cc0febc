//! Inventory reference lookups
//!
//! The deployment pipeline only consumes the names of datacenters, clusters
//! and networks. These helpers verify that a referenced row exists before a
//! job is accepted.

use sqlx::PgPool;

pub async fn datacenter_exists(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    exists(pool, "SELECT 1 FROM datacenters WHERE id = $1", id).await
}

pub async fn cluster_exists(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    exists(pool, "SELECT 1 FROM clusters WHERE id = $1", id).await
}

pub async fn network_exists(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    exists(pool, "SELECT 1 FROM networks WHERE id = $1", id).await
}

async fn exists(pool: &PgPool, query: &str, id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as(query).bind(id).fetch_optional(pool).await?;
    Ok(row.is_some())
}
