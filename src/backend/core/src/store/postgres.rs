//! PostgreSQL store.
//!
//! Uses runtime-checked queries so the crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::{info, instrument};

use super::{TenantStore, UserFilter, UserStore};
use crate::config::DatabaseConfig;
use crate::error::{ErrorCode, Result, TrackError};
use crate::rbac::{Gender, Role, User, UserId, UserStatus};
use crate::tenant::{Tenant, TenantId, TenantStatus};

const TENANT_COLUMNS: &str = "id, name, phone_number, address, subdomain, status, director_id, \
                              logo, price, created_at, updated_at";

const USER_COLUMNS: &str = "id, tenant_id, full_name, phone_number, role, status, gender, \
                            password_hash, guardian_name, guardian_phone_number, address, salary, \
                            birthday, created_at, updated_at";

/// Database connection pool and queries.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a connection pool. Connecting is bounded by `connect_timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = tokio::time::timeout(
            config.connect_timeout,
            PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.connect_timeout)
                .connect(&config.url),
        )
        .await
        .map_err(|_| {
            TrackError::new(ErrorCode::DatabaseConnectionFailed, "Database connection timed out")
                .with_context("timeout_secs", config.connect_timeout.as_secs())
        })??;

        info!(max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query, bounded by `timeout`.
    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&self.pool)).await??;
        Ok(())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tenant Queries
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl TenantStore for PgStore {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE id = $1",
            TENANT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE subdomain = $1",
            TENANT_COLUMNS
        ))
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from).transpose()
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    async fn insert(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, phone_number, address, subdomain, status,
                                 director_id, logo, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.phone_number)
        .bind(&tenant.address)
        .bind(&tenant.subdomain)
        .bind(tenant.status.as_str())
        .bind(tenant.director_id.as_ref().map(UserId::as_str))
        .bind(tenant.logo.as_deref())
        .bind(tenant.price)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    async fn update(&self, tenant: &Tenant) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET name = $2, phone_number = $3, address = $4, subdomain = $5, status = $6,
                director_id = $7, logo = $8, price = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.phone_number)
        .bind(&tenant.address)
        .bind(&tenant.subdomain)
        .bind(tenant.status.as_str())
        .bind(tenant.director_id.as_ref().map(UserId::as_str))
        .bind(tenant.logo.as_deref())
        .bind(tenant.price)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TrackError::not_found("Tenant", tenant.id.as_str()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE status <> 'DELETED'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE status <> 'DELETED' \
             ORDER BY created_at, id LIMIT $1 OFFSET $2",
            TENANT_COLUMNS
        ))
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tenant::try_from).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Queries
// ═══════════════════════════════════════════════════════════════════════════════

/// `WHERE` clause shared by count and list. `$1` tenant, `$2` role, `$3` pattern.
const USER_FILTER: &str = "tenant_id = $1 AND status <> 'DELETED' \
                           AND ($2::TEXT IS NULL OR role = $2) \
                           AND ($3::TEXT IS NULL OR phone_number ILIKE $3 OR full_name ILIKE $3)";

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self, phone))]
    async fn find_by_phone_in_tenant(&self, tenant_id: &TenantId, phone: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE tenant_id = $1 AND phone_number = $2",
            USER_COLUMNS
        ))
        .bind(tenant_id.as_str())
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, full_name, phone_number, role, status, gender,
                               password_hash, guardian_name, guardian_phone_number, address,
                               salary, birthday, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id.as_str())
        .bind(user.tenant_id.as_str())
        .bind(&user.full_name)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.gender.map(|g| g.as_str()))
        .bind(&user.password_hash)
        .bind(user.guardian_name.as_deref())
        .bind(user.guardian_phone_number.as_deref())
        .bind(user.address.as_deref())
        .bind(user.salary)
        .bind(user.birthday)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = $2, phone_number = $3, role = $4, status = $5, gender = $6,
                password_hash = $7, guardian_name = $8, guardian_phone_number = $9,
                address = $10, salary = $11, birthday = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.full_name)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.gender.map(|g| g.as_str()))
        .bind(&user.password_hash)
        .bind(user.guardian_name.as_deref())
        .bind(user.guardian_phone_number.as_deref())
        .bind(user.address.as_deref())
        .bind(user.salary)
        .bind(user.birthday)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TrackError::not_found("User", user.id.as_str()));
        }
        Ok(())
    }

    async fn count_matching(&self, filter: &UserFilter) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {}", USER_FILTER))
            .bind(filter.tenant_id.as_str())
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_matching(&self, filter: &UserFilter, offset: u64, limit: u64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at, id LIMIT $4 OFFSET $5",
            USER_COLUMNS, USER_FILTER
        ))
        .bind(filter.tenant_id.as_str())
        .bind(filter.role.map(|r| r.as_str()))
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub struct TenantRow {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub subdomain: String,
    pub status: String,
    pub director_id: Option<String>,
    pub logo: Option<String>,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = TrackError;

    fn try_from(row: TenantRow) -> Result<Self> {
        let status = TenantStatus::parse(&row.status).ok_or_else(|| {
            TrackError::internal(format!("Unknown tenant status in database: {}", row.status))
        })?;

        Ok(Tenant {
            id: TenantId(row.id),
            name: row.name,
            phone_number: row.phone_number,
            address: row.address,
            subdomain: row.subdomain,
            status,
            director_id: row.director_id.map(UserId),
            logo: row.logo,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub tenant_id: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: String,
    pub status: String,
    pub gender: Option<String>,
    pub password_hash: String,
    pub guardian_name: Option<String>,
    pub guardian_phone_number: Option<String>,
    pub address: Option<String>,
    pub salary: Option<i64>,
    pub birthday: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = TrackError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role: Role = row.role.parse().map_err(|_| {
            TrackError::internal(format!("Unknown role in database: {}", row.role))
        })?;
        let status = UserStatus::parse(&row.status).ok_or_else(|| {
            TrackError::internal(format!("Unknown user status in database: {}", row.status))
        })?;

        Ok(User {
            id: UserId(row.id),
            tenant_id: TenantId(row.tenant_id),
            full_name: row.full_name,
            phone_number: row.phone_number,
            role,
            status,
            gender: row.gender.as_deref().and_then(Gender::parse),
            password_hash: row.password_hash,
            guardian_name: row.guardian_name,
            guardian_phone_number: row.guardian_phone_number,
            address: row.address,
            salary: row.salary,
            birthday: row.birthday,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("ada"), "%ada%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let row = TenantRow {
            id: "t-1".to_string(),
            name: "Acme".to_string(),
            phone_number: "+998901234567".to_string(),
            address: "Main st".to_string(),
            subdomain: "acme".to_string(),
            status: "ARCHIVED".to_string(),
            director_id: None,
            logo: None,
            price: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Tenant::try_from(row).is_err());
    }

    #[test]
    fn test_user_row_conversion() {
        let row = UserRow {
            id: "u-1".to_string(),
            tenant_id: "t-1".to_string(),
            full_name: "Ada".to_string(),
            phone_number: "+1".to_string(),
            role: "TEACHER".to_string(),
            status: "ACTIVE".to_string(),
            gender: Some("FEMALE".to_string()),
            password_hash: "hash".to_string(),
            guardian_name: None,
            guardian_phone_number: None,
            address: None,
            salary: None,
            birthday: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let user = User::try_from(row).unwrap();
        assert_eq!(user.role, Role::Teacher);
        assert_eq!(user.gender, Some(Gender::Female));
    }
}
