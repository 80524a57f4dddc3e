use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use super::model::{
    Identity, IdentityChanges, IdentityCounts, IdentityFilter, IdentityRow, NewIdentity,
    NewSellerProfile, ProfileChange, Role, SearchTerm, SellerProfile, SellerProfileChanges, Status,
};
use super::store::{IdentityStore, StoreError, UniqueField, UniqueProbe};

const IDENTITY_COLUMNS: &str =
    "id, username, email, phone, password_hash, role, status, last_login_at, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, user_id, farm_name, location_province, location_district, \
     location_commune, location_village, description, certification, bank_name, \
     bank_account_name, bank_account_number, rating, total_sales, created_at, updated_at";

/// Postgres-backed identity store.
#[derive(Clone)]
pub struct PgIdentityStore {
    db: PgPool,
}

impl PgIdentityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        row.map(into_identity).transpose()
    }
}

fn into_identity(row: IdentityRow) -> Result<Identity, StoreError> {
    let id = row.id;
    Identity::try_from(row).map_err(|e| StoreError::Corrupt(format!("users.id={id}: {e}")))
}

/// Turns a unique-constraint violation on `users` into `StoreError::Duplicate`.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            if let Some(field) = db.constraint().and_then(UniqueField::from_constraint) {
                return StoreError::Duplicate(field);
            }
        }
    }
    StoreError::Database(e)
}

async fn insert_profile(
    conn: &mut PgConnection,
    user_id: i64,
    p: &NewSellerProfile,
) -> Result<SellerProfile, StoreError> {
    let sql = format!(
        r#"
        INSERT INTO seller_profiles (
            user_id, farm_name, location_province, location_district, location_commune,
            location_village, description, certification, bank_name, bank_account_name,
            bank_account_number
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {PROFILE_COLUMNS}
        "#
    );
    let profile = sqlx::query_as::<_, SellerProfile>(&sql)
        .bind(user_id)
        .bind(&p.farm_name)
        .bind(&p.location_province)
        .bind(&p.location_district)
        .bind(&p.location_commune)
        .bind(&p.location_village)
        .bind(&p.description)
        .bind(&p.certification)
        .bind(&p.bank_name)
        .bind(&p.bank_account_name)
        .bind(&p.bank_account_number)
        .fetch_one(&mut *conn)
        .await?;
    Ok(profile)
}

async fn update_profile(
    conn: &mut PgConnection,
    user_id: i64,
    changes: SellerProfileChanges,
) -> Result<SellerProfile, StoreError> {
    let select = format!("SELECT {PROFILE_COLUMNS} FROM seller_profiles WHERE user_id = $1 FOR UPDATE");
    let mut profile = sqlx::query_as::<_, SellerProfile>(&select)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound)?;
    changes.apply(&mut profile);

    let sql = format!(
        r#"
        UPDATE seller_profiles
           SET farm_name = $2, location_province = $3, location_district = $4,
               location_commune = $5, location_village = $6, description = $7,
               certification = $8, bank_name = $9, bank_account_name = $10,
               bank_account_number = $11, updated_at = now()
         WHERE user_id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    );
    let profile = sqlx::query_as::<_, SellerProfile>(&sql)
        .bind(user_id)
        .bind(&profile.farm_name)
        .bind(&profile.location_province)
        .bind(&profile.location_district)
        .bind(&profile.location_commune)
        .bind(&profile.location_village)
        .bind(&profile.description)
        .bind(&profile.certification)
        .bind(&profile.bank_name)
        .bind(&profile.bank_account_name)
        .bind(&profile.bank_account_number)
        .fetch_one(&mut *conn)
        .await?;
    Ok(profile)
}

/// `%term%` for `LIKE ... ESCAPE '\'`, with wildcards in `term` taken literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &IdentityFilter) {
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(term) = &filter.search {
        let pattern = contains_pattern(&term.text);
        qb.push(" AND (LOWER(username) LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR LOWER(email) LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\'");
        if !term.phone.is_empty() {
            qb.push(" OR phone LIKE ")
                .push_bind(contains_pattern(&term.phone))
                .push(r" ESCAPE '\'");
        }
        qb.push(")");
    }
    qb.push(" ORDER BY id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(into_identity).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.find_one("email", email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        self.find_one("phone", phone).await
    }

    async fn taken_fields(&self, probe: UniqueProbe<'_>) -> Result<Vec<UniqueField>, StoreError> {
        let candidates = [
            (UniqueField::Username, probe.username),
            (UniqueField::Email, probe.email),
            (UniqueField::Phone, probe.phone),
        ];
        let mut taken = Vec::new();
        for (field, value) in candidates {
            let Some(value) = value else { continue };
            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM users WHERE {} = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
                field.as_str()
            );
            let exists: bool = sqlx::query_scalar(&sql)
                .bind(value)
                .bind(probe.except_id)
                .fetch_one(&self.db)
                .await?;
            if exists {
                taken.push(field);
            }
        }
        Ok(taken)
    }

    async fn create(
        &self,
        identity: NewIdentity,
        profile: Option<NewSellerProfile>,
    ) -> Result<(Identity, Option<SellerProfile>), StoreError> {
        let mut tx = self.db.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO users (username, email, phone, password_hash, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {IDENTITY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(&identity.username)
            .bind(&identity.email)
            .bind(&identity.phone)
            .bind(&identity.password_hash)
            .bind(identity.role.as_str())
            .bind(identity.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_unique)?;
        let created = into_identity(row)?;

        let profile = match profile {
            Some(p) => Some(insert_profile(&mut tx, created.id, &p).await?),
            None => None,
        };

        tx.commit().await?;
        Ok((created, profile))
    }

    async fn update(
        &self,
        id: i64,
        expected_role: Option<Role>,
        changes: IdentityChanges,
        profile: ProfileChange,
    ) -> Result<Identity, StoreError> {
        let mut tx = self.db.begin().await?;

        let locked: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        if let Some(expected) = expected_role {
            let found: Role = locked
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("users.id={id}: {e}")))?;
            if found != expected {
                return Err(StoreError::RoleChanged { expected, found });
            }
        }

        let sql = format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   phone = COALESCE($4, phone),
                   password_hash = COALESCE($5, password_hash),
                   role = COALESCE($6, role),
                   status = COALESCE($7, status),
                   updated_at = now()
             WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.phone)
            .bind(&changes.password_hash)
            .bind(changes.role.map(Role::as_str))
            .bind(changes.status.map(Status::as_str))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_unique)?
            .ok_or(StoreError::NotFound)?;
        let updated = into_identity(row)?;

        match profile {
            ProfileChange::Keep => {}
            ProfileChange::Remove => {
                sqlx::query("DELETE FROM seller_profiles WHERE user_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            ProfileChange::Create(p) => {
                insert_profile(&mut tx, id, &p).await?;
            }
            ProfileChange::Update(c) => {
                update_profile(&mut tx, id, c).await?;
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: &IdentityFilter) -> Result<Vec<Identity>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE TRUE"
        ));
        push_filter(&mut qb, filter);
        let rows = qb
            .build_query_as::<IdentityRow>()
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(into_identity).collect()
    }

    async fn counts(&self) -> Result<IdentityCounts, StoreError> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT role, status, COUNT(*) FROM users GROUP BY role, status")
                .fetch_all(&self.db)
                .await?;
        let mut counts = IdentityCounts::default();
        for (role, status, n) in rows {
            let role: Role = role.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))?;
            let status: Status = status.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))?;
            counts.add(role, status, n);
        }
        Ok(counts)
    }

    async fn seller_profile(&self, user_id: i64) -> Result<Option<SellerProfile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM seller_profiles WHERE user_id = $1");
        let profile = sqlx::query_as::<_, SellerProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(profile)
    }

    async fn list_sellers(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<(Identity, SellerProfile)>, StoreError> {
        let filter = IdentityFilter { role: Some(Role::Seller), ..filter.clone() };
        let sellers = self.list(&filter).await?;
        let ids: Vec<i64> = sellers.iter().map(|s| s.id).collect();

        let sql = format!("SELECT {PROFILE_COLUMNS} FROM seller_profiles WHERE user_id = ANY($1)");
        let profiles = sqlx::query_as::<_, SellerProfile>(&sql)
            .bind(&ids[..])
            .fetch_all(&self.db)
            .await?;
        let mut by_user: HashMap<i64, SellerProfile> =
            profiles.into_iter().map(|p| (p.user_id, p)).collect();

        let mut out = Vec::with_capacity(sellers.len());
        for seller in sellers {
            let profile = by_user
                .remove(&seller.id)
                .ok_or_else(|| StoreError::Corrupt(format!("seller {} has no profile", seller.id)))?;
            out.push((seller, profile));
        }
        Ok(out)
    }

    async fn update_seller_profile(
        &self,
        user_id: i64,
        changes: SellerProfileChanges,
    ) -> Result<SellerProfile, StoreError> {
        let mut tx = self.db.begin().await?;
        let profile = update_profile(&mut tx, user_id, changes).await?;
        tx.commit().await?;
        Ok(profile)
    }
}
