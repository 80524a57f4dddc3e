//! In-memory `IdentityStore` for unit tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::model::{
    Identity, IdentityChanges, IdentityCounts, IdentityFilter, NewIdentity, NewSellerProfile,
    ProfileChange, Role, SellerProfile, SellerProfileChanges,
};
use super::store::{IdentityStore, StoreError, UniqueField, UniqueProbe};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, Identity>,
    profiles: BTreeMap<i64, SellerProfile>, // keyed by user_id
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn conflict(&self, field: UniqueField, value: &str, except: Option<i64>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && match field {
                    UniqueField::Username => u.username == value,
                    UniqueField::Email => u.email == value,
                    UniqueField::Phone => u.phone == value,
                }
        })
    }

    fn make_profile(&mut self, user_id: i64, p: NewSellerProfile) -> SellerProfile {
        let now = OffsetDateTime::now_utc();
        SellerProfile {
            id: self.next_id(),
            user_id,
            farm_name: p.farm_name,
            location_province: p.location_province,
            location_district: p.location_district,
            location_commune: p.location_commune,
            location_village: p.location_village,
            description: p.description,
            certification: p.certification,
            bank_name: p.bank_name,
            bank_account_name: p.bank_account_name,
            bank_account_number: p.bank_account_number,
            rating: 0.0,
            total_sales: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Mirrors the Postgres store's constraints: unique columns and
/// all-or-nothing multi-row writes.
#[derive(Default)]
pub struct MemoryIdentityStore {
    tables: Mutex<Tables>,
    /// When set, the next create carrying a profile fails and commits nothing.
    fail_profile_write: Mutex<bool>,
    /// Write landed by the next `taken_fields` call before it answers.
    interleaved: Mutex<Option<(i64, IdentityChanges, ProfileChange)>>,
    /// When set, the next `taken_fields` call reports nothing.
    blind_probe: Mutex<bool>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next_profile_write(&self) {
        *self.fail_profile_write.lock().await = true;
    }

    /// Lands another writer's update in the gap between a caller's read and
    /// its own write.
    pub async fn interleave_on_next_precheck(
        &self,
        id: i64,
        changes: IdentityChanges,
        profile: ProfileChange,
    ) {
        *self.interleaved.lock().await = Some((id, changes, profile));
    }

    /// Lets the next uniqueness pre-check miss, so only the write itself
    /// can catch a duplicate.
    pub async fn miss_next_precheck(&self) {
        *self.blind_probe.lock().await = true;
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.lock().await.profiles.len()
    }

    async fn take_profile_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_profile_write.lock().await)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.phone == phone).cloned())
    }

    async fn taken_fields(&self, probe: UniqueProbe<'_>) -> Result<Vec<UniqueField>, StoreError> {
        let pending = self.interleaved.lock().await.take();
        if let Some((id, changes, profile)) = pending {
            self.update(id, None, changes, profile).await?;
        }
        if std::mem::take(&mut *self.blind_probe.lock().await) {
            return Ok(Vec::new());
        }
        let t = self.tables.lock().await;
        let candidates = [
            (UniqueField::Username, probe.username),
            (UniqueField::Email, probe.email),
            (UniqueField::Phone, probe.phone),
        ];
        Ok(candidates
            .into_iter()
            .filter_map(|(field, value)| {
                value.filter(|v| t.conflict(field, v, probe.except_id)).map(|_| field)
            })
            .collect())
    }

    async fn create(
        &self,
        identity: NewIdentity,
        profile: Option<NewSellerProfile>,
    ) -> Result<(Identity, Option<SellerProfile>), StoreError> {
        let fail_profile = self.take_profile_failure().await;
        let mut t = self.tables.lock().await;
        for (field, value) in [
            (UniqueField::Username, &identity.username),
            (UniqueField::Email, &identity.email),
            (UniqueField::Phone, &identity.phone),
        ] {
            if t.conflict(field, value, None) {
                return Err(StoreError::Duplicate(field));
            }
        }
        if profile.is_some() && fail_profile {
            return Err(StoreError::Corrupt("profile write failed".into()));
        }

        let now = OffsetDateTime::now_utc();
        let created = Identity {
            id: t.next_id(),
            username: identity.username,
            email: identity.email,
            phone: identity.phone,
            password_hash: identity.password_hash,
            role: identity.role,
            status: identity.status,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let profile = profile.map(|p| t.make_profile(created.id, p));
        t.users.insert(created.id, created.clone());
        if let Some(p) = &profile {
            t.profiles.insert(created.id, p.clone());
        }
        Ok((created, profile))
    }

    async fn update(
        &self,
        id: i64,
        expected_role: Option<Role>,
        changes: IdentityChanges,
        profile: ProfileChange,
    ) -> Result<Identity, StoreError> {
        let mut t = self.tables.lock().await;
        let mut user = t.users.get(&id).cloned().ok_or(StoreError::NotFound)?;
        if let Some(expected) = expected_role {
            if user.role != expected {
                return Err(StoreError::RoleChanged { expected, found: user.role });
            }
        }
        for (field, value) in [
            (UniqueField::Username, &changes.username),
            (UniqueField::Email, &changes.email),
            (UniqueField::Phone, &changes.phone),
        ] {
            if let Some(v) = value {
                if t.conflict(field, v, Some(id)) {
                    return Err(StoreError::Duplicate(field));
                }
            }
        }
        if let ProfileChange::Update(_) = &profile {
            if !t.profiles.contains_key(&id) {
                return Err(StoreError::NotFound);
            }
        }
        if let ProfileChange::Create(_) = &profile {
            if t.profiles.contains_key(&id) {
                return Err(StoreError::Corrupt("profile already exists".into()));
            }
        }

        if let Some(v) = changes.username {
            user.username = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.phone {
            user.phone = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = changes.role {
            user.role = v;
        }
        if let Some(v) = changes.status {
            user.status = v;
        }
        user.updated_at = OffsetDateTime::now_utc();

        match profile {
            ProfileChange::Keep => {}
            ProfileChange::Remove => {
                t.profiles.remove(&id);
            }
            ProfileChange::Create(p) => {
                let created = t.make_profile(id, p);
                t.profiles.insert(id, created);
            }
            ProfileChange::Update(c) => {
                if let Some(existing) = t.profiles.get_mut(&id) {
                    c.apply(existing);
                    existing.updated_at = OffsetDateTime::now_utc();
                }
            }
        }
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        t.profiles.remove(&id);
        Ok(t.users.remove(&id).is_some())
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if let Some(u) = t.users.get_mut(&id) {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn list(&self, filter: &IdentityFilter) -> Result<Vec<Identity>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users
            .values()
            .rev()
            .filter(|u| filter.matches(u))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<IdentityCounts, StoreError> {
        let t = self.tables.lock().await;
        let mut counts = IdentityCounts::default();
        for u in t.users.values() {
            counts.add(u.role, u.status, 1);
        }
        Ok(counts)
    }

    async fn seller_profile(&self, user_id: i64) -> Result<Option<SellerProfile>, StoreError> {
        Ok(self.tables.lock().await.profiles.get(&user_id).cloned())
    }

    async fn list_sellers(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<(Identity, SellerProfile)>, StoreError> {
        let filter = IdentityFilter { role: Some(Role::Seller), ..filter.clone() };
        let sellers = self.list(&filter).await?;
        let t = self.tables.lock().await;
        sellers
            .into_iter()
            .map(|s| -> Result<_, StoreError> {
                let profile = t
                    .profiles
                    .get(&s.id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupt(format!("seller {} has no profile", s.id)))?;
                Ok((s, profile))
            })
            .collect()
    }

    async fn update_seller_profile(
        &self,
        user_id: i64,
        changes: SellerProfileChanges,
    ) -> Result<SellerProfile, StoreError> {
        let mut t = self.tables.lock().await;
        let profile = t.profiles.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        changes.apply(profile);
        profile.updated_at = OffsetDateTime::now_utc();
        Ok(profile.clone())
    }
}
