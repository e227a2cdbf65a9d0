use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sea_orm::DatabaseConnection;

use super::DbKey;

#[derive(Clone)]
struct TenantConnection {
    conn: DatabaseConnection,
    /// False until the tenant schema and seed data are in place.
    ready: bool,
}

/// Live connections keyed by [`DbKey`].
///
/// The control plane is fixed at construction and always ready. Tenant
/// entries are added by the loader and never replaced: a second insert for
/// the same key is a no-op.
pub struct ConnectionRegistry {
    control: DatabaseConnection,
    tenants: DashMap<DbKey, TenantConnection>,
}

impl ConnectionRegistry {
    pub fn new(control: DatabaseConnection) -> Self {
        Self {
            control,
            tenants: DashMap::new(),
        }
    }

    pub fn control(&self) -> &DatabaseConnection {
        &self.control
    }

    /// Add a tenant connection (not ready). Returns false if the key was
    /// already registered, in which case `conn` is dropped.
    pub fn insert(&self, key: DbKey, conn: DatabaseConnection) -> bool {
        if key.is_control() {
            return false;
        }
        match self.tenants.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(TenantConnection { conn, ready: false });
                true
            }
        }
    }

    pub fn get(&self, key: &DbKey) -> Option<DatabaseConnection> {
        if key.is_control() {
            return Some(self.control.clone());
        }
        self.tenants.get(key).map(|t| t.conn.clone())
    }

    /// Connection for a tenant that has finished provisioning.
    pub fn get_ready(&self, key: &DbKey) -> Option<DatabaseConnection> {
        if key.is_control() {
            return Some(self.control.clone());
        }
        self.tenants
            .get(key)
            .filter(|t| t.ready)
            .map(|t| t.conn.clone())
    }

    pub fn contains(&self, key: &DbKey) -> bool {
        key.is_control() || self.tenants.contains_key(key)
    }

    pub fn is_ready(&self, key: &DbKey) -> bool {
        key.is_control() || self.tenants.get(key).is_some_and(|t| t.ready)
    }

    pub fn mark_ready(&self, key: &DbKey) -> bool {
        match self.tenants.get_mut(key) {
            Some(mut t) => {
                t.ready = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &DbKey) -> Option<DatabaseConnection> {
        self.tenants.remove(key).map(|(_, t)| t.conn)
    }

    /// Number of tenant entries (the control plane is not counted).
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;
    use std::sync::Arc;

    async fn mem() -> DatabaseConnection {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn control_plane_always_present_and_ready() {
        let reg = ConnectionRegistry::new(mem().await);
        assert!(reg.contains(&DbKey::control()));
        assert!(reg.is_ready(&DbKey::control()));
        assert!(reg.get(&DbKey::control()).is_some());
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn control_key_cannot_be_overwritten() {
        let reg = ConnectionRegistry::new(mem().await);
        assert!(!reg.insert(DbKey::control(), mem().await));
        assert_eq!(reg.len(), 0);
    }

    #[tokio::test]
    async fn double_insert_keeps_one_entry() {
        let reg = ConnectionRegistry::new(mem().await);
        let key = DbKey::new("oak_1_db");
        assert!(reg.insert(key.clone(), mem().await));
        assert!(!reg.insert(key.clone(), mem().await));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn new_entries_are_not_ready_until_marked() {
        let reg = ConnectionRegistry::new(mem().await);
        let key = DbKey::new("oak_1_db");
        reg.insert(key.clone(), mem().await);
        assert!(reg.contains(&key));
        assert!(!reg.is_ready(&key));
        assert!(reg.get_ready(&key).is_none());
        assert!(reg.mark_ready(&key));
        assert!(reg.is_ready(&key));
        assert!(reg.get_ready(&key).is_some());
    }

    #[tokio::test]
    async fn mark_ready_unknown_key_is_false() {
        let reg = ConnectionRegistry::new(mem().await);
        assert!(!reg.mark_ready(&DbKey::new("ghost_db")));
    }

    #[tokio::test]
    async fn remove_drops_entry() {
        let reg = ConnectionRegistry::new(mem().await);
        let key = DbKey::new("oak_1_db");
        reg.insert(key.clone(), mem().await);
        assert!(reg.remove(&key).is_some());
        assert!(!reg.contains(&key));
        assert!(reg.remove(&key).is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_same_key_single_winner() {
        let reg = Arc::new(ConnectionRegistry::new(mem().await));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                let conn = Database::connect("sqlite::memory:").await.unwrap();
                reg.insert(DbKey::new("race_db"), conn)
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(reg.len(), 1);
    }
}
