//! Request-scoped tenant selector.
//!
//! The active tenant is stored in a tokio task-local, so two requests running
//! concurrently on the same worker thread never see each other's value. A
//! task spawned from inside a scope does not inherit it; pass the key
//! explicitly or wrap the spawned future in [`with_tenant`].

use std::cell::RefCell;
use std::future::Future;

use super::{DbKey, TenancyError};

tokio::task_local! {
    static ACTIVE_TENANT: RefCell<Option<DbKey>>;
}

/// Run `fut` with an empty tenant selector that it may set.
pub async fn scope<F: Future>(fut: F) -> F::Output {
    ACTIVE_TENANT.scope(RefCell::new(None), fut).await
}

/// Run `fut` with `key` already selected.
pub async fn with_tenant<F: Future>(key: DbKey, fut: F) -> F::Output {
    ACTIVE_TENANT.scope(RefCell::new(Some(key)), fut).await
}

/// Select (or clear, with `None`) the tenant for the current scope.
pub fn set_active_tenant(key: Option<DbKey>) -> Result<(), TenancyError> {
    ACTIVE_TENANT
        .try_with(|cell| {
            *cell.borrow_mut() = key;
        })
        .map_err(|_| TenancyError::NoTenantScope)
}

/// The tenant selected for the current scope. `None` means the control plane.
pub fn active_tenant() -> Option<DbKey> {
    ACTIVE_TENANT
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}
