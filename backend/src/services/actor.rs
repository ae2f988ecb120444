//! Actor registry

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use shared::models::{Actor, Admin, ADMIN_PROVISIONED};

use crate::db::{LedgerTx, NewActorHistory};
use crate::error::AppResult;

/// Admin record for the caller's external identity, created on first use.
///
/// A new record is written together with an `ADMIN_PROVISIONED` actor history
/// row in the caller's transaction, so provisioning is visible in the audit
/// trail and rolls back with the operation that needed it.
pub async fn ensure_admin<T: LedgerTx>(tx: &mut T, actor: &Actor) -> AppResult<Admin> {
    if let Some(admin) = tx.find_admin_by_external_id(&actor.external_id).await? {
        return Ok(admin);
    }

    let admin = Admin {
        id: Uuid::new_v4(),
        external_id: actor.external_id.clone(),
        name: actor.external_id.clone(),
        created_at: Utc::now(),
    };
    tx.insert_admin(&admin).await?;

    tx.append_actor_history(NewActorHistory {
        admin_id: admin.id,
        action: ADMIN_PROVISIONED.to_string(),
        external_id: admin.external_id.clone(),
        requested_by_role: actor.role,
    })
    .await?;

    // Runs once per attempt; the ADMIN_PROVISIONED row is the durable record
    debug!(
        admin_id = %admin.id,
        external_id = %admin.external_id,
        role = %actor.role,
        "Provisioning admin record for unknown identity"
    );

    Ok(admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LedgerStore, MemoryStore};
    use shared::models::Role;

    #[tokio::test]
    async fn provisions_once_and_audits_it() {
        let store = MemoryStore::new();
        let actor = Actor::new(Uuid::new_v4(), "customs-7", Role::Enforce);

        let mut tx = store.begin().await.unwrap();
        let first = ensure_admin(&mut tx, &actor).await.unwrap();
        let second = ensure_admin(&mut tx, &actor).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        let state = store.committed();
        assert_eq!(state.admins.len(), 1);
        assert_eq!(state.actor_history.len(), 1);
        assert_eq!(state.actor_history[0].action, ADMIN_PROVISIONED);
        assert_eq!(state.actor_history[0].requested_by_role, Role::Enforce);
    }

    #[tokio::test]
    async fn known_admin_is_returned_without_audit() {
        let store = MemoryStore::new();
        let seeded = store.seed_admin("ops-1", "Ops");
        let actor = Actor::new(seeded.id, "ops-1", Role::Admin);

        let mut tx = store.begin().await.unwrap();
        let admin = ensure_admin(&mut tx, &actor).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(admin.id, seeded.id);
        assert!(store.committed().actor_history.is_empty());
        assert_eq!(store.commits(), 0);
    }
}
