//! Find-or-create resolution of the trade show a crawl populates.

use expoharvest_shared::{Result, TradeShow};
use expoharvest_storage::Storage;
use tracing::info;

/// Resolve a show by case-insensitive exact name within a scope, creating a
/// minimal record when absent.
///
/// Idempotent after the first creation. Two jobs racing on the same new name
/// can still both create (find-then-insert is not atomic); that mirrors the
/// unguarded behavior of exhibitor creation and is surfaced, not hidden.
pub async fn resolve_or_create(
    storage: &Storage,
    scope_id: &str,
    show_name: &str,
) -> Result<TradeShow> {
    if let Some(existing) = storage.find_trade_show(scope_id, show_name).await? {
        return Ok(existing);
    }

    let show = TradeShow::new(scope_id, show_name);
    storage.insert_trade_show(&show).await?;
    info!(show_id = %show.id, name = %show.name, scope = %scope_id, "created trade show");
    Ok(show)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("eh_resolver_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn creates_then_reuses() {
        let storage = test_storage().await;

        let first = resolve_or_create(&storage, "tenant-1", "Hannover Fair")
            .await
            .expect("create");
        let second = resolve_or_create(&storage, "tenant-1", "Hannover Fair")
            .await
            .expect("reuse");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn name_match_is_case_insensitive() {
        let storage = test_storage().await;

        let created = resolve_or_create(&storage, "tenant-1", "Global Tech Expo")
            .await
            .expect("create");
        let resolved = resolve_or_create(&storage, "tenant-1", "GLOBAL TECH EXPO")
            .await
            .expect("resolve");
        assert_eq!(created.id, resolved.id);
        // Original spelling is preserved
        assert_eq!(resolved.name, "Global Tech Expo");
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let storage = test_storage().await;

        let a = resolve_or_create(&storage, "tenant-1", "Expo")
            .await
            .expect("tenant-1");
        let b = resolve_or_create(&storage, "tenant-2", "Expo")
            .await
            .expect("tenant-2");
        assert_ne!(a.id, b.id);
    }
}
