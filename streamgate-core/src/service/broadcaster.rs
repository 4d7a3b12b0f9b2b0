use tracing::info;

use crate::{
    models::{Broadcaster, BroadcasterId, CreateBroadcasterRequest, UpdateBroadcasterRequest},
    repository::{BroadcasterRepository, StreamKeyRepository},
    Error, Result,
};

const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Owner records for stream keys
#[derive(Clone)]
pub struct BroadcasterService {
    repo: BroadcasterRepository,
    stream_keys: StreamKeyRepository,
}

impl std::fmt::Debug for BroadcasterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcasterService").finish()
    }
}

fn validate_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("display_name is required".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "display_name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

impl BroadcasterService {
    #[must_use]
    pub const fn new(repo: BroadcasterRepository, stream_keys: StreamKeyRepository) -> Self {
        Self { repo, stream_keys }
    }

    pub async fn create(&self, request: CreateBroadcasterRequest) -> Result<Broadcaster> {
        let display_name = validate_display_name(&request.display_name)?;
        let broadcaster = Broadcaster::new(display_name, request.metadata);
        let created = self.repo.create(&broadcaster).await?;

        info!(broadcaster_id = %created.id, "Broadcaster created");
        Ok(created)
    }

    pub async fn get(&self, id: &BroadcasterId) -> Result<Broadcaster> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Broadcaster {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<Broadcaster>> {
        self.repo.list().await
    }

    /// Apply the fields present in `request`
    pub async fn update(&self, id: &BroadcasterId, request: UpdateBroadcasterRequest) -> Result<Broadcaster> {
        let mut broadcaster = self.get(id).await?;

        if let Some(name) = request.display_name {
            broadcaster.display_name = validate_display_name(&name)?;
        }
        if let Some(metadata) = request.metadata {
            broadcaster.metadata = metadata;
        }

        self.repo.update(&broadcaster).await
    }

    /// Delete a broadcaster that owns no stream keys
    pub async fn delete(&self, id: &BroadcasterId) -> Result<()> {
        if !self.stream_keys.list_by_broadcaster(id).await?.is_empty() {
            return Err(Error::Conflict(format!(
                "Broadcaster {id} still owns stream keys"
            )));
        }

        if !self.repo.delete(id).await? {
            return Err(Error::NotFound(format!("Broadcaster {id} not found")));
        }

        info!(broadcaster_id = %id, "Broadcaster deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::insert_stream_key;
    use sqlx::PgPool;

    fn service(pool: &PgPool) -> BroadcasterService {
        BroadcasterService::new(
            BroadcasterRepository::new(pool.clone()),
            StreamKeyRepository::new(pool.clone()),
        )
    }

    #[test]
    fn test_display_name_validation() {
        assert_eq!(validate_display_name("  Field Unit 7 ").unwrap(), "Field Unit 7");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(256)).is_err());
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_crud(pool: PgPool) {
        let service = service(&pool);

        let created = service
            .create(CreateBroadcasterRequest {
                display_name: "Drone 1".to_string(),
                metadata: Some(serde_json::json!({"team": "north"})),
            })
            .await
            .unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        let updated = service
            .update(
                &created.id,
                UpdateBroadcasterRequest {
                    display_name: Some("Drone 1b".to_string()),
                    metadata: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Drone 1b");
        assert_eq!(updated.metadata["team"], "north");

        service.delete(&created.id).await.unwrap();
        assert!(matches!(service.get(&created.id).await, Err(Error::NotFound(_))));
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_delete_refused_while_keys_exist(pool: PgPool) {
        let service = service(&pool);
        let created = service
            .create(CreateBroadcasterRequest {
                display_name: "Camera".to_string(),
                metadata: None,
            })
            .await
            .unwrap();
        insert_stream_key(&pool, &created.id, None).await;

        let err = service.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
