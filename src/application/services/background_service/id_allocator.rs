use crate::domain::errors::DomainError;
use crate::domain::models::background::BackgroundId;
use crate::domain::repositories::key_value_repository::KeyValueRepository;

pub(crate) const MAX_LOCAL_ID_KEY: &str = "max_bg_id";

/// Issues local background ids above a durable high-water mark, so an id is
/// never handed out twice across restarts.
///
/// An allocator whose mark could not be read stays unloaded: every use retries
/// the read first, and nothing is written until it succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IdAllocator {
    max_local_id: i64,
    is_loaded: bool,
}

impl IdAllocator {
    /// Restore the mark; an absent or unparsable value counts as zero.
    pub(crate) async fn load(store: &dyn KeyValueRepository) -> Result<Self, DomainError> {
        Ok(Self {
            max_local_id: read_mark(store).await?,
            is_loaded: true,
        })
    }

    /// An allocator that reads its mark on first use
    pub(crate) fn unloaded() -> Self {
        Self::default()
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub(crate) fn max_local_id(&self) -> i64 {
        self.max_local_id
    }

    /// The new mark is stored before the id is returned.
    pub(crate) async fn next_local_id(
        &mut self,
        store: &dyn KeyValueRepository,
    ) -> Result<BackgroundId, DomainError> {
        self.ensure_loaded(store).await?;

        if self.max_local_id >= BackgroundId::MAX_LOCAL {
            return Err(DomainError::InternalError(
                "Local background identifiers are exhausted".to_string(),
            ));
        }

        let id = BackgroundId::local(self.max_local_id + 1);
        self.set_max_local_id(id, store).await?;
        Ok(id)
    }

    /// Raise the mark to cover a local id that was issued elsewhere.
    ///
    /// While the stored mark is unreadable the id is only remembered, and it
    /// is written once the mark loads.
    pub(crate) async fn record_external_local_id(
        &mut self,
        id: BackgroundId,
        store: &dyn KeyValueRepository,
    ) -> Result<(), DomainError> {
        if let Err(error) = self.ensure_loaded(store).await {
            self.max_local_id = self.max_local_id.max(id.get());
            return Err(error);
        }

        if id.get() > self.max_local_id {
            self.set_max_local_id(id, store).await?;
        }
        Ok(())
    }

    async fn ensure_loaded(&mut self, store: &dyn KeyValueRepository) -> Result<(), DomainError> {
        if self.is_loaded {
            return Ok(());
        }

        let stored = read_mark(store).await?;
        if self.max_local_id > stored {
            store
                .set(MAX_LOCAL_ID_KEY, self.max_local_id.to_string())
                .await?;
        } else {
            self.max_local_id = stored;
        }
        self.is_loaded = true;
        Ok(())
    }

    async fn set_max_local_id(
        &mut self,
        id: BackgroundId,
        store: &dyn KeyValueRepository,
    ) -> Result<(), DomainError> {
        assert!(id.is_local());
        assert!(self.is_loaded);
        assert!(
            id.get() > self.max_local_id,
            "local background id mark can't move from {} down to {}",
            self.max_local_id,
            id.get()
        );

        store.set(MAX_LOCAL_ID_KEY, id.get().to_string()).await?;
        self.max_local_id = id.get();
        Ok(())
    }
}

async fn read_mark(store: &dyn KeyValueRepository) -> Result<i64, DomainError> {
    Ok(store
        .get(MAX_LOCAL_ID_KEY)
        .await?
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0)
        .clamp(0, BackgroundId::MAX_LOCAL))
}
