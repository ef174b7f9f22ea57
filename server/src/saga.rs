use std::sync::Arc;

use log::{debug, error, Logger};
use uuid::Uuid;

use crate::auth::Auth;
use crate::store::Store;

/// A completed step that can be undone.
#[derive(Clone, Debug, PartialEq)]
pub enum Compensation {
    DeleteAccount(Uuid),
    DeleteObject(String),
}

/// Records the steps of a multi-step write so they can be undone, most
/// recent first, if a later step fails.
pub struct CompensationLog {
    logger: Arc<Logger>,
    auth: Arc<dyn Auth>,
    store: Arc<dyn Store>,
    steps: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new(logger: Arc<Logger>, auth: Arc<dyn Auth>, store: Arc<dyn Store>) -> Self {
        CompensationLog {
            logger,
            auth,
            store,
            steps: vec![],
        }
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    /// Forgets every recorded step once the whole write has succeeded.
    pub fn commit(mut self) {
        self.steps.clear();
    }

    /// Undoes every recorded step in reverse. Failures are logged and
    /// otherwise ignored so they never replace the error that caused the
    /// unwinding.
    pub async fn unwind(mut self) {
        while let Some(step) = self.steps.pop() {
            debug!(self.logger, "Compensating..."; "step" => ?step);

            let result = match &step {
                Compensation::DeleteAccount(id) => self.auth.delete_account(id).await,
                Compensation::DeleteObject(path) => self.store.delete(path).await,
            };

            if let Err(e) = result {
                error!(self.logger, "Failed to compensate"; "step" => ?step, "error" => %e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::auth::memory::MemoryAuth;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn unwinding_undoes_every_step() {
        let auth = Arc::new(MemoryAuth::new());
        let store = Arc::new(MemoryStore::new(
            Url::parse("https://files.example.com/media/").unwrap(),
        ));

        let id = auth.sign_up("padre@example.com", "segredo").await.unwrap();
        store
            .save("fotos_perfil/a.png", "image/png".to_owned(), vec![1])
            .await
            .unwrap();

        let mut log = CompensationLog::new(
            Arc::new(log::discarding_logger()),
            auth.clone(),
            store.clone(),
        );
        log.record(Compensation::DeleteObject("fotos_perfil/a.png".to_owned()));
        log.record(Compensation::DeleteAccount(id));
        log.unwind().await;

        assert_eq!(auth.account_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn committing_keeps_everything() {
        let auth = Arc::new(MemoryAuth::new());
        let store = Arc::new(MemoryStore::new(
            Url::parse("https://files.example.com/media/").unwrap(),
        ));

        let id = auth.sign_up("padre@example.com", "segredo").await.unwrap();

        let mut log = CompensationLog::new(Arc::new(log::discarding_logger()), auth.clone(), store);
        log.record(Compensation::DeleteAccount(id));
        assert_eq!(log.steps().len(), 1);
        log.commit();

        assert_eq!(auth.account_count(), 1);
    }
}
