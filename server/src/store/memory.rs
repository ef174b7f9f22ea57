use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use url::{ParseError, Url};

use crate::errors::DirectoryError;
use crate::store::Store;

/// An object kept by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub content_type: String,
    pub raw: Vec<u8>,
}

/// A store that keeps its objects in memory. Used by tests.
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    base_url: Url,
    failing: RwLock<bool>,
}

impl MemoryStore {
    pub fn new(base_url: Url) -> Self {
        MemoryStore {
            objects: RwLock::default(),
            base_url,
            failing: RwLock::new(false),
        }
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        paths.sort();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Makes every later save fail, to exercise error paths.
    pub fn fail_saves(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
    }
}

impl Store for MemoryStore {
    fn delete(&self, path: &str) -> BoxFuture<Result<(), DirectoryError>> {
        let path = path.to_owned();

        async move {
            self.objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&path);

            Ok(())
        }
        .boxed()
    }

    fn get_url(&self, path: &str) -> Result<Url, ParseError> {
        self.base_url.join(path)
    }

    fn save(
        &self,
        path: &str,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), DirectoryError>> {
        let path = path.to_owned();

        async move {
            if *self.failing.read().unwrap_or_else(PoisonError::into_inner) {
                return Err(DirectoryError::StoreUnavailable);
            }

            self.objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(path, StoredObject { content_type, raw });

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saving_overwrites() {
        let store = MemoryStore::new(Url::parse("https://files.example.com/uploads/").unwrap());

        store.save("a/b.png", "image/png".to_owned(), vec![1]).await.unwrap();
        store.save("a/b.png", "image/png".to_owned(), vec![2]).await.unwrap();

        assert_eq!(store.get("a/b.png").unwrap().raw, vec![2]);
        assert_eq!(
            store.get_url("a/b.png").unwrap().as_str(),
            "https://files.example.com/uploads/a/b.png"
        );

        store.delete("a/b.png").await.unwrap();
        assert!(store.is_empty());
    }
}
