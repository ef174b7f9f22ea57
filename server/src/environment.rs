use std::sync::Arc;

use log::Logger;

use crate::auth::Auth;
use crate::db::Db;
use crate::store::Store;
use crate::urls::Urls;
use crate::validation::MAX_FILE_BYTES;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub auth: Arc<dyn Auth>,
    pub urls: Arc<Urls>,

    /// Profile photos and ordination documents.
    pub media: Arc<dyn Store>,

    /// Files sent through the relay.
    pub uploads: Arc<dyn Store>,

    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        auth: Arc<dyn Auth>,
        urls: Arc<Urls>,
        media: Arc<dyn Store>,
        uploads: Arc<dyn Store>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            auth,
            urls,
            media,
            uploads,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub(crate) max_file_bytes: usize,
}

impl Config {
    pub fn new(max_file_bytes: usize) -> Self {
        Self { max_file_bytes }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(MAX_FILE_BYTES)
    }
}
