use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::Error;
use crate::results::UploadResult;
use crate::storage::Storage;
use crate::types::UserId;

/// In-memory cache of the latest computed result per user, backed by the
/// `results` table. Results are stored behind `Arc`, so a snapshot handed out
/// to a reader stays internally consistent even if a concurrent ingestion
/// replaces the cached entry.
pub struct ResultCache {
    storage: Arc<Storage>,
    results: RwLock<HashMap<UserId, Arc<UploadResult>>>,
}

impl ResultCache {
    pub fn new(storage: Arc<Storage>) -> ResultCache {
        ResultCache {
            storage: storage,
            results: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the latest result for the user, falling back to the database
    /// on cache miss (for example after a process restart).
    pub fn get(&self, user_id: UserId) -> Result<Arc<UploadResult>, Error> {
        if let Some(result) = self.results.read().unwrap().get(&user_id) {
            return Ok(result.clone());
        }

        debug!("Result cache miss for user #{user_id}.");
        let result = Arc::new(self.storage.result(user_id)?.ok_or(Error::NotFound)?);
        self.results.write().unwrap().insert(user_id, result.clone());

        Ok(result)
    }

    /// Replaces the cached entry. The caller must have already persisted the
    /// result, so a subsequent cache miss reads the same data back.
    pub fn fill(&self, user_id: UserId, result: Arc<UploadResult>) {
        self.results.write().unwrap().insert(user_id, result);
    }

    pub fn invalidate(&self, user_id: UserId) {
        self.results.write().unwrap().remove(&user_id);
    }
}
