pub mod common;
pub mod inventory;
pub mod meters;
pub mod readings;
pub mod uploads;
pub mod users;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        blob_storage::{BlobStore, LocalBlobStore},
        ledger::LedgerService,
        meters::MeterService,
        readings::ReadingService,
        recognition::{IngredientRecognizer, NoopRecognizer},
        users::UserService,
    },
};
use std::sync::Arc;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppServices {
    pub meters: Arc<MeterService>,
    pub readings: Arc<ReadingService>,
    pub ledger: Arc<LedgerService>,
    pub users: Arc<UserService>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppServices {
    /// Wires services with the local blob store and the no-op recognizer.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self::with_collaborators(
            db_pool,
            event_sender,
            config,
            Arc::new(LocalBlobStore::new(&config.upload_dir)),
            Arc::new(NoopRecognizer),
        )
    }

    /// Wires services with caller-provided storage and recognition.
    pub fn with_collaborators(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        blobs: Arc<dyn BlobStore>,
        recognizer: Arc<dyn IngredientRecognizer>,
    ) -> Self {
        Self {
            meters: Arc::new(MeterService::new(db_pool.clone(), event_sender.clone())),
            readings: Arc::new(ReadingService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.ledger_max_retries,
            )),
            ledger: Arc::new(LedgerService::new(
                db_pool.clone(),
                event_sender,
                recognizer,
                config.ledger_max_retries,
            )),
            users: Arc::new(UserService::new(db_pool)),
            blobs,
        }
    }
}
