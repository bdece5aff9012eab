//! The store as the rest of the application sees it: one encrypted database,
//! one connection, and every named operation routed through the lane
//! scheduler.

use std::ffi::OsString;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use rusqlite::Connection;
use serde_json::Value;

use crate::auth;
use crate::config::StoreConfig;
use crate::db::{
    self, AttachmentDownloadJob, AttachmentDownloadJobKey, AttachmentDownloadJobState,
    AttachmentDownloadResult, AttachmentReference, BackupDownloadProgress, DequeueSyncTasks,
    DequeuedSyncTasks, NextDownloadJobsQuery, SyncTask, SyncTaskExpiry,
};
use crate::error::StoreError;
use crate::model::MessageAttributes;
use crate::queue::{Database, Operation, QueryQueue};

pub struct Store {
    dir: PathBuf,
    config: StoreConfig,
    queue: QueryQueue,
    closed: AtomicBool,
}

impl Store {
    /// Unlocks (or creates) the store under `dir` and brings its schema up to
    /// date. Nothing is scheduled until the migrations have finished.
    pub async fn initialize(
        dir: impl AsRef<Path>,
        passphrase: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let conn = {
            let dir = dir.clone();
            let passphrase = passphrase.to_string();
            let config = config.clone();
            tokio::task::spawn_blocking(move || -> Result<Connection> {
                fs::create_dir_all(&dir)?;
                let key = auth::unlock_or_create(&dir, &passphrase, &config.kdf)?;
                db::open(&dir, Some(&key), &config)
            })
            .await??
        };
        tracing::info!(dir = %dir.display(), "store initialized");

        let queue = QueryQueue::new(Database::new(conn), config.parallel_concurrency);
        Ok(Self {
            dir,
            config,
            queue,
            closed: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Runs `f` in the lane registered for `op`. `f` may await several
    /// `Database::call` steps; a serial operation holds its lane across all
    /// of them.
    pub async fn run<T, F, Fut>(&self, op: Operation, f: F) -> Result<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.is_closed() {
            return Err(StoreError::Closed.into());
        }
        tracing::trace!(operation = op.name(), lane = op.lane().as_str(), "queued");
        self.queue.enqueue(op.lane(), f).await
    }

    /// Like [`Store::run`], resolving the operation by name first. An unknown
    /// name fails before anything is queued.
    pub async fn run_named<T, F, Fut>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let op = Operation::from_str(name)?;
        self.run(op, f).await
    }

    async fn call<T, F>(&self, op: Operation, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(op, |db| async move { db.call(f).await }).await
    }

    pub async fn wait_for_pending_queries(&self) {
        self.queue.drain().await;
    }

    /// Refuses new calls, lets queued ones finish, then releases the
    /// connection. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.queue.drain().await;

        let db = self.queue.database().clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(conn) = db.take()? {
                conn.execute_batch("PRAGMA optimize;")?;
                conn.close().map_err(|(_, e)| e)?;
            }
            Ok(())
        })
        .await??;
        tracing::info!(dir = %self.dir.display(), "store closed");
        Ok(())
    }

    /// Closes the store and deletes the database together with its key file.
    pub async fn remove_db(&self) -> Result<()> {
        self.close().await?;

        let path = db::db_path(&self.dir);
        for suffix in ["", "-wal", "-shm"] {
            let mut name = OsString::from(path.as_os_str());
            name.push(suffix);
            remove_if_exists(Path::new(&name))?;
        }
        auth::remove_key_file(&self.dir)?;
        tracing::info!(dir = %self.dir.display(), "store removed");
        Ok(())
    }

    /// `(user_version, schema_version)`, for diagnostics.
    pub async fn schema_versions(&self) -> Result<(i64, i64)> {
        self.call(Operation::GetSchemaVersions, |conn| {
            Ok((db::user_version(conn)?, db::schema_version(conn)?))
        })
        .await
    }

    // Messages

    pub async fn save_message(&self, message: MessageAttributes) -> Result<String> {
        self.call(Operation::SaveMessage, move |conn| db::save_message(conn, &message))
            .await
    }

    pub async fn save_messages(&self, messages: Vec<MessageAttributes>) -> Result<Vec<String>> {
        self.call(Operation::SaveMessages, move |conn| db::save_messages(conn, &messages))
            .await
    }

    pub async fn get_message_by_id(&self, id: &str) -> Result<Option<MessageAttributes>> {
        let id = id.to_string();
        self.call(Operation::GetMessageById, move |conn| db::get_message_by_id(conn, &id))
            .await
    }

    pub async fn get_messages_by_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        before_received_at: Option<i64>,
    ) -> Result<Vec<MessageAttributes>> {
        let conversation_id = conversation_id.to_string();
        self.call(Operation::GetMessagesByConversation, move |conn| {
            db::get_messages_by_conversation(conn, &conversation_id, limit, before_received_at)
        })
        .await
    }

    pub async fn remove_message(&self, id: &str) -> Result<usize> {
        let id = id.to_string();
        self.call(Operation::RemoveMessage, move |conn| db::remove_message(conn, &id))
            .await
    }

    pub async fn remove_messages(&self, ids: Vec<String>) -> Result<usize> {
        self.call(Operation::RemoveMessages, move |conn| db::remove_messages(conn, &ids))
            .await
    }

    pub async fn get_message_count(&self, conversation_id: Option<&str>) -> Result<i64> {
        let conversation_id = conversation_id.map(str::to_string);
        self.call(Operation::GetMessageCount, move |conn| {
            db::get_message_count(conn, conversation_id.as_deref())
        })
        .await
    }

    pub async fn search_messages(
        &self,
        text: &str,
        conversation_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MessageAttributes>> {
        let text = text.to_string();
        let conversation_id = conversation_id.map(str::to_string);
        self.call(Operation::SearchMessages, move |conn| {
            db::search_messages(conn, &text, conversation_id.as_deref(), limit)
        })
        .await
    }

    pub async fn get_attachment_references_for_messages(
        &self,
        message_ids: Vec<String>,
    ) -> Result<Vec<AttachmentReference>> {
        self.call(Operation::GetAttachmentReferencesForMessages, move |conn| {
            db::get_attachment_references_for_messages(conn, &message_ids)
        })
        .await
    }

    // Attachment download jobs

    /// `false` when the job's message no longer exists.
    pub async fn save_attachment_download_job(&self, job: AttachmentDownloadJob) -> Result<bool> {
        self.call(Operation::SaveAttachmentDownloadJob, move |conn| {
            db::save_attachment_download_job(conn, &job)
        })
        .await
    }

    pub async fn save_attachment_download_jobs(
        &self,
        jobs: Vec<AttachmentDownloadJob>,
    ) -> Result<usize> {
        self.call(Operation::SaveAttachmentDownloadJobs, move |conn| {
            db::save_attachment_download_jobs(conn, &jobs)
        })
        .await
    }

    pub async fn get_next_attachment_download_jobs(
        &self,
        query: NextDownloadJobsQuery,
    ) -> Result<Vec<AttachmentDownloadJob>> {
        let window = self.config.priority_retry_window_ms;
        self.call(Operation::GetNextAttachmentDownloadJobs, move |conn| {
            db::get_next_attachment_download_jobs(conn, &query, db::now_ms(), window)
        })
        .await
    }

    pub async fn get_attachment_download_job(
        &self,
        key: AttachmentDownloadJobKey,
    ) -> Result<Option<AttachmentDownloadJob>> {
        self.call(Operation::GetAttachmentDownloadJob, move |conn| {
            db::get_attachment_download_job(conn, &key)
        })
        .await
    }

    pub async fn mark_attachment_download_job_active(
        &self,
        key: AttachmentDownloadJobKey,
    ) -> Result<bool> {
        self.call(Operation::MarkAttachmentDownloadJobActive, move |conn| {
            db::mark_attachment_download_job_active(conn, &key, db::now_ms())
        })
        .await
    }

    pub async fn finish_attachment_download_job(
        &self,
        key: AttachmentDownloadJobKey,
        result: AttachmentDownloadResult,
    ) -> Result<AttachmentDownloadJobState> {
        let config = self.config.clone();
        self.call(Operation::FinishAttachmentDownloadJob, move |conn| {
            db::finish_attachment_download_job(conn, &key, result, db::now_ms(), &config)
        })
        .await
    }

    pub async fn remove_attachment_download_job(
        &self,
        key: AttachmentDownloadJobKey,
    ) -> Result<usize> {
        self.call(Operation::RemoveAttachmentDownloadJob, move |conn| {
            db::remove_attachment_download_job(conn, &key)
        })
        .await
    }

    pub async fn remove_attachment_download_jobs_for_message(
        &self,
        message_id: &str,
    ) -> Result<usize> {
        let message_id = message_id.to_string();
        self.call(Operation::RemoveAttachmentDownloadJobsForMessage, move |conn| {
            db::remove_attachment_download_jobs_for_message(conn, &message_id)
        })
        .await
    }

    pub async fn remove_all_backup_attachment_download_jobs(&self) -> Result<usize> {
        self.call(
            Operation::RemoveAllBackupAttachmentDownloadJobs,
            db::remove_all_backup_attachment_download_jobs,
        )
        .await
    }

    /// Clears `active` on every job; run at startup, when nothing can still
    /// be downloading.
    pub async fn reset_attachment_download_active(&self) -> Result<usize> {
        self.call(
            Operation::ResetAttachmentDownloadActive,
            db::reset_attachment_download_active,
        )
        .await
    }

    pub async fn reset_backup_attachment_download_jobs_retry_after(&self) -> Result<usize> {
        self.call(
            Operation::ResetBackupAttachmentDownloadJobsRetryAfter,
            db::reset_backup_attachment_download_jobs_retry_after,
        )
        .await
    }

    pub async fn reset_backup_attachment_download_stats(&self) -> Result<()> {
        self.call(
            Operation::ResetBackupAttachmentDownloadStats,
            db::reset_backup_attachment_download_stats,
        )
        .await
    }

    pub async fn get_backup_attachment_download_progress(&self) -> Result<BackupDownloadProgress> {
        self.call(
            Operation::GetBackupAttachmentDownloadProgress,
            db::get_backup_attachment_download_progress,
        )
        .await
    }

    // Sync tasks

    pub async fn save_sync_tasks(&self, tasks: Vec<SyncTask>) -> Result<()> {
        self.call(Operation::SaveSyncTasks, move |conn| db::save_sync_tasks(conn, &tasks))
            .await
    }

    pub async fn dequeue_oldest_sync_tasks(
        &self,
        options: DequeueSyncTasks,
    ) -> Result<DequeuedSyncTasks> {
        let expiry = SyncTaskExpiry::from_config(&self.config);
        self.call(Operation::DequeueOldestSyncTasks, move |conn| {
            db::dequeue_oldest_sync_tasks(conn, &options, db::now_ms(), &expiry)
        })
        .await
    }

    pub async fn remove_sync_task_by_id(&self, id: &str) -> Result<usize> {
        let id = id.to_string();
        self.call(Operation::RemoveSyncTaskById, move |conn| {
            db::remove_sync_task_by_id(conn, &id)
        })
        .await
    }

    pub async fn remove_sync_tasks(&self, ids: Vec<String>) -> Result<usize> {
        self.call(Operation::RemoveSyncTasks, move |conn| db::remove_sync_tasks(conn, &ids))
            .await
    }

    pub async fn increment_all_sync_task_attempts(&self) -> Result<usize> {
        self.call(
            Operation::IncrementAllSyncTaskAttempts,
            db::increment_all_sync_task_attempts,
        )
        .await
    }

    pub async fn delete_expired_sync_tasks(&self) -> Result<usize> {
        let expiry = SyncTaskExpiry::from_config(&self.config);
        self.call(Operation::DeleteExpiredSyncTasks, move |conn| {
            db::delete_expired_sync_tasks(conn, db::now_ms(), &expiry)
        })
        .await
    }

    // Items

    pub async fn get_item_by_id(&self, id: &str) -> Result<Option<Value>> {
        let id = id.to_string();
        self.call(Operation::GetItemById, move |conn| db::get_item_by_id(conn, &id))
            .await
    }

    pub async fn create_or_update_item(&self, id: &str, value: Value) -> Result<()> {
        let id = id.to_string();
        self.call(Operation::CreateOrUpdateItem, move |conn| {
            db::create_or_update_item(conn, &id, value)
        })
        .await
    }

    // Triggers

    /// Stops indexing inserted messages for search, for bulk imports.
    pub async fn disable_message_insert_triggers(&self) -> Result<()> {
        self.call(
            Operation::DisableMessageInsertTriggers,
            db::disable_message_insert_triggers,
        )
        .await
    }

    /// Restores the insert trigger and indexes everything saved while it was
    /// off.
    pub async fn ensure_message_insert_triggers_are_enabled(&self) -> Result<()> {
        self.call(
            Operation::EnsureMessageInsertTriggersAreEnabled,
            db::ensure_message_insert_triggers_are_enabled,
        )
        .await
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
