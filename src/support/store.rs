// SPDX-License-Identifier: MIT

//! Transcript persistence
//!
//! Saving is fire-and-forget from the service's point of view: a failed
//! save is logged and never changes the answer returned to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::service::SupportResponse;
use crate::error::StoreError;

/// One answered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: Uuid,
    pub query: String,
    pub response: String,
    pub category: String,
    pub sentiment: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn new(id: Uuid, query: impl Into<String>, answer: &SupportResponse) -> Self {
        Self {
            id,
            query: query.into(),
            response: answer.response.clone(),
            category: answer.category.clone(),
            sentiment: answer.sentiment.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Store name used in logs
    fn name(&self) -> &str;

    async fn save(&self, record: TranscriptRecord) -> Result<(), StoreError>;
}

/// Keeps transcripts in process memory
#[derive(Clone, Default)]
pub struct InMemoryTranscriptStore {
    records: Arc<RwLock<Vec<TranscriptRecord>>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<TranscriptRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, record: TranscriptRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }
}

/// Appends one JSON object per line to a file
pub struct JsonlTranscriptStore {
    path: PathBuf,
    // serialises appends so concurrent runs never interleave lines
    write_lock: Mutex<()>,
}

impl JsonlTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record back
    pub async fn load(&self) -> Result<Vec<TranscriptRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl TranscriptStore for JsonlTranscriptStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn save(&self, record: TranscriptRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
