//! Memory service seam.
//!
//! The remote memory store is an external collaborator. The engine only needs
//! two capabilities from it: fetch the current context blocks and accept a
//! captured turn.

use crate::types::{CaptureEvent, MemoryBlock};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    #[error("Memory service rejected the request: {0}")]
    Rejected(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Current context blocks, in display order
    async fn fetch_blocks(&self) -> Result<Vec<MemoryBlock>, ServiceError>;

    async fn submit_capture(&self, event: &CaptureEvent) -> Result<(), ServiceError>;
}

/// Serves a fixed block list and keeps submitted captures in memory
#[derive(Debug, Default)]
pub struct StaticMemoryService {
    blocks: Vec<MemoryBlock>,
    captures: Mutex<Vec<CaptureEvent>>,
    offline: Option<String>,
}

impl StaticMemoryService {
    pub fn new(blocks: Vec<MemoryBlock>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    /// A service whose every call fails with `reason`
    pub fn offline(reason: &str) -> Self {
        Self {
            offline: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Load blocks from a JSON array file
    pub fn from_json_file(path: &Path) -> Result<Self, ServiceError> {
        let contents = std::fs::read_to_string(path)?;
        let blocks: Vec<MemoryBlock> = serde_json::from_str(&contents)?;
        info!("Loaded {} memory blocks from {:?}", blocks.len(), path);
        Ok(Self::new(blocks))
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Captures received so far
    pub fn captures(&self) -> Vec<CaptureEvent> {
        match self.captures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn check_online(&self) -> Result<(), ServiceError> {
        match &self.offline {
            Some(reason) => Err(ServiceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MemoryService for StaticMemoryService {
    async fn fetch_blocks(&self) -> Result<Vec<MemoryBlock>, ServiceError> {
        self.check_online()?;
        debug!("Serving {} memory blocks", self.blocks.len());
        Ok(self.blocks.clone())
    }

    async fn submit_capture(&self, event: &CaptureEvent) -> Result<(), ServiceError> {
        self.check_online()?;
        let mut captures = match self.captures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        captures.push(event.clone());
        debug!("Stored capture #{} from {}", captures.len(), event.platform);
        Ok(())
    }
}
