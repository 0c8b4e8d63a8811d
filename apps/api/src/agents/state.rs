// Agent state management
//
// Every agent owns an AgentCore holding its lifecycle state, a bounded
// memory log and running success/failure/timing statistics.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::AgentResult;

/// Default number of memory entries an agent keeps
pub const DEFAULT_MAX_MEMORY: usize = 100;

/// Lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Working,
    Error,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Working => write!(f, "working"),
            AgentState::Error => write!(f, "error"),
        }
    }
}

/// Running counters for an agent's operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatistics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub total_time_secs: f64,
    pub average_time_secs: f64,
}

impl AgentStatistics {
    /// Record one finished operation
    pub fn update(&mut self, success: bool, elapsed_secs: f64) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }

        self.total_time_secs += elapsed_secs;
        let total = self.tasks_completed + self.tasks_failed;
        if total > 0 {
            self.average_time_secs = self.total_time_secs / total as f64;
        }
    }
}

/// One entry of an agent's memory log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub data: Value,
}

/// Point-in-time snapshot of an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    pub state: AgentState,
    pub memory_length: usize,
    pub statistics: AgentStatistics,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CoreInner {
    state: AgentState,
    memory: VecDeque<MemoryEntry>,
    statistics: AgentStatistics,
}

/// Shared state embedded in every agent
///
/// All mutation goes through an internal lock so agents can be shared
/// behind `Arc` and called from concurrent requests.
#[derive(Debug)]
pub struct AgentCore {
    name: String,
    max_memory: usize,
    created_at: DateTime<Utc>,
    inner: Mutex<CoreInner>,
}

impl AgentCore {
    /// Create a core in the idle state
    pub fn new(name: impl Into<String>, max_memory: usize) -> Self {
        Self {
            name: name.into(),
            max_memory: max_memory.max(1),
            created_at: Utc::now(),
            inner: Mutex::new(CoreInner {
                state: AgentState::Idle,
                memory: VecDeque::new(),
                statistics: AgentStatistics::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        self.inner.lock().state
    }

    pub fn set_state(&self, state: AgentState) {
        let old = std::mem::replace(&mut self.inner.lock().state, state);
        tracing::debug!(agent = %self.name, from = %old, to = %state, "agent state changed");
    }

    /// Append an entry, dropping the oldest ones beyond `max_memory`
    pub fn add_to_memory(&self, kind: impl Into<String>, data: Value) {
        let mut inner = self.inner.lock();
        inner.memory.push_back(MemoryEntry {
            timestamp: Utc::now(),
            kind: kind.into(),
            data,
        });
        while inner.memory.len() > self.max_memory {
            inner.memory.pop_front();
        }
    }

    pub fn memory(&self) -> Vec<MemoryEntry> {
        self.inner.lock().memory.iter().cloned().collect()
    }

    pub fn statistics(&self) -> AgentStatistics {
        self.inner.lock().statistics.clone()
    }

    pub fn update_statistics(&self, success: bool, elapsed_secs: f64) {
        self.inner.lock().statistics.update(success, elapsed_secs);
    }

    /// Return to idle and forget the memory log. Statistics are kept.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.state = AgentState::Idle;
            inner.memory.clear();
        }
        tracing::info!(agent = %self.name, "agent reset");
    }

    pub fn status(&self) -> AgentStatus {
        let inner = self.inner.lock();
        AgentStatus {
            name: self.name.clone(),
            state: inner.state,
            memory_length: inner.memory.len(),
            statistics: inner.statistics.clone(),
            created_at: self.created_at,
        }
    }

    /// Run one operation with state, timing and memory bookkeeping
    ///
    /// The agent is `working` while the future runs, then `idle` on success
    /// or `error` on failure.
    pub async fn track<T, F>(&self, kind: &str, operation: F) -> AgentResult<T>
    where
        F: Future<Output = AgentResult<T>>,
    {
        self.set_state(AgentState::Working);
        let started = Instant::now();

        let result = operation.await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(_) => {
                self.set_state(AgentState::Idle);
                self.update_statistics(true, elapsed);
                self.add_to_memory(kind, json!({ "success": true, "elapsed_secs": elapsed }));
            }
            Err(e) => {
                tracing::error!(agent = %self.name, operation = kind, error = %e, "agent operation failed");
                self.set_state(AgentState::Error);
                self.update_statistics(false, elapsed);
                self.add_to_memory(
                    kind,
                    json!({ "success": false, "elapsed_secs": elapsed, "error": e.to_string() }),
                );
            }
        }

        result
    }
}
