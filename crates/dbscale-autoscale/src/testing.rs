//! Recording fakes for the engine's collaborators.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use dbscale_core::{BoxFuture, InstanceConfig};
use dbscale_state::{
    DatabasePool, RedbStateStore, ScalingState, StateKey, StateResult, StateStore,
};

use crate::events::DownstreamEvent;
use crate::ports::{EventPublisher, OperationStatus, OperationStatusProvider, ScaleExecutor};

/// In-memory store that counts writes.
pub struct CountingStore {
    inner: RedbStateStore,
    updates: AtomicUsize,
}

impl CountingStore {
    pub fn in_memory() -> Self {
        Self {
            inner: RedbStateStore::new(DatabasePool::in_memory()),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl StateStore for CountingStore {
    fn get(&self, key: &StateKey) -> StateResult<ScalingState> {
        self.inner.get(key)
    }

    fn update_state(&self, key: &StateKey, state: &ScalingState) -> StateResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_state(key, state)
    }

    fn close(&self) -> StateResult<()> {
        self.inner.close()
    }
}

enum StatusResponse {
    Status(OperationStatus),
    Unknown,
    Fail(String),
}

/// Answers every query with the same response.
pub struct StaticStatusProvider {
    response: StatusResponse,
    queries: AtomicUsize,
}

impl StaticStatusProvider {
    fn with(response: StatusResponse) -> Self {
        Self {
            response,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn status(status: OperationStatus) -> Self {
        Self::with(StatusResponse::Status(status))
    }

    pub fn unknown() -> Self {
        Self::with(StatusResponse::Unknown)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(StatusResponse::Fail(message.to_string()))
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl OperationStatusProvider for StaticStatusProvider {
    fn query<'a>(
        &'a self,
        _config: &'a InstanceConfig,
        _operation_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<OperationStatus>>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                StatusResponse::Status(status) => Ok(Some(status.clone())),
                StatusResponse::Unknown => Ok(None),
                StatusResponse::Fail(message) => Err(anyhow!("{message}")),
            }
        })
    }
}

/// Records requested sizes and returns a fixed result.
pub struct RecordingExecutor {
    result: Result<Option<String>, String>,
    calls: Mutex<Vec<u32>>,
}

impl RecordingExecutor {
    pub fn returning(operation_id: Option<&str>) -> Self {
        Self {
            result: Ok(operation_id.map(str::to_string)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScaleExecutor for RecordingExecutor {
    fn execute<'a>(
        &'a self,
        _config: &'a InstanceConfig,
        suggested_size: u32,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(suggested_size);
            self.result.clone().map_err(|message| anyhow!("{message}"))
        })
    }
}

/// Keeps every published event.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DownstreamEvent>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<DownstreamEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish<'a>(&'a self, event: &'a DownstreamEvent) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(anyhow!("topic not found"));
            }
            Ok(())
        })
    }
}
