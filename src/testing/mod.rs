//! Spy implementations of the database client traits.
//!
//! Every connect, close, acquire and session command is appended to a shared
//! `EventLog` so tests can assert on exact ordering without a database.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::database::client::{ClientFactory, SchemaClient, SchemaSession};
use crate::database::manager::DatabaseError;
use crate::tenant::SchemaName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connect(String),
    Close(String),
    Acquire(String),
    SetSearchPath(String),
    Run(String),
    Discard(String),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<SessionEvent>>>);

impl EventLog {
    pub fn push(&self, event: SessionEvent) {
        self.0.lock().unwrap().push(event);
    }

    pub fn all(&self) -> Vec<SessionEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn connects(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Connect(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Close(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Everything that happened on sessions, in order
    pub fn session_commands(&self) -> Vec<SessionEvent> {
        self.all()
            .into_iter()
            .filter(|e| !matches!(e, SessionEvent::Connect(_) | SessionEvent::Close(_) | SessionEvent::Acquire(_)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    connect_delay: Option<Duration>,
    fail_connect_once: HashSet<String>,
    fail_search_path: HashSet<String>,
}

/// Factory whose clients keep a small pool of recording sessions
#[derive(Debug, Default)]
pub struct RecordingFactory {
    events: EventLog,
    faults: Mutex<Faults>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.faults.lock().unwrap().connect_delay = Some(delay);
        self
    }

    pub fn failing_connect_once(self, schema: &str) -> Self {
        self.faults.lock().unwrap().fail_connect_once.insert(schema.to_string());
        self
    }

    /// Every `SET search_path` naming `schema` fails, on every session
    pub fn failing_search_path(self, schema: &str) -> Self {
        self.faults.lock().unwrap().fail_search_path.insert(schema.to_string());
        self
    }
}

#[async_trait]
impl ClientFactory for RecordingFactory {
    type Client = RecordingClient;

    async fn connect(&self, schema: &SchemaName) -> Result<RecordingClient, DatabaseError> {
        let (delay, fail, fail_search_path) = {
            let mut faults = self.faults.lock().unwrap();
            (
                faults.connect_delay,
                faults.fail_connect_once.remove(schema.as_str()),
                faults.fail_search_path.clone(),
            )
        };

        self.events.push(SessionEvent::Connect(schema.to_string()));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }

        Ok(RecordingClient {
            schema: schema.to_string(),
            events: self.events.clone(),
            idle: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(0)),
            fail_search_path: Arc::new(fail_search_path),
        })
    }
}

/// Server-side state of one pooled physical connection
#[derive(Debug, Clone)]
pub struct PhysicalConnection {
    pub id: usize,
    pub search_path: String,
}

#[derive(Debug)]
pub struct RecordingClient {
    schema: String,
    events: EventLog,
    idle: Arc<Mutex<Vec<PhysicalConnection>>>,
    next_id: Arc<Mutex<usize>>,
    fail_search_path: Arc<HashSet<String>>,
}

impl RecordingClient {
    /// Connections currently sitting idle in the pool
    pub fn idle_connections(&self) -> Vec<PhysicalConnection> {
        self.idle.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaClient for RecordingClient {
    type Session = RecordingSession;

    async fn acquire(&self) -> Result<RecordingSession, DatabaseError> {
        self.events.push(SessionEvent::Acquire(self.schema.clone()));

        let reused = self.idle.lock().unwrap().pop();
        let connection = match reused {
            Some(connection) => connection,
            None => {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                PhysicalConnection {
                    id: *next,
                    search_path: SchemaName::PUBLIC.to_string(),
                }
            }
        };

        Ok(RecordingSession {
            connection: Some(connection),
            events: self.events.clone(),
            idle: Arc::clone(&self.idle),
            fail_search_path: Arc::clone(&self.fail_search_path),
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self) {
        self.events.push(SessionEvent::Close(self.schema.clone()));
    }
}

/// Checked-out connection; returns itself to the pool on drop unless discarded
#[derive(Debug)]
pub struct RecordingSession {
    connection: Option<PhysicalConnection>,
    events: EventLog,
    idle: Arc<Mutex<Vec<PhysicalConnection>>>,
    fail_search_path: Arc<HashSet<String>>,
}

impl RecordingSession {
    pub fn search_path(&self) -> String {
        self.connection
            .as_ref()
            .map(|c| c.search_path.clone())
            .unwrap_or_default()
    }

    pub fn connection_id(&self) -> usize {
        self.connection.as_ref().map(|c| c.id).unwrap_or_default()
    }

    /// Record the body of an operation against this session
    pub fn run(&self, label: &str) {
        self.events.push(SessionEvent::Run(label.to_string()));
    }
}

#[async_trait]
impl SchemaSession for RecordingSession {
    async fn set_search_path(&mut self, schema: &SchemaName) -> Result<(), DatabaseError> {
        tokio::task::yield_now().await;
        if self.fail_search_path.contains(schema.as_str()) {
            return Err(DatabaseError::Sqlx(sqlx::Error::Protocol(format!(
                "cannot set search_path to {}",
                schema
            ))));
        }
        self.events.push(SessionEvent::SetSearchPath(schema.to_string()));
        if let Some(connection) = self.connection.as_mut() {
            connection.search_path = schema.to_string();
        }
        Ok(())
    }

    fn discard(mut self) {
        if let Some(connection) = self.connection.take() {
            self.events.push(SessionEvent::Discard(connection.search_path));
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.idle.lock().unwrap().push(connection);
        }
    }
}
