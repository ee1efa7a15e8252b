//! Common test utilities: a scripted in-memory pool that records everything it is asked to do

#![allow(dead_code)] // Not every test binary uses every helper

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlstash::core::classify;
use sqlstash::{
    Command, Connector, Executor, Field, PoolOptions, QueryResult, Row, Session, StashConfig,
    StashPool, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Something the pool asked the fake database to do
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Acquire,
    Release,
    Begin,
    Commit,
    Rollback,
    /// Statement run on a pooled connection
    Execute(String),
    /// Statement run on a dedicated session
    TxExecute(String),
    Close,
}

#[derive(Default)]
struct MockState {
    events: Mutex<Vec<Event>>,
    fail_on: Mutex<Option<String>>,
    fail_close: Mutex<bool>,
    delay: Mutex<Duration>,
    selects: AtomicU64,
    options: Mutex<Option<PoolOptions>>,
}

impl MockState {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    async fn respond(&self, statement: &str) -> anyhow::Result<QueryResult> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(needle) = self.fail_on.lock().as_deref() {
            if statement.contains(needle) {
                anyhow::bail!("simulated failure on `{}`", statement);
            }
        }

        Ok(match classify(statement) {
            Command::Select => {
                let n = self.selects.fetch_add(1, Ordering::SeqCst) as i64 + 1;
                QueryResult::with_rows(
                    Command::Select,
                    vec![Field::new("execution", "int8"), Field::new("sql", "text")],
                    vec![Row::new().with("execution", n).with("sql", statement)],
                )
            }
            Command::Insert => {
                let tuples = if statement.contains("VALUES") {
                    statement.matches("), (").count() as u64 + 1
                } else {
                    1
                };
                QueryResult::affected(Command::Insert, tuples)
            }
            command @ (Command::Update | Command::Delete) => QueryResult::affected(command, 1),
            Command::Other => QueryResult::affected(Command::Other, 0),
        })
    }
}

/// Fake pool handed to `StashPool` through [`MockConnector`]
#[derive(Clone, Default)]
pub struct MockExecutor {
    state: Arc<MockState>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.state.events.lock().clear();
    }

    /// Every statement, pooled or transactional, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Execute(s) | Event::TxExecute(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn count_matching(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Number of SELECTs that reached the database
    pub fn select_round_trips(&self) -> u64 {
        self.state.selects.load(Ordering::SeqCst)
    }

    /// Make every statement containing `needle` fail
    pub fn fail_on(&self, needle: &str) {
        *self.state.fail_on.lock() = Some(needle.to_string());
    }

    pub fn stop_failing(&self) {
        *self.state.fail_on.lock() = None;
    }

    pub fn fail_close(&self) {
        *self.state.fail_close.lock() = true;
    }

    /// Slow every statement down
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    pub fn pool_options(&self) -> Option<PoolOptions> {
        self.state.options.lock().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn acquire(&self) -> anyhow::Result<Box<dyn Session>> {
        self.state.record(Event::Acquire);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }

    fn release(&self, _session: Box<dyn Session>) {
        self.state.record(Event::Release);
    }

    async fn execute(&self, statement: &str, _params: &[Value]) -> anyhow::Result<QueryResult> {
        self.state.record(Event::Execute(statement.to_string()));
        self.state.respond(statement).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.state.record(Event::Close);
        if *self.state.fail_close.lock() {
            anyhow::bail!("pool already gone");
        }
        Ok(())
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl Session for MockSession {
    async fn execute(
        &mut self,
        statement: &str,
        _params: &[Value],
    ) -> anyhow::Result<QueryResult> {
        self.state.record(Event::TxExecute(statement.to_string()));
        self.state.respond(statement).await
    }

    async fn begin(&mut self) -> anyhow::Result<()> {
        self.state.record(Event::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        self.state.record(Event::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> anyhow::Result<()> {
        self.state.record(Event::Rollback);
        Ok(())
    }
}

pub struct MockConnector {
    pub executor: MockExecutor,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, options: &PoolOptions) -> anyhow::Result<Arc<dyn Executor>> {
        *self.executor.state.options.lock() = Some(options.clone());
        Ok(Arc::new(self.executor.clone()) as Arc<dyn Executor>)
    }
}

/// Config with background flushing slowed down so tests control when drains happen
pub fn quiet_config() -> StashConfig {
    StashConfig::default()
        .with_flush_interval(Duration::from_secs(3600))
        .with_eviction_interval(Duration::from_secs(3600))
}

/// Connect a pool to a fresh mock executor
pub async fn setup_pool(config: StashConfig) -> (StashPool, MockExecutor) {
    let executor = MockExecutor::new();
    let connector = MockConnector {
        executor: executor.clone(),
    };
    let pool = StashPool::connect(config, &connector)
        .await
        .expect("mock connect cannot fail");
    (pool, executor)
}
