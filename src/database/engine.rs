//! Single-writer storage actor.
//!
//! [`StorageEngine`] owns the [`Store`] and processes requests one at a time;
//! any number of cloned [`StorageHandle`]s submit requests and wait for their
//! own response.

use log::{error, info};
use std::collections::BTreeMap;
use std::future::Future;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use super::error::{Result, StorageError};
use super::operations::{PointsQuery, Store};
use super::StoreOptions;
use crate::models::Point;

const REQUEST_QUEUE_DEPTH: usize = 64;
const MAX_RETENTION_PERIOD: Duration = Duration::from_secs(3600);

type Reply<T> = oneshot::Sender<Result<T>>;

enum Request {
    PushPoints {
        points: Vec<Point>,
        reply: Reply<()>,
    },
    QueryPoints {
        start: OffsetDateTime,
        end: OffsetDateTime,
        reply: Reply<PointsQuery>,
    },
    SetAlias {
        addr: String,
        name: String,
        reply: Reply<()>,
    },
    GetAlias {
        addr: String,
        reply: Reply<String>,
    },
    ListAliases {
        reply: Reply<BTreeMap<String, String>>,
    },
}

/// Cloneable client side of the storage engine.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    requests: mpsc::Sender<Request>,
}

impl StorageHandle {
    pub async fn push_points(&self, points: Vec<Point>) -> Result<()> {
        self.call(|reply| Request::PushPoints { points, reply }).await
    }

    /// Points with `start < timestamp <= end`, unordered.
    pub async fn query_points(&self, start: OffsetDateTime, end: OffsetDateTime) -> Result<PointsQuery> {
        self.call(|reply| Request::QueryPoints { start, end, reply })
            .await
    }

    pub async fn set_alias(&self, addr: &str, name: &str) -> Result<()> {
        let (addr, name) = (addr.to_string(), name.to_string());
        self.call(|reply| Request::SetAlias { addr, name, reply })
            .await
    }

    pub async fn get_alias(&self, addr: &str) -> Result<String> {
        let addr = addr.to_string();
        self.call(|reply| Request::GetAlias { addr, reply }).await
    }

    pub async fn list_aliases(&self) -> Result<BTreeMap<String, String>> {
        self.call(|reply| Request::ListAliases { reply }).await
    }

    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| StorageError::EngineStopped)?;
        response.await.map_err(|_| StorageError::EngineStopped)?
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Request::PushPoints { .. } => "PushPoints",
            Request::QueryPoints { .. } => "QueryPoints",
            Request::SetAlias { .. } => "SetAlias",
            Request::GetAlias { .. } => "GetAlias",
            Request::ListAliases { .. } => "ListAliases",
        };
        f.write_str(kind)
    }
}

pub struct StorageEngine {
    store: Store,
    retention: time::Duration,
    requests: mpsc::Receiver<Request>,
}

impl StorageEngine {
    /// Opens the store and runs schema initialisation.
    ///
    /// Any failure here is fatal: no engine is created.
    pub fn start(options: &StoreOptions) -> Result<(StorageHandle, StorageEngine)> {
        let store = Store::open(options)?;
        info!(
            "Opened store {} (schema version {} on disk)",
            options.path.display(),
            store.detected_version().number()
        );
        Ok(Self::with_store(store, options.retention))
    }

    pub fn with_store(store: Store, retention: time::Duration) -> (StorageHandle, StorageEngine) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        (
            StorageHandle { requests: tx },
            StorageEngine {
                store,
                retention,
                requests: rx,
            },
        )
    }

    /// Serves requests until `shutdown` resolves or every handle is dropped.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = retention_period(self.retention).map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.execute(request),
                    None => {
                        info!("All storage handles dropped, stopping engine");
                        break;
                    }
                },
                _ = next_tick(&mut ticker) => self.store.execute_retention(self.retention),
                _ = &mut shutdown => {
                    info!("Storage engine shutting down");
                    break;
                }
            }
        }
    }

    fn execute(&self, request: Request) {
        let kind = format!("{request:?}");
        match request {
            Request::PushPoints { points, reply } => {
                let result = self.store.push_points(&points);
                respond(&kind, reply, result);
            }
            Request::QueryPoints { start, end, reply } => {
                let result = self.store.query_points(start, end);
                if let Ok(query) = &result {
                    Store::log_warnings(query);
                }
                respond(&kind, reply, result);
            }
            Request::SetAlias { addr, name, reply } => {
                respond(&kind, reply, self.store.set_alias(&addr, &name));
            }
            Request::GetAlias { addr, reply } => {
                respond(&kind, reply, self.store.get_alias(&addr));
            }
            Request::ListAliases { reply } => {
                respond(&kind, reply, self.store.list_aliases());
            }
        }
    }
}

fn respond<T>(kind: &str, reply: Reply<T>, result: Result<T>) {
    if let Err(e) = &result {
        error!("{} failed: {}", kind, e);
    }
    // The caller may have given up waiting; nothing to do then.
    let _ = reply.send(result);
}

/// Sweep period: a tenth of the retention window, capped at one hour.
pub fn retention_period(retention: time::Duration) -> Option<Duration> {
    if !retention.is_positive() {
        return None;
    }
    let tenth = Duration::try_from(retention / 10_i32).ok()?;
    Some(tenth.min(MAX_RETENTION_PERIOD).max(Duration::from_millis(1)))
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
