use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};

use crate::{
    config::PizzeriaConfig,
    core::{
        catalog::CatalogStore,
        merge::{MergeCompactor, MergeReport},
        orders::OrderIngestor,
    },
    error::{ErrorKind, StoreError, StoreResult},
    record::{OrderRecord, PizzaDraft, PizzaRecord},
    storage::Storage,
    types::PizzaId,
    validate::{validate_catalog, validate_pizza_draft},
};

use super::{events::PizzeriaEvent, scheduler::MergeScheduler};

/// Failure of a [`PizzeriaHandle`] call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The writer task is gone, usually after [`PizzeriaHandle::shutdown`].
    #[error("runtime channel closed")]
    ChannelClosed,
    /// A blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
    /// The merge scheduler has been stopped.
    #[error("merge scheduler stopped")]
    Stopped,
}

impl RuntimeError {
    /// Store failure class, if this is a store failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Store(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Boundary API over the catalog, the order directory, and the aggregate.
///
/// Catalog commands go through one writer task, so concurrent mutations are
/// applied one after another against fresh reads. Order writes and aggregate
/// reads run directly on the blocking pool.
pub struct PizzeriaHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<PizzeriaEvent>,
    orders: Arc<OrderIngestor>,
    compactor: Arc<MergeCompactor>,
    scheduler: Arc<MergeScheduler>,
}

impl Clone for PizzeriaHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            orders: Arc::clone(&self.orders),
            compactor: Arc::clone(&self.compactor),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

enum Command {
    ReadCatalog {
        resp: oneshot::Sender<Result<Vec<PizzaRecord>, RuntimeError>>,
    },
    GetPizza {
        id: PizzaId,
        resp: oneshot::Sender<Result<PizzaRecord, RuntimeError>>,
    },
    CreatePizza {
        draft: PizzaDraft,
        resp: oneshot::Sender<Result<PizzaRecord, RuntimeError>>,
    },
    UpdatePizza {
        id: PizzaId,
        draft: PizzaDraft,
        resp: oneshot::Sender<Result<PizzaRecord, RuntimeError>>,
    },
    DeletePizza {
        id: PizzaId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    ReplaceCatalog {
        records: Vec<PizzaRecord>,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Starts the catalog writer task and the merge scheduler over `storage`.
///
/// Must be called from within a tokio runtime. The order directory is not
/// created here; submissions fail until it exists.
pub fn spawn_pizzeria(storage: Arc<dyn Storage>, config: PizzeriaConfig) -> PizzeriaHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<PizzeriaEvent>(config.event_queue_bound);

    let catalog = Arc::new(Mutex::new(
        CatalogStore::new(Arc::clone(&storage), config.catalog_key.clone())
            .with_policy(config.id_policy),
    ));
    let orders = Arc::new(OrderIngestor::new(
        Arc::clone(&storage),
        config.order_dir.clone(),
        config.order_extension.clone(),
    ));
    let compactor = Arc::new(MergeCompactor::new(
        storage,
        config.order_dir.clone(),
        config.aggregate_key.clone(),
        config.order_extension.clone(),
    ));
    let scheduler = Arc::new(MergeScheduler::start(
        Arc::clone(&compactor),
        config.merge_interval(),
        config.merge_on_start,
        events_tx.clone(),
    ));

    let events_tx_loop = events_tx.clone();
    let scheduler_loop = Arc::clone(&scheduler);
    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &catalog, &events_tx_loop, &scheduler_loop).await;
            if done {
                break;
            }
        }
    });

    PizzeriaHandle {
        cmd_tx,
        events_tx,
        orders,
        compactor,
        scheduler,
    }
}

impl PizzeriaHandle {
    /// New receiver for events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PizzeriaEvent> {
        self.events_tx.subscribe()
    }

    /// The whole catalog in document order.
    pub async fn read_catalog(&self) -> Result<Vec<PizzaRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ReadCatalog { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// The first catalog entry with `id`.
    pub async fn get_pizza(&self, id: PizzaId) -> Result<PizzaRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::GetPizza { id, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Validates `fields` and appends a new pizza with an allocated id.
    pub async fn create_pizza(&self, fields: &Value) -> Result<PizzaRecord, RuntimeError> {
        let draft = validate_pizza_draft(fields).map_err(StoreError::from)?;
        let (tx, rx) = oneshot::channel();
        self.send(Command::CreatePizza { draft, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Validates `fields` and rewrites every entry with `id`, keeping its position.
    pub async fn update_pizza(&self, id: PizzaId, fields: &Value) -> Result<PizzaRecord, RuntimeError> {
        let draft = validate_pizza_draft(fields).map_err(StoreError::from)?;
        let (tx, rx) = oneshot::channel();
        self.send(Command::UpdatePizza { id, draft, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Removes every pizza with `id`; fails with a not-found error if none matched.
    pub async fn delete_pizza(&self, id: PizzaId) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::DeletePizza { id, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Overwrites the catalog with a validated full document.
    pub async fn replace_catalog(&self, doc: &Value) -> Result<Vec<PizzaRecord>, RuntimeError> {
        let records = validate_catalog(doc).map_err(StoreError::from)?;
        let (tx, rx) = oneshot::channel();
        self.send(Command::ReplaceCatalog {
            records: records.clone(),
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
        Ok(records)
    }

    /// Validates and stores one order; returns the stored record.
    ///
    /// The order is readable through [`Self::get_order`] right away and shows
    /// up in [`Self::read_order_aggregate`] after the next merge cycle.
    pub async fn submit_order(&self, record: &Value) -> Result<OrderRecord, RuntimeError> {
        let orders = Arc::clone(&self.orders);
        let raw = record.clone();
        let (order, _key) = blocking(move || orders.submit_value(&raw)).await?;
        let _ = self.events_tx.send(PizzeriaEvent::OrderSubmitted {
            id: order.id.clone(),
        });
        Ok(order)
    }

    /// The stored order document for `id`, independent of the aggregate.
    pub async fn get_order(&self, id: &str) -> Result<OrderRecord, RuntimeError> {
        let orders = Arc::clone(&self.orders);
        let id = id.to_string();
        blocking(move || orders.get(&id)).await
    }

    /// Orders as of the last completed merge cycle.
    pub async fn read_order_aggregate(&self) -> Result<Vec<OrderRecord>, RuntimeError> {
        let compactor = Arc::clone(&self.compactor);
        blocking(move || compactor.read_aggregate()).await
    }

    /// Runs a merge cycle now; `Ok(None)` if one was already running.
    pub async fn trigger_merge(&self) -> Result<Option<MergeReport>, RuntimeError> {
        self.scheduler.trigger().await
    }

    /// Stops the merge scheduler and the catalog writer.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    catalog: &Arc<Mutex<CatalogStore>>,
    events_tx: &broadcast::Sender<PizzeriaEvent>,
    scheduler: &MergeScheduler,
) -> bool {
    match cmd {
        Command::ReadCatalog { resp } => {
            let res = with_catalog(catalog, |store| store.list()).await;
            let _ = resp.send(res);
        }
        Command::GetPizza { id, resp } => {
            let res = with_catalog(catalog, move |store| store.get(id)).await;
            let _ = resp.send(res);
        }
        Command::CreatePizza { draft, resp } => {
            let res = with_catalog(catalog, move |store| store.create(draft)).await;
            if let Ok(rec) = &res {
                let _ = events_tx.send(PizzeriaEvent::PizzaCreated { id: rec.id });
            }
            let _ = resp.send(res);
        }
        Command::UpdatePizza { id, draft, resp } => {
            let res = with_catalog(catalog, move |store| store.update(id, draft)).await;
            if res.is_ok() {
                let _ = events_tx.send(PizzeriaEvent::PizzaUpdated { id });
            }
            let _ = resp.send(res);
        }
        Command::DeletePizza { id, resp } => {
            let res = with_catalog(catalog, move |store| store.delete(id)).await;
            if res.is_ok() {
                let _ = events_tx.send(PizzeriaEvent::PizzaDeleted { id });
            }
            let _ = resp.send(res);
        }
        Command::ReplaceCatalog { records, resp } => {
            let len = records.len();
            let res = with_catalog(catalog, move |store| store.replace_all(&records)).await;
            if res.is_ok() {
                let _ = events_tx.send(PizzeriaEvent::CatalogReplaced { len });
            }
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(scheduler.stop().await);
            return true;
        }
    }

    false
}

async fn with_catalog<T, F>(catalog: &Arc<Mutex<CatalogStore>>, f: F) -> Result<T, RuntimeError>
where
    F: FnOnce(&mut CatalogStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let catalog = Arc::clone(catalog);
    blocking(move || {
        let mut store = catalog.blocking_lock();
        f(&mut store)
    })
    .await
}

async fn blocking<T, F>(f: F) -> Result<T, RuntimeError>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::Join(e.to_string()))?
        .map_err(RuntimeError::from)
}
