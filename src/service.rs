//! Census Runtime Service
//!
//! Runs the ledger on a conventional tokio process: every mutation goes
//! through one mutex around the contract, notifications fan out on a
//! broadcast channel, and a relayer task drains the decryption gateway and
//! feeds each signed response back as the out-of-band callback.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CensusService                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  callers ──► Mutex<CensusContract> ──► broadcast<Event>     │
//! │                    │        ▲                                │
//! │   request_decryption        │ on_decrypted                   │
//! │                    ▼        │                                │
//! │           DecryptionGateway ──► relayer task                 │
//! │                                                              │
//! │  optional: LedgerSink write after every mutation             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use census_contracts::{
    AgeDistribution, AnalysisPhase, CallContext, CensusContract, CensusError, CensusEvent,
    CensusFields, CensusState, DecryptedResult, Identity, StateChanges,
};
use census_fhe::{
    CipherBackend, DecryptionGateway, DecryptionResponse, Decryptor, FHEError, RequestId,
};
use census_storage::{LedgerSink, Storage, StorageError, StorageResult};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Errors during service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] CensusError),
    #[error("Gateway error: {0}")]
    Gateway(#[from] FHEError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Timed out waiting for analysis {0} to be revealed")]
    Timeout(u64),
    #[error("Service already running")]
    AlreadyRunning,
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Relayer sleep when the gateway queue is empty
    pub relay_interval: Duration,
    /// Broadcast channel capacity
    pub event_capacity: usize,
    /// Evict settled decryption requests after each reveal
    pub prune_after_reveal: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            relay_interval: Duration::from_millis(10),
            event_capacity: 1024,
            prune_after_reveal: false,
        }
    }
}

/// Events published by the service
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// Notification emitted by the ledger
    Ledger(CensusEvent),
    /// A decryption callback was refused
    CallbackRejected { request_id: RequestId, reason: String },
    /// Ledger changes written to storage
    Persisted { state_root: [u8; 32] },
    /// Writing to storage failed; the in-memory ledger is ahead of the store
    PersistFailed { reason: String },
}

type Gateway<D> = Arc<DecryptionGateway<D>>;
type Contract<B, D> = CensusContract<B, Gateway<D>>;

/// State shared between the service and its relayer task
struct Shared<B, D>
where
    B: CipherBackend,
    D: Decryptor<Ciphertext = B::Ciphertext>,
{
    config: ServiceConfig,
    contract: Mutex<Contract<B, D>>,
    gateway: Gateway<D>,
    event_tx: broadcast::Sender<ServiceEvent>,
    sink: Option<Arc<dyn LedgerSink<B::Ciphertext>>>,
    /// Next write must rewrite the whole ledger
    resync: AtomicBool,
}

impl<B, D> Shared<B, D>
where
    B: CipherBackend,
    D: Decryptor<Ciphertext = B::Ciphertext>,
{
    /// Run a ledger operation under the lock, then persist and publish.
    ///
    /// Once the operation succeeds its events are published even if the
    /// write fails; the failure is reported as `PersistFailed`.
    fn apply<T>(
        &self,
        op: impl FnOnce(&mut Contract<B, D>) -> Result<T, CensusError>,
    ) -> ServiceResult<T> {
        let mut contract = self.contract.lock();
        let value = op(&mut contract)?;

        let events = contract.take_events();
        let changes = contract.take_changes();
        let persisted = self.persist(contract.state(), &changes);
        drop(contract);

        for event in events {
            let _ = self.event_tx.send(ServiceEvent::Ledger(event));
        }
        match persisted {
            Some(Ok(state_root)) => {
                let _ = self.event_tx.send(ServiceEvent::Persisted { state_root });
            }
            Some(Err(e)) => {
                error!("Failed to persist ledger: {}", e);
                let _ = self.event_tx.send(ServiceEvent::PersistFailed {
                    reason: e.to_string(),
                });
            }
            None => {}
        }
        Ok(value)
    }

    /// Write to the sink, if any. After a failure the next write is a full save.
    fn persist(
        &self,
        state: &CensusState<B::Ciphertext>,
        changes: &StateChanges,
    ) -> Option<StorageResult<[u8; 32]>> {
        let sink = self.sink.as_ref()?;
        let result = if self.resync.swap(false, Ordering::SeqCst) {
            sink.save_full(state)
        } else {
            sink.save_changes(state, changes)
        };
        if result.is_err() {
            self.resync.store(true, Ordering::SeqCst);
        }
        Some(result)
    }

    /// Hand a gateway response to the ledger callback
    fn deliver(&self, response: &DecryptionResponse) -> ServiceResult<u64> {
        let prune = self.config.prune_after_reveal;
        let result = self.apply(|contract| {
            let analysis_id =
                contract.on_decrypted(response.request_id, &response.payload, &response.proof)?;
            if prune {
                let evicted = contract.prune_settled();
                debug!("Pruned {} settled decryption requests", evicted);
            }
            Ok(analysis_id)
        });

        if let Err(ServiceError::Ledger(e)) = &result {
            warn!("Callback {} rejected: {}", response.request_id, e);
            let _ = self.event_tx.send(ServiceEvent::CallbackRejected {
                request_id: response.request_id,
                reason: e.to_string(),
            });
        }
        result
    }

    fn revealed(&self, analysis_id: u64) -> Option<DecryptedResult> {
        self.contract
            .lock()
            .decrypted(analysis_id)
            .filter(|d| d.revealed)
            .copied()
    }
}

/// The census runtime service
pub struct CensusService<B, D>
where
    B: CipherBackend,
    D: Decryptor<Ciphertext = B::Ciphertext>,
{
    shared: Arc<Shared<B, D>>,
    /// Running flag
    running: Arc<RwLock<bool>>,
}

impl<B, D> CensusService<B, D>
where
    B: CipherBackend + 'static,
    D: Decryptor<Ciphertext = B::Ciphertext> + 'static,
{
    /// Create a service around an existing contract and its gateway
    pub fn new(config: ServiceConfig, contract: Contract<B, D>, gateway: Gateway<D>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            shared: Arc::new(Shared {
                config,
                contract: Mutex::new(contract),
                gateway,
                event_tx,
                sink: None,
                resync: AtomicBool::new(false),
            }),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Fresh ledger administered by `admin`
    pub fn create(config: ServiceConfig, admin: Identity, backend: B, gateway: Gateway<D>) -> Self {
        let contract = CensusContract::new(admin, backend, gateway.clone());
        Self::new(config, contract, gateway)
    }

    /// Persist every mutation to `storage`.
    ///
    /// Must be called before the service is shared or started.
    pub fn with_storage(self, storage: Arc<Storage>) -> Self {
        self.with_sink(storage)
    }

    /// Persist every mutation to `sink`. The first write is a full save.
    ///
    /// Must be called before the service is shared or started.
    pub fn with_sink(self, sink: Arc<dyn LedgerSink<B::Ciphertext>>) -> Self {
        let shared = match Arc::try_unwrap(self.shared) {
            Ok(mut shared) => {
                shared.sink = Some(sink);
                shared.resync = AtomicBool::new(true);
                shared
            }
            Err(shared) => {
                warn!("Service already shared; storage not attached");
                return Self {
                    shared,
                    running: self.running,
                };
            }
        };

        Self {
            shared: Arc::new(shared),
            running: self.running,
        }
    }

    /// Start the decryption relayer
    pub async fn start(&self) -> ServiceResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(ServiceError::AlreadyRunning);
            }
            *running = true;
        }

        let shared = self.shared.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            run_relayer(shared, running).await;
        });

        info!("Census service started");
        Ok(())
    }

    /// Stop the decryption relayer
    pub async fn stop(&self) {
        *self.running.write().await = false;
        info!("Census service stopped");
    }

    /// Check if the relayer is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Subscribe to service events
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn gateway(&self) -> &Gateway<D> {
        &self.shared.gateway
    }

    pub fn authorize(&self, ctx: &CallContext, identity: Identity) -> ServiceResult<()> {
        self.shared.apply(|c| c.authorize(ctx, identity))
    }

    pub fn submit(&self, ctx: &CallContext, fields: CensusFields<B::Ciphertext>) -> ServiceResult<u64> {
        self.shared.apply(|c| c.submit(ctx, fields))
    }

    pub fn analyze(&self, ctx: &CallContext, ids: &[u64]) -> ServiceResult<u64> {
        self.shared.apply(|c| c.analyze(ctx, ids))
    }

    pub fn request_decryption(&self, analysis_id: u64) -> ServiceResult<RequestId> {
        self.shared.apply(|c| c.request_decryption(analysis_id))
    }

    /// Deliver a decryption response by hand (the relayer does this when running)
    pub fn deliver(&self, response: &DecryptionResponse) -> ServiceResult<u64> {
        self.shared.deliver(response)
    }

    pub fn family_connections(&self, ids: &[u64]) -> ServiceResult<B::Ciphertext> {
        Ok(self.shared.contract.lock().family_connections(ids)?)
    }

    pub fn age_distribution(&self, ids: &[u64]) -> ServiceResult<AgeDistribution<B::Ciphertext>> {
        Ok(self.shared.contract.lock().age_distribution(ids)?)
    }

    pub fn records_of(&self, identity: &Identity) -> Vec<u64> {
        self.shared.contract.lock().records_of(identity)
    }

    pub fn phase(&self, analysis_id: u64) -> Option<AnalysisPhase> {
        self.shared.contract.lock().phase(analysis_id)
    }

    pub fn decrypted(&self, analysis_id: u64) -> Option<DecryptedResult> {
        self.shared.contract.lock().decrypted(analysis_id).copied()
    }

    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.shared.contract.lock().pending_requests()
    }

    /// Copy of the current ledger state
    pub fn snapshot(&self) -> CensusState<B::Ciphertext> {
        self.shared.contract.lock().state().clone()
    }

    /// Wait until `analysis_id` is revealed
    pub async fn wait_for_reveal(
        &self,
        analysis_id: u64,
        timeout: Duration,
    ) -> ServiceResult<DecryptedResult> {
        let mut rx = self.subscribe();
        if let Some(result) = self.shared.revealed(analysis_id) {
            return Ok(result);
        }

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(ServiceEvent::Ledger(CensusEvent::ResultRevealed { analysis_id: id }))
                        if id == analysis_id =>
                    {
                        if let Some(result) = self.shared.revealed(analysis_id) {
                            return Ok(result);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Reveal waiter lagged by {} events", skipped);
                        if let Some(result) = self.shared.revealed(analysis_id) {
                            return Ok(result);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ServiceError::Channel("event channel closed".into()));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ServiceError::Timeout(analysis_id))?
    }
}

/// Relayer loop: decrypt queued requests and deliver the callbacks
async fn run_relayer<B, D>(shared: Arc<Shared<B, D>>, running: Arc<RwLock<bool>>)
where
    B: CipherBackend,
    D: Decryptor<Ciphertext = B::Ciphertext>,
{
    while *running.read().await {
        match shared.gateway.fulfill_next() {
            Ok(Some(response)) => {
                // Rejections are already logged and published
                let _ = shared.deliver(&response);
            }
            Ok(None) => {
                // Small delay to prevent busy loop
                tokio::time::sleep(shared.config.relay_interval).await;
            }
            Err(e) => {
                warn!("Gateway failed to fulfill request: {}", e);
                tokio::time::sleep(shared.config.relay_interval).await;
            }
        }
    }
}
