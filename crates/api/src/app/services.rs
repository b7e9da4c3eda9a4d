//! Service wiring: stores, movement service, request engine, realtime fan-out.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use quartermaster_auth::{Actor, IdentityDirectory};
use quartermaster_core::TransferRequestId;
use quartermaster_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use quartermaster_infra::{
    catalog::{Catalog, InMemoryCatalog},
    config::{AppConfig, ConfigError, SeedData},
    identity::InMemoryIdentityDirectory,
    ledger_store::{InMemoryLedgerStore, LedgerBackend, PostgresLedgerStore},
    movement::DirectMovementService,
    order_numbers::{OrderNumberGenerator, PostgresOrderNumbers, SequentialOrderNumbers},
    pending_counts::PendingCountAggregator,
    pg,
    request_store::{InMemoryTransferRequestStore, PostgresTransferRequestStore, RequestBackend},
    transfer_engine::TransferRequestEngine,
};
use quartermaster_inventory::TransferRequestEvent;

pub type Ledger = Arc<LedgerBackend>;
pub type Requests = Arc<RequestBackend>;
pub type RequestBus = Arc<InMemoryEventBus<EventEnvelope<TransferRequestEvent>>>;
pub type Engine = TransferRequestEngine<Ledger, Requests, RequestBus>;

/// Notification pushed to realtime clients after a request transition commits.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub request_id: TransferRequestId,
    pub topic: String,
    pub sequence_number: u64,
}

impl RealtimeMessage {
    fn from_envelope(envelope: &EventEnvelope<TransferRequestEvent>) -> Self {
        Self {
            request_id: TransferRequestId::from_uuid(envelope.stream_id()),
            topic: envelope.payload().event_type().to_string(),
            sequence_number: envelope.sequence_number(),
        }
    }
}

pub struct AppServices {
    pub movement: Arc<DirectMovementService<Ledger>>,
    pub engine: Arc<Engine>,
    pub pending: PendingCountAggregator<Requests>,
    pub directory: Arc<InMemoryIdentityDirectory>,
    pub catalog: Arc<InMemoryCatalog>,
    pub realtime_tx: broadcast::Sender<RealtimeMessage>,
}

/// Build the service graph, loading seed data if configured.
///
/// With `config.database_url` set, the ledger, the request store and order
/// numbering live in Postgres; otherwise everything stays in memory.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ConfigError> {
    let directory = Arc::new(InMemoryIdentityDirectory::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    if let Some(path) = &config.seed_file {
        SeedData::load(path)?.install(&directory, &catalog)?;
    }

    let catalog_dyn: Arc<dyn Catalog> = catalog.clone();
    let directory_dyn: Arc<dyn IdentityDirectory> = directory.clone();

    let (ledger, requests, orders): (Ledger, Requests, Arc<dyn OrderNumberGenerator>) =
        match &config.database_url {
            Some(url) => {
                let pool = pg::connect(url).await?;
                tracing::info!("using postgres ledger and request stores");
                (
                    Arc::new(LedgerBackend::Postgres(PostgresLedgerStore::new(pool.clone()))),
                    Arc::new(RequestBackend::Postgres(PostgresTransferRequestStore::new(
                        pool.clone(),
                    ))),
                    Arc::new(PostgresOrderNumbers::new(config.order_prefix.clone(), pool)),
                )
            }
            None => (
                Arc::new(LedgerBackend::InMemory(InMemoryLedgerStore::new())),
                Arc::new(RequestBackend::InMemory(InMemoryTransferRequestStore::new())),
                Arc::new(SequentialOrderNumbers::new(config.order_prefix.clone())),
            ),
        };

    let movement = Arc::new(DirectMovementService::new(
        ledger,
        catalog_dyn.clone(),
        directory_dyn.clone(),
    ));

    let bus: RequestBus = Arc::new(InMemoryEventBus::new());
    let engine = Arc::new(TransferRequestEngine::new(
        movement.clone(),
        requests.clone(),
        orders,
        bus.clone(),
        catalog_dyn,
        directory_dyn.clone(),
    ));
    let pending = PendingCountAggregator::new(requests, directory_dyn);

    // Realtime channel (SSE): lossy broadcast, visibility-filtered per client.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> realtime channel
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("request-events".to_string())
            .spawn(move || {
                while let Ok(envelope) = sub.recv() {
                    let _ = realtime_tx.send(RealtimeMessage::from_envelope(&envelope));
                }
            });
        if let Err(err) = spawned {
            tracing::warn!("realtime fan-out disabled: {err}");
        }
    }

    Ok(AppServices {
        movement,
        engine,
        pending,
        directory,
        catalog,
        realtime_tx,
    })
}

/// SSE stream of request notifications the actor is allowed to see.
pub fn request_sse_stream(
    services: Arc<AppServices>,
    actor: Actor,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| {
        let msg = msg.ok()?;
        if !services.engine.is_visible_to(&actor, msg.request_id) {
            return None;
        }
        SseEvent::default()
            .event(msg.topic.clone())
            .json_data(&msg)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
