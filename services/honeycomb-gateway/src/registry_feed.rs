use honeycomb_common::{ChangeEvent, ReceiptDocument, ServiceInstance, ServiceProfile};
use redis::AsyncCommands;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::RECEIPTS_PREFIX;

pub type ProfileTable = Arc<RwLock<HashMap<String, ServiceProfile>>>;

/// Full scan of every persisted receipt, folded into a profile-per-service
/// table. Runs once at boot before the change-feed subscription starts, so
/// there's no window where a profile lookup sees neither the snapshot nor
/// the live feed.
pub async fn bootstrap(client: &redis::Client) -> redis::RedisResult<ProfileTable> {
    let mut con = client.get_multiplexed_tokio_connection().await?;
    let mut table: HashMap<String, ServiceProfile> = HashMap::new();

    let keys: Vec<String> = con.keys(format!("{RECEIPTS_PREFIX}*")).await?;
    for key in keys {
        let raw: String = con.get(&key).await?;
        match serde_json::from_str::<ReceiptDocument>(&raw) {
            Ok(doc) => upsert(&mut table, doc),
            Err(err) => warn!(%key, %err, "skipping unparsable receipt during bootstrap scan"),
        }
    }

    info!(services = table.len(), "bootstrap scan of registry receipts complete");
    Ok(Arc::new(RwLock::new(table)))
}

/// Subscribes to the registry's change-feed channel and keeps `table` in
/// sync for the lifetime of the process. Runs as a background task; a
/// connection drop is logged and the subscribe loop exits (the container
/// orchestrator restarts the whole process).
pub async fn follow(client: redis::Client, table: ProfileTable) {
    loop {
        match run_subscription(&client, &table).await {
            Ok(()) => break,
            Err(err) => {
                error!(%err, "change-feed subscription failed, retrying in 2s");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
    }
}

async fn run_subscription(client: &redis::Client, table: &ProfileTable) -> redis::RedisResult<()> {
    use tokio_stream::StreamExt;

    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(crate::CHANGE_CHANNEL).await?;
    let mut stream = pubsub.into_on_message();

    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "malformed change-feed message payload");
                continue;
            }
        };
        match serde_json::from_str::<ChangeEvent>(&payload) {
            Ok(event) => apply(table, event).await,
            Err(err) => warn!(%err, "unparsable change-feed event"),
        }
    }
    Ok(())
}

async fn apply(table: &ProfileTable, event: ChangeEvent) {
    let mut guard = table.write().await;
    match event {
        ChangeEvent::Upserted(doc) => upsert(&mut guard, *doc),
        ChangeEvent::Deleted { service_name, receipt_id } => {
            if let Some(profile) = guard.get_mut(&service_name) {
                profile.instances.retain(|i| i.receipt_id != receipt_id);
                if profile.instances.is_empty() {
                    guard.remove(&service_name);
                }
            }
        }
    }
}

fn upsert(table: &mut HashMap<String, ServiceProfile>, doc: ReceiptDocument) {
    let instance = ServiceInstance {
        id: doc.receipt.service_id,
        receipt_id: doc.receipt.receipt_id,
        created_at: doc.receipt.created_at,
        rpc_endpoint: doc.claims.network.rpc_endpoint.clone(),
        urn: doc.receipt.urn.clone(),
    };

    let profile = table.entry(doc.claims.name.clone()).or_insert_with(|| ServiceProfile {
        name: doc.claims.name.clone(),
        version: doc.claims.version.clone(),
        depends_on: doc.claims.depends_on.clone(),
        ports: doc.claims.ports.clone(),
        api: doc.claims.api.clone(),
        instances: Vec::new(),
    });

    profile.version = doc.claims.version;
    profile.depends_on = doc.claims.depends_on;
    profile.ports = doc.claims.ports;
    profile.api = doc.claims.api;
    profile.instances.retain(|i| i.receipt_id != instance.receipt_id);
    profile.instances.push(instance);
}
