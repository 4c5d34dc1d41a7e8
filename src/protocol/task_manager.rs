use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, sleep};

use crate::network::{Subscription, Transport};
use crate::router::Router;

/// Spawns the inbound dispatch worker and the periodic HELLO/LSP worker.
pub fn start_tasks<T: Transport>(
    router: &Arc<Router<T>>,
    subscription: Subscription,
) -> Vec<JoinHandle<()>> {
    let listen_handle = start_listen_task(router, subscription, router.shutdown_receiver());
    let maintenance_handle = start_maintenance_task(router, router.shutdown_receiver());

    info!("[{}] All protocol tasks started", router.id());
    vec![listen_handle, maintenance_handle]
}

fn start_listen_task<T: Transport>(
    router: &Arc<Router<T>>,
    subscription: Subscription,
    shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let router = Arc::clone(router);
    tokio::spawn(async move {
        listen_task(router, subscription, shutdown_rx).await;
    })
}

fn start_maintenance_task<T: Transport>(
    router: &Arc<Router<T>>,
    shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let router = Arc::clone(router);
    tokio::spawn(async move {
        maintenance_task(router, shutdown_rx).await;
    })
}

/// Hands each inbound packet to its own dispatch task. On shutdown the
/// subscription is released and in-flight packets are allowed to finish.
async fn listen_task<T: Transport>(
    router: Arc<Router<T>>,
    mut subscription: Subscription,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("[{}] Listen task shutting down", router.id());
                break;
            }
            received = subscription.inbound.recv() => {
                let Some(bytes) = received else {
                    warn!("[{}] transport closed the inbound channel", router.id());
                    break;
                };
                let router = Arc::clone(&router);
                in_flight.spawn(async move {
                    let disposition = router.handle_bytes(&bytes).await;
                    debug!("[{}] inbound packet: {:?}", router.id(), disposition);
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    drop(subscription);
    while in_flight.join_next().await.is_some() {}
}

/// Every LSP interval: HELLO burst, short settle, then a fresh LSP.
async fn maintenance_task<T: Transport>(router: Arc<Router<T>>, mut shutdown_rx: broadcast::Receiver<()>) {
    let timers = router.config().timers.clone();

    tokio::select! {
        _ = shutdown_rx.recv() => return,
        _ = sleep(timers.initial_delay()) => {}
    }

    let mut ticker = interval(timers.lsp_interval());
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("[{}] Maintenance task shutting down", router.id());
                break;
            }
            _ = ticker.tick() => {
                let acked = router.send_hellos().await;
                debug!("[{}] HELLO burst reached {} neighbors", router.id(), acked);

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(timers.hello_settle()) => {}
                }

                if let Err(e) = router.originate_lsp().await {
                    warn!("[{}] LSP generation failed: {}", router.id(), e);
                }
            }
        }
    }
}
