// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Counters the engine bumps as passes run. Shared with the metrics
/// endpoint outside the engine lock.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub rebalance_passes: AtomicU64,
    pub liquidation_passes: AtomicU64,
    pub legs_executed: AtomicU64,
    pub legs_skipped: AtomicU64,
    pub valuation_skips: AtomicU64,
    pub invests: AtomicU64,
    pub releases: AtomicU64,
    pub emergency_exits: AtomicU64,
}

impl EngineStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub async fn spawn_metrics_server(port: u16, stats: Arc<EngineStats>) -> Option<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!("Metrics server failed to bind: {}", e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!("Metrics server listening on {}", addr);
    }

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let body = render_metrics(&stats);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    tracing::warn!("Metrics accept error: {}", e);
                    continue;
                }
            }
        }
    });

    local
}

fn render_metrics(stats: &Arc<EngineStats>) -> String {
    let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
    format!(
        concat!(
            "# TYPE allocator_rebalance_passes counter\nallocator_rebalance_passes {}\n",
            "# TYPE allocator_liquidation_passes counter\nallocator_liquidation_passes {}\n",
            "# TYPE allocator_legs_executed counter\nallocator_legs_executed {}\n",
            "# TYPE allocator_legs_skipped counter\nallocator_legs_skipped {}\n",
            "# TYPE allocator_valuation_skips counter\nallocator_valuation_skips {}\n",
            "# TYPE allocator_invests counter\nallocator_invests {}\n",
            "# TYPE allocator_releases counter\nallocator_releases {}\n",
            "# TYPE allocator_emergency_exits counter\nallocator_emergency_exits {}\n"
        ),
        load(&stats.rebalance_passes),
        load(&stats.liquidation_passes),
        load(&stats.legs_executed),
        load(&stats.legs_skipped),
        load(&stats.valuation_skips),
        load(&stats.invests),
        load(&stats.releases),
        load(&stats.emergency_exits),
    )
}
