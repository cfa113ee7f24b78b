//! HTTP stats server exposing `/stats` as JSON (spec §7's `stats()` accessor,
//! surfaced over the network for the same host/ESP32 monitoring use case the
//! teacher's network::stats_server served).
//!
//! Uses `tiny_http`, which works on both host and ESP32 (via std::net).

use crate::stats::Stats;
use log::{error, info, warn};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Method, Response, Server};

/// Default port for the stats server.
pub const DEFAULT_STATS_PORT: u16 = 8080;

/// Everything served at `/stats`: the routing counters plus uptime.
#[derive(Debug, Serialize)]
struct StatsResponse {
    uptime_secs: u64,
    #[serde(flatten)]
    stats: crate::stats::StatsSnapshot,
}

/// HTTP stats server. Runs in a background thread; dropping it stops the
/// thread.
pub struct StatsServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl StatsServer {
    /// Start the stats server.
    ///
    /// `bind_addr` is `None` for `0.0.0.0`. `stats` is shared with the
    /// `RoutingCore` whose counters it reports; this server never mutates it.
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<Stats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;

        info!("stats server listening on http://{}/stats", addr);

        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let start_time = Instant::now();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, start_time, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    fn run_server(
        server: Server,
        stats: Arc<Stats>,
        start_time: Instant,
        shutdown: Arc<std::sync::atomic::AtomicBool>,
    ) {
        let content_type =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header");
        let location =
            tiny_http::Header::from_bytes(&b"Location"[..], &b"/stats"[..]).expect("static header");
        let allow_get =
            tiny_http::Header::from_bytes(&b"Allow"[..], &b"GET"[..]).expect("static header");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("stats server shutting down");
                break;
            }

            match server.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    if request.method() != &Method::Get {
                        let response = Response::from_string("Method Not Allowed")
                            .with_status_code(405)
                            .with_header(allow_get.clone());
                        let _ = request.respond(response);
                        continue;
                    }

                    let path = request.url();

                    if path == "/stats" || path == "/stats/" {
                        let body = StatsResponse {
                            uptime_secs: start_time.elapsed().as_secs(),
                            stats: stats.snapshot(),
                        };
                        let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
                        let response = Response::from_string(json)
                            .with_header(content_type.clone())
                            .with_status_code(200);
                        if let Err(e) = request.respond(response) {
                            warn!("failed to send response: {}", e);
                        }
                    } else if path == "/" {
                        let response = Response::from_string("see /stats for node statistics")
                            .with_status_code(302)
                            .with_header(location.clone());
                        if let Err(e) = request.respond(response) {
                            warn!("failed to send redirect: {}", e);
                        }
                    } else {
                        let response = Response::from_string("Not Found").with_status_code(404);
                        if let Err(e) = request.respond(response) {
                            warn!("failed to send 404: {}", e);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to 100ms due to the polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loramesh_macros::esp32_test;

    #[esp32_test]
    fn test_stats_response_serializes_flat() {
        let stats = Stats::new();
        stats.record_tx();
        let body = StatsResponse { uptime_secs: 5, stats: stats.snapshot() };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"uptime_secs\":5"));
        assert!(json.contains("\"tx\":1"));
    }

    #[esp32_test]
    fn test_server_starts_and_stops_on_ephemeral_port() {
        let stats = Arc::new(Stats::new());
        let mut server = StatsServer::start(Some("127.0.0.1".parse().unwrap()), 0, stats).unwrap();
        server.stop();
    }
}
