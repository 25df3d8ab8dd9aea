use anyhow::Context;
use fmcwcore::processing::ReportPublisher;
use serde_json::json;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter, Rejection, Reply};

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

/// `GET /report` answers with the newest detection report, or `204` before
/// the first frame; `GET /status` with a liveness message.
pub fn routes(
    publisher: ReportPublisher,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let publisher_filter = warp::any().map(move || publisher.clone());

    let report_route = warp::path("report")
        .and(warp::path::end())
        .and(warp::get())
        .and(publisher_filter)
        .map(|publisher: ReportPublisher| match publisher.latest() {
            Some(report) => {
                warp::reply::with_status(warp::reply::json(&report), StatusCode::OK)
                    .into_response()
            }
            None => StatusCode::NO_CONTENT.into_response(),
        });

    let status_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "running"})));

    report_route.or(status_route)
}

/// HTTP endpoint serving published reports to presentation clients.
pub struct GuiBridge {
    address: SocketAddr,
    _server: JoinHandle<()>,
}

impl GuiBridge {
    /// Binds `address` and serves on its own thread and runtime. A port that
    /// cannot be bound is reported here rather than on the server thread.
    pub fn spawn(publisher: ReportPublisher, address: SocketAddr) -> anyhow::Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building runtime for the report bridge")?;
        let (address, server) = {
            let _guard = runtime.enter();
            warp::serve(routes(publisher))
                .try_bind_ephemeral(address)
                .with_context(|| format!("binding report bridge to {}", address))?
        };
        let server = thread::Builder::new()
            .name("report-bridge".into())
            .spawn(move || runtime.block_on(server))
            .context("spawning report bridge thread")?;
        log::info!("report bridge listening on http://{}/report", address);
        Ok(Self {
            address,
            _server: server,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}
