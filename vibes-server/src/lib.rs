mod auth;
mod context;
mod errors;
mod gateway;
mod rooms;
mod schemas;
mod serialized;

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use vibes_collab::Collab;

pub use context::*;
pub use errors::*;
pub use gateway::Gateway;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Starts the vibes server and the event pump feeding its sockets
pub async fn run_server(collab: Arc<Collab>, port: u16) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext {
        gateway: Gateway::new(),
        collab,
    };

    gateway::pump_events(context.gateway.clone(), context.collab.events());

    let version_one_router = Router::new()
        .merge(auth::router())
        .merge(rooms::router())
        .merge(gateway::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, root_router.into_make_service()).await
}
