use std::{env, io, sync::Arc};

use colored::Colorize;
use log::{error, info};
use thiserror::Error;
use vibes_collab::{Collab, DatabaseError, Input, PgDatabase, SpotifyCredentials};
use vibes_core::Config;
use vibes_server::{run_server, DEFAULT_PORT};

mod logging;

#[derive(Debug, Error)]
enum VibesError {
    #[error("{0} is not set or invalid")]
    Config(&'static str),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(#[from] io::Error),
}

impl VibesError {
    fn hint(&self) -> String {
        match self {
            VibesError::Config(name) => format!("Set {} in the environment and try again.", name),
            VibesError::Database(_) => "This is a database error. Make sure the PostgreSQL instance behind DATABASE_URL is running and reachable, then try again.".to_string(),
            VibesError::Server(_) => "The server could not listen on its port. Make sure VIBES_SERVER_PORT is free.".to_string(),
        }
    }
}

async fn run() -> Result<(), VibesError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| VibesError::Config("DATABASE_URL"))?;

    let port = match env::var("VIBES_SERVER_PORT") {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| VibesError::Config("VIBES_SERVER_PORT"))?,
        Err(_) => DEFAULT_PORT,
    };

    let spotify = match (env::var("SPOTIFY_CLIENT_ID"), env::var("SPOTIFY_CLIENT_SECRET")) {
        (Ok(client_id), Ok(client_secret)) => Some(SpotifyCredentials {
            client_id,
            client_secret,
        }),
        _ => {
            info!("Spotify credentials are not set, Spotify links will not resolve");
            None
        }
    };

    let config = Config::from_env();

    info!("Connecting to database...");
    let database = Arc::new(PgDatabase::new(&database_url).await?);
    let input = Arc::new(Input::new(spotify));

    let collab = Arc::new(Collab::new(config, database, input));

    info!("Initialized successfully.");
    run_server(collab, port).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not set up logging: {}", e);
    }

    if let Err(error) = run().await {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Vibes failed to start!".bold().red());
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
