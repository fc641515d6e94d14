use std::sync::Arc;
use std::time::Duration;

use api::HttpTransport;
use config::Config;
use db::{get_db_pool, PgSessionStore};
use error::AppError;
use handlers::{on_callback_query, on_message, AppState};
use log::{error, info, warn};
use services::Services;
use session::{MemorySessionStore, SessionStore, Sessions};
use teloxide::{dispatching::UpdateFilterExt, prelude::*, types::CallbackQuery};
mod api;
mod config;
mod db;
mod error;
mod handlers;
mod lifecycle;
mod models;
mod services;
mod session;

extern crate pretty_env_logger;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    if let Err(err) = run().await {
        error!("Bot stopped: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::load()?;
    info!("Using API at {}", config.api_base_url);

    let store: Arc<dyn SessionStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgSessionStore::new(get_db_pool(url).await?)),
        None => {
            warn!("DATABASE_URL is not set, sessions will not survive a restart");
            Arc::new(MemorySessionStore::default())
        }
    };
    let sessions = Sessions::new(store, time::Duration::hours(config.session_ttl_hours));

    let transport = HttpTransport::new(
        config.api_base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let services = Services::new(Arc::new(transport), config.api_base_url.clone());
    let state = AppState::new(services, sessions);

    let bot = Bot::from_env();

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = state.clone();

            move |bot: Bot, msg: Message| {
                let state = state.clone();

                async move {
                    on_message(bot, msg, state).await;
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();

            move |q: CallbackQuery, bot: Bot| {
                let state = state.clone();

                async move {
                    on_callback_query(bot, q, state).await;
                    respond(())
                }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}
