use actix_web::{App, HttpServer};
use color_eyre::eyre::{Report, WrapErr};
use dotenv::dotenv;
use livepoll_server::{config::Config, log, server};
use tracing::info;

#[actix_rt::main]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;
    dotenv().ok();
    log::init()?;
    let config = Config::from_env()?;

    info!(bind = config.bind.as_str(), public_url = config.public_url.as_str(), "Starting WS server");

    server::register_system_actors(&config);
    let bind = config.bind.clone();
    HttpServer::new(move || {
        let config = config.clone();
        App::new().configure(move |app| server::configure(app, config))
    })
    .bind(&bind)
    .wrap_err_with(|| format!("binding {}", bind))?
    .run()
    .await
    .wrap_err("running server")
}
