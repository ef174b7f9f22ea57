use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{info, initialize_logger};
use tokio::sync::mpsc;
use warp::Filter;

use directory::auth::PgAuth;
use directory::config::{get_variable, get_variable_or};
use directory::db::PgDb;
use directory::environment::{Config, Environment};
use directory::routes;
use directory::store::S3Store;
use directory::urls::Urls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("DIRECTORY_PORT").parse()?;
    let admin_port: u16 = get_variable("DIRECTORY_ADMIN_PORT").parse()?;

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let client = S3Store::client_from_env()?;
    let media = Arc::new(S3Store::from_env(client.clone(), "S3_MEDIA_BUCKET"));
    let uploads = Arc::new(S3Store::from_env(client, "S3_UPLOADS_BUCKET"));

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("DIRECTORY_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = Arc::new(PgDb::new(pool.clone()));
    let auth = Arc::new(PgAuth::new(pool));

    let urls = Arc::new(Urls::new(
        get_variable("DIRECTORY_BASE_URL"),
        get_variable_or("DIRECTORY_API_PATH", "api"),
    ));

    let environment = Environment::new(
        logger.clone(),
        db,
        auth,
        urls,
        media,
        uploads,
        Config::default(),
    );

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: routes::admin::TerminationFunctionWrapper<'static> = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown has started
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::make_api(environment.clone());

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
