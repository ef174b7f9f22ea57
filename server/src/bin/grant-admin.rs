use std::error::Error;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;
use uuid::Uuid;

use directory::auth::Role;
use directory::config::get_variable;
use directory::db::{Db, PgDb};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "grant-admin",
    about = "Grant (or with --revoke, remove) the administrator role for the given accounts"
)]
struct Opt {
    /// Make the accounts plain members again
    #[structopt(long)]
    revoke: bool,

    /// The account IDs to change
    #[structopt(parse(try_from_str = Uuid::parse_str))]
    ids: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("DIRECTORY_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = PgDb::new(pool);

    let role = if opt.revoke {
        Role::Member
    } else {
        Role::Administrator
    };

    for id in &opt.ids {
        let logger = logger.new(log::o!("id" => id.to_string()));
        info!(logger, "Setting role..."; "role" => role.as_str());

        db.set_role(id, role).await?;
    }

    info!(logger, "Done"; "count" => opt.ids.len());

    Ok(())
}
