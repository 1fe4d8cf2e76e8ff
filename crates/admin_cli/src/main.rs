use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{ClientKind, Engine};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

/// Actor recorded in the audit log for changes made from this tool.
const ADMIN_ACTOR: &str = "admin_cli";

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "autoloc_admin")]
#[command(about = "Admin utilities for the rental agency (agents, fleet, clients, ledger)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./autoloc.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Agents allowed on the internal API.
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Vehicle(VehicleCommand),
    #[command(subcommand)]
    Client(ClientCommand),
    /// Recompute cached payment totals from the ledger.
    Reconcile(ReconcileArgs),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Subcommand, Debug)]
enum VehicleCommand {
    Create(VehicleCreateArgs),
    List,
    /// Take a vehicle out of service or put it back.
    Maintenance(MaintenanceArgs),
}

#[derive(Args, Debug)]
struct VehicleCreateArgs {
    #[arg(long)]
    make: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    plate: String,
}

#[derive(Args, Debug)]
struct MaintenanceArgs {
    #[arg(long)]
    id: Uuid,
    /// Put the vehicle back in service instead.
    #[arg(long)]
    done: bool,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    Create(ClientCreateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Individual,
    Company,
}

#[derive(Args, Debug)]
struct ClientCreateArgs {
    #[arg(long, value_enum, default_value = "individual")]
    kind: KindArg,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    phone: String,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    /// Only this reservation.
    #[arg(long)]
    reservation: Option<Uuid>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn print_line(message: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(message),
        Print("\r\n")
    )?;
    Ok(())
}

/// Reads a line without echoing it, printing `*` per character.
fn prompt_secret(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                break;
            }
            KeyCode::Backspace if buf.pop().is_some() => {
                execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
            }
            _ => {}
        }
        out.flush()?;
    }

    Ok(buf)
}

fn prompt_new_password() -> Result<String, Box<dyn Error + Send + Sync>> {
    for _ in 0..3 {
        let first = prompt_secret("Password: ")?;
        if first.is_empty() {
            print_line("Password must not be empty.")?;
            continue;
        }
        if prompt_secret("Confirm password: ")? == first {
            return Ok(first);
        }
        print_line("Passwords do not match. Try again.")?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn create_user(
    db: &DatabaseConnection,
    args: UserCreateArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if users::Entity::find_by_id(args.username.clone())
        .one(db)
        .await?
        .is_some()
    {
        return Err(format!("user already exists: {}", args.username).into());
    }
    let password = prompt_new_password()?;

    let user = users::ActiveModel {
        username: Set(args.username.clone()),
        password: Set(password),
    };
    users::Entity::insert(user).exec(db).await?;

    println!("created user: {}", args.username);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    if let Command::User(UserCommand::Create(args)) = cli.command {
        return create_user(&db, args).await;
    }

    let engine = Engine::builder().database(db).build().await?;
    match cli.command {
        Command::User(_) => {}
        Command::Vehicle(VehicleCommand::Create(args)) => {
            let vehicle = engine
                .new_vehicle(&args.make, &args.model, &args.plate, ADMIN_ACTOR)
                .await?;
            println!("created vehicle: {} {} ({})", vehicle.label(), vehicle.plate, vehicle.id);
        }
        Command::Vehicle(VehicleCommand::List) => {
            for vehicle in engine.vehicles().await? {
                println!(
                    "{}  {:<12} {:<15} {}",
                    vehicle.id,
                    vehicle.plate,
                    vehicle.status.as_str(),
                    vehicle.label()
                );
            }
        }
        Command::Vehicle(VehicleCommand::Maintenance(args)) => {
            let vehicle = engine
                .set_vehicle_maintenance(args.id, !args.done, ADMIN_ACTOR)
                .await?;
            println!("vehicle {} is now {}", vehicle.plate, vehicle.status.as_str());
        }
        Command::Client(ClientCommand::Create(args)) => {
            let kind = match args.kind {
                KindArg::Individual => ClientKind::Individual,
                KindArg::Company => ClientKind::Company,
            };
            let client = engine
                .new_client(
                    kind,
                    args.first_name.as_deref(),
                    &args.last_name,
                    &args.phone,
                    ADMIN_ACTOR,
                )
                .await?;
            println!("created client: {} ({})", client.full_name(), client.id);
        }
        Command::Reconcile(args) => {
            let report = match args.reservation {
                Some(id) => engine.reconcile_ledger_caches(id).await?,
                None => engine.reconcile_all_ledger_caches().await?,
            };
            println!(
                "checked {} records, corrected {} reservations and {} rentals",
                report.checked,
                report.corrected_reservations.len(),
                report.corrected_rentals.len()
            );
            for rental_id in &report.drifted_totals {
                println!("rental {rental_id}: amount due rebuilt from its start estimate and extensions");
            }
        }
    }

    Ok(())
}
