//! User Service - command line access to the user repository.

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain::{UserInput, DEFAULT_PAGE_SIZE};
use user_service_lib::config::UserServiceConfig;
use user_service_lib::UserCommand;

#[derive(Parser)]
#[command(name = "user-service")]
#[command(about = "User data-access service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user (name, dob and address are required)
    Create {
        #[command(flatten)]
        fields: UserFields,
    },
    /// Update the supplied fields of a user
    Update {
        id: String,
        #[command(flatten)]
        fields: UserFields,
    },
    /// Show a user
    Get { id: String },
    /// Delete a user and print it as it was
    Delete { id: String },
    /// List users, optionally by exact name
    List {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
        #[arg(long)]
        cursor: Option<String>,
    },
}

#[derive(Args)]
struct UserFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    dob: Option<String>,
}

impl From<UserFields> for UserInput {
    fn from(fields: UserFields) -> Self {
        UserInput {
            name: fields.name,
            address: fields.address,
            description: fields.description,
            dob: fields.dob,
        }
    }
}

impl From<Commands> for UserCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Create { fields } => UserCommand::Create(fields.into()),
            Commands::Update { id, fields } => UserCommand::Update {
                id,
                input: fields.into(),
            },
            Commands::Get { id } => UserCommand::Get { id },
            Commands::Delete { id } => UserCommand::Delete { id },
            Commands::List {
                query,
                limit,
                cursor,
            } => UserCommand::List {
                query,
                limit,
                cursor,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = UserServiceConfig::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.service.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let repository = user_service_lib::connect_repository(&config).await;
    match user_service_lib::execute(repository.as_ref(), cli.command.into()).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}: {}", err.code(), err.user_message());
            std::process::exit(1);
        }
    }
}
