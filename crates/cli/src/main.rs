use clap::{Parser, Subcommand};
use gateway_core::config::{default_target_model, default_tier};

mod commands;
use commands::{organic_request, register_user, utils::print_error};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Gateway CLI - caller and admin tooling for the validator gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gateway base URL
    #[arg(long, env = "API_URL", default_value = "http://localhost:8000", global = true)]
    api_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new caller API key (admin only)
    RegisterUser {
        /// The new caller API key
        #[arg(long)]
        api_key: String,

        /// Admin credential
        #[arg(long, env = "ADMIN_API_KEY", hide_env_values = true)]
        admin_api_key: String,
    },

    /// Send one organic request
    OrganicRequest {
        /// Caller API key
        #[arg(long, env = "USER_API_KEY", hide_env_values = true)]
        api_key: String,

        #[arg(long)]
        context: String,

        #[arg(long, default_value_t = default_tier())]
        tier: String,

        #[arg(long, default_value_t = default_target_model())]
        target_model: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::RegisterUser { api_key, admin_api_key } => {
            register_user(&cli.api_url, &admin_api_key, &api_key).await
        }
        Commands::OrganicRequest { api_key, context, tier, target_model } => {
            organic_request(&cli.api_url, &api_key, context, tier, target_model).await
        }
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
