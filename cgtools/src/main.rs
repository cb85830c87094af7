use clap::{Parser, Subcommand};

mod callback;
mod transaction;

use crate::{
    callback::{handle_callback_command, CallbackCommand},
    transaction::{handle_transaction_command, TransactionCommand},
};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Command line access to the CardGate payment gateway")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, inspect, refund or recur transactions. Credentials are read from the CG_* environment variables.
    #[command(subcommand)]
    Transaction(TransactionCommand),
    /// Check callbacks that the gateway sent to your site
    #[command(subcommand)]
    Callback(CallbackCommand),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    match cli.command {
        Command::Transaction(command) => handle_transaction_command(command).await,
        Command::Callback(command) => handle_callback_command(command),
    }
}
