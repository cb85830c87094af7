mod command_def;
mod command_handler;

pub use command_def::TransactionCommand;
pub use command_handler::handle_transaction_command;
