mod command_def;
mod command_handler;

pub use command_def::CallbackCommand;
pub use command_handler::handle_callback_command;
