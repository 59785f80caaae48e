pub mod balance_writer;
pub mod command;
pub mod command_reader;
pub mod replay;
