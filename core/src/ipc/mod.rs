pub mod client;
pub mod command;
pub mod receiver;
pub mod server;
