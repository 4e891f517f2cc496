pub mod server;
pub mod ws;

pub use server::{AppState, HttpServer};
