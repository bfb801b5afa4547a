pub mod assistant;
pub mod commentary;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod game;
pub mod genai;
pub mod http_client;
pub mod logging;
pub mod plays;
pub mod provider;
pub mod scheduler;
pub mod speech;
pub mod state;
