pub mod compare;
pub mod config;
pub mod ingest;
pub mod output;
pub mod provider;
pub mod state;
pub mod tfstate;
