pub mod cluster;
pub mod config;
pub mod domain;
pub mod error;
pub mod genbank;
pub mod ncbi;
pub mod output;
pub mod pipeline;
pub mod plot;
