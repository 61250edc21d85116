pub mod clusterinfo;
pub mod config;
pub mod export;
