pub mod cli;
pub mod config;
pub mod data_aquisition;
pub mod logging;
pub mod network;
pub mod topology;
