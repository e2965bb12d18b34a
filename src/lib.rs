pub mod argsets;
pub mod command;
pub mod config;
pub mod constants;
pub mod data_mgmt;
pub mod helpers;
pub mod interfaces;
pub mod readers;
