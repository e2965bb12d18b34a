pub mod mqtt;
pub mod pvoutput;
