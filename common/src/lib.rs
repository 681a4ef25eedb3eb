pub mod bench;
pub mod config;
pub mod experiment;
pub mod sweep;
pub mod types;
pub mod util;
pub mod worker;
