pub mod config_cmd;
pub mod load;
pub mod skills;
pub mod stats;
