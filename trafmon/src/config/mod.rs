mod trafmon_config;

pub use trafmon_config::TrafmonConfig;
