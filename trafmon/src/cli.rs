use clap::Parser;
use trafmon::TrafmonConfig;

#[derive(Parser, Debug)]
#[command(name = "trafmon")]
#[command(about = "Dante traffic monitor, counts traffic used by different users of a dante proxy server.", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "trafmon.toml")]
    pub config: String,

    /// Override listen address
    #[arg(long, env = "TRAFMON_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Override database URL
    #[arg(long, env = "TRAFMON_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Override flush period in seconds
    #[arg(long)]
    pub write_period: Option<u64>,

    /// Override snapshot file path (empty disables it)
    #[arg(long)]
    pub snapshot_file: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRAFMON_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Override log directory
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl CliArgs {
    pub fn apply(self, cfg: &mut TrafmonConfig) {
        if let Some(listen_addr) = self.listen_addr {
            cfg.listen_addr = listen_addr;
        }
        if let Some(database_url) = self.database_url {
            cfg.database_url = database_url;
        }
        if let Some(write_period) = self.write_period {
            cfg.write_period_secs = write_period;
        }
        if let Some(snapshot_file) = self.snapshot_file {
            cfg.snapshot_file = snapshot_file;
        }
        if let Some(log_level) = self.log_level {
            cfg.log_level = log_level;
        }
        if let Some(log_dir) = self.log_dir {
            cfg.log_dir = Some(log_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let args = CliArgs::parse_from([
            "trafmon",
            "--config",
            "/etc/trafmon.toml",
            "--listen-addr",
            "127.0.0.1:9000",
            "--write-period",
            "10",
            "--snapshot-file",
            "",
        ]);
        assert_eq!(args.config, "/etc/trafmon.toml");

        let mut cfg = TrafmonConfig::new("sqlite::memory:");
        args.apply(&mut cfg);
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.write_period_secs, 10);
        assert_eq!(cfg.snapshot_path(), None);
        assert_eq!(cfg.database_url, "sqlite::memory:");
    }
}
