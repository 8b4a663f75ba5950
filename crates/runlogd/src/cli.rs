//! CLI argument definitions

use clap::Parser;
use runlog_core::{NotifierBackend, Result, ServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runlogd")]
#[command(version, about = "Per-run append-only logs with live tail over HTTP")]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "RUNLOG_HOST")]
    pub host: Option<String>,

    /// Directory holding one log file per run
    #[arg(long, env = "RUNLOG_DIR")]
    pub logs_dir: Option<PathBuf>,

    /// Route prefix, as in /<prefix>/{run_id}
    #[arg(long, env = "RUNLOG_PREFIX")]
    pub prefix: Option<String>,

    /// Poll for changes every MS milliseconds instead of using native file events
    #[arg(long, value_name = "MS")]
    pub poll: Option<u64>,

    /// TOML config file; flags and environment override its values
    #[arg(short, long, env = "RUNLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the effective server config: defaults, then file, then flags/env
    pub fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(dir) = &self.logs_dir {
            config.logs_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.route_prefix = prefix.trim_matches('/').to_string();
        }
        if let Some(interval_ms) = self.poll {
            config.notifier = NotifierBackend::Poll { interval_ms };
        }

        config.validate()?;
        Ok(config)
    }

    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> String {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        ["runlogd", "runlog_web", "runlog_logs", "runlog_watch", "tower_http"]
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("runlogd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--port", "9100", "--logs-dir", "/tmp/runs", "--prefix", "/runs/", "--poll", "50",
        ]);
        let config = cli.server_config().unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.logs_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.route_prefix, "runs");
        assert_eq!(config.notifier, NotifierBackend::Poll { interval_ms: 50 });
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(b"port = 7000\nroute_prefix = \"from_file\"\n")
            .unwrap();

        let path = file.path().to_str().unwrap();
        let cli = parse(&["--config", path, "--port", "7001"]);
        let config = cli.server_config().unwrap();

        assert_eq!(config.port, 7001);
        assert_eq!(config.route_prefix, "from_file");
    }

    #[test]
    fn test_zero_poll_rejected() {
        let cli = parse(&["--poll", "0", "--port", "1"]);
        assert!(cli.server_config().is_err());
    }

    #[test]
    fn test_log_filter_verbosity() {
        assert!(parse(&[]).log_filter().contains("runlog_logs=info"));
        assert!(parse(&["-v"]).log_filter().contains("runlog_watch=debug"));
        assert!(parse(&["-vvv"]).log_filter().contains("runlogd=trace"));
    }
}
