mod error;
mod proxy;
mod server;
mod telemetry;

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracelens_core::config::Config;

use crate::telemetry::{LogFormat, init_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "tracelens")]
#[command(about = "Trace exploration backend: flame graphs, trace search, metrics and logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve(ServeArgs),
    #[command(about = "Print the effective configuration and exit")]
    Config(ServeArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[arg(long)]
    http_addr: Option<String>,
    #[arg(long)]
    ch_url: Option<String>,
    #[arg(long)]
    ch_database: Option<String>,
    #[arg(long)]
    prom_url: Option<String>,
    #[arg(long)]
    vlogs_url: Option<String>,
    #[arg(long, value_parser = humantime::parse_duration)]
    upstream_timeout: Option<Duration>,
}

impl ServeArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(v) = self.http_addr {
            cfg.http_addr = v;
        }
        if let Some(v) = self.ch_url {
            cfg.ch_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.ch_database {
            cfg.ch_database = v;
        }
        if let Some(v) = self.prom_url {
            cfg.prom_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.vlogs_url {
            cfg.vlogs_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.upstream_timeout {
            cfg.upstream_timeout = v;
        }
    }
}

fn load_config(args: ServeArgs) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("load config")?;
    args.apply(&mut cfg);
    cfg.validate().context("validate config")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            init_tracing(LogFormat::from_env());
            let cfg = load_config(args)?;
            let result = server::serve(cfg).await;
            if let Err(err) = &result {
                tracing::error!(error = ?err, "server stopped");
            }
            shutdown_tracing();
            result
        }
        Commands::Config(args) => {
            let mut cfg = load_config(args)?;
            if cfg.ch_password.is_some() {
                cfg.ch_password = Some("***".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tracelens",
            "serve",
            "--http-addr",
            ":9000",
            "--ch-url",
            "http://ch:8123/",
            "--ch-database",
            "otel",
            "--upstream-timeout",
            "5s",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let mut cfg = Config::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.http_addr, ":9000");
        assert_eq!(cfg.ch_url, "http://ch:8123");
        assert_eq!(cfg.ch_database, "otel");
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(5));
        assert_eq!(cfg.prom_url, Config::default().prom_url);
    }

    #[test]
    fn rejects_bad_timeout_flag() {
        assert!(Cli::try_parse_from(["tracelens", "serve", "--upstream-timeout", "soon"]).is_err());
    }
}
