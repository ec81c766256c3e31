mod setup;

use crate::adapters::stream::memory_stream::MemoryBroker;
use crate::config::Config;
use crate::utils::error::RelayResult;
use crate::utils::logger;
use crate::utils::signals::cancel_on_shutdown_signal;
use clap::{Parser, Subcommand};
use futures_util::future::join;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay NOAA weather alerts through an event stream")]
pub struct BootstrapArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the publisher daemon that polls the weather service for active alerts
    Publish,
    /// Subscribe to the alerts topic and log every headline
    Subscribe,
    /// Fetch the active alerts once and print their headlines
    Alerts {
        #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },
    /// Print the effective configuration with secrets masked
    Config,
    /// Print the topics of the event stream with their event counts as JSON
    Info,
    /// Run publisher and subscriber together on an in-process stream
    Relay,
}

pub async fn run_bootstrap() -> RelayResult<()> {
    let args = BootstrapArgs::parse();

    let config = match Config::new(args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };
    logger::init(&config.log_config());

    let result = run_command(args.command, config).await;
    if let Err(e) = &result {
        error!(error = %e, "noaa-alert-relay failed");
    }
    result
}

pub async fn run_command(command: Command, config: Config) -> RelayResult<()> {
    match command {
        Command::Publish => {
            config.validate()?;
            let broker = setup::private_broker(&config, "publisher").await?;
            let source = setup::setup_weather_source(&config)?;
            setup::setup_publisher(&config, source, &broker)?.run().await
        }
        Command::Subscribe => {
            config.validate()?;
            let broker = setup::private_broker(&config, "subscriber").await?;
            setup::setup_subscriber(&config, &broker)?
                .run(setup::log_headline)
                .await
        }
        Command::Alerts { timeout } => {
            let source = setup::setup_weather_source(&config)?;
            for alert in source.fetch_active_alerts(timeout).await? {
                if let Ok(headline) = alert.headline() {
                    println!("{headline}");
                }
            }
            Ok(())
        }
        Command::Config => {
            for (key, value) in config.summary() {
                println!("{key:<24}{value}");
            }
            Ok(())
        }
        Command::Info => {
            config.validate()?;
            let broker = MemoryBroker::default();
            setup::prepare_topic(&config, &broker).await?;
            let info = setup::project_info(&config, &broker).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Command::Relay => {
            config.validate()?;
            run_relay(&config).await
        }
    }
}

/// Runs a publisher and a subscriber against one in-process broker until a termination signal.
///
/// The topic is created up front. When either side stops, the other is cancelled too.
pub async fn run_relay(config: &Config) -> RelayResult<()> {
    let broker = MemoryBroker::default();
    let topic_id = setup::prepare_topic(config, &broker).await?;
    info!(topic = %config.topic, topic_id = %topic_id, "Relay topic ready");

    let source = setup::setup_weather_source(config)?;
    let publisher = setup::setup_publisher(config, source, &broker)?;
    let subscriber = setup::setup_subscriber(config, &broker)?;

    let cancel_token = CancellationToken::new();
    let watcher = cancel_on_shutdown_signal(cancel_token.clone());

    let publishing = async {
        let result = publisher.run_until(cancel_token.clone()).await;
        cancel_token.cancel();
        result
    };
    let subscribing = async {
        let result = subscriber
            .run_until(setup::log_headline, cancel_token.clone())
            .await;
        cancel_token.cancel();
        result
    };
    let (published, subscribed) = join(publishing, subscribing).await;

    if let Err(e) = watcher.await {
        warn!("Signal watcher failed: {e}");
    }
    match setup::project_info(config, &broker).await {
        Ok(info) => info!(topics = info.num_topics, events = info.events, "Relay stopped"),
        Err(e) => warn!(error = %e, "could not read event stream info"),
    }
    published.and(subscribed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnsignConfig;
    use crate::utils::logger::capture::CapturedLogs;

    #[test]
    fn test_parse_commands() {
        let args = BootstrapArgs::parse_from(["noaa-alert-relay", "-c", "relay.toml", "publish"]);
        assert_eq!(args.config, Some(PathBuf::from("relay.toml")));
        assert_eq!(args.command, Command::Publish);

        let args = BootstrapArgs::parse_from(["noaa-alert-relay", "alerts", "--timeout", "3s"]);
        assert_eq!(
            args.command,
            Command::Alerts {
                timeout: Duration::from_secs(3)
            }
        );

        let args = BootstrapArgs::parse_from(["noaa-alert-relay", "info"]);
        assert_eq!(args.command, Command::Info);

        let args = BootstrapArgs::parse_from(["noaa-alert-relay", "alerts"]);
        assert_eq!(
            args.command,
            Command::Alerts {
                timeout: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn test_command_is_required() {
        assert!(BootstrapArgs::try_parse_from(["noaa-alert-relay"]).is_err());
    }

    #[tokio::test]
    async fn test_publish_requires_credentials() {
        let err = run_command(Command::Publish, Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("client_secret are required"));
    }

    fn valid_config() -> Config {
        Config {
            ensign: EnsignConfig {
                client_id: "client".into(),
                client_secret: "secret".into(),
                endpoint: None,
                auth_url: None,
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_subscribe_reaches_receive_loop() {
        let (logs, _guard) = CapturedLogs::install();

        let running = tokio::time::timeout(
            Duration::from_millis(200),
            run_command(Command::Subscribe, valid_config()),
        )
        .await;

        assert!(running.is_err(), "subscribe stopped early: {running:?}");
        assert_eq!(logs.lines_with_message("Subscribed to alerts").len(), 1);
        assert_eq!(logs.lines_with_message("Event listener started").len(), 1);
        let private = logs.contents();
        assert!(private.contains("private in-process event stream"));
        assert!(private.contains(r#""role":"subscriber""#));
    }

    #[tokio::test]
    async fn test_publish_keeps_running_on_private_stream() {
        let (logs, _guard) = CapturedLogs::install();

        let running = tokio::time::timeout(
            Duration::from_millis(200),
            run_command(Command::Publish, valid_config()),
        )
        .await;

        assert!(running.is_err(), "publish stopped early: {running:?}");
        assert_eq!(logs.lines_with_message("Publisher started").len(), 1);
        assert!(logs.contents().contains(r#""role":"publisher""#));
    }

    #[tokio::test]
    async fn test_info_command_runs_with_credentials() {
        assert!(run_command(Command::Info, valid_config()).await.is_ok());
        assert!(run_command(Command::Info, Config::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_project_info_counts_prepared_topic() {
        let config = valid_config();
        let broker = MemoryBroker::default();
        let topic_id = setup::prepare_topic(&config, &broker).await.unwrap();

        let info = setup::project_info(&config, &broker).await.unwrap();

        assert_eq!(info.num_topics, 1);
        assert_eq!(info.events, 0);
        assert_eq!(info.topics[0].topic_id, topic_id);
        assert_eq!(info.topics[0].name, config.topic);
    }

    #[tokio::test]
    async fn test_config_command_needs_no_credentials() {
        assert!(run_command(Command::Config, Config::default()).await.is_ok());
    }
}
