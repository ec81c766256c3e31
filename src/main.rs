use noaa_alert_relay::bootstrap::run_bootstrap;
use noaa_alert_relay::utils::error::RelayResult;

#[tokio::main]
async fn main() -> RelayResult<()> {
    run_bootstrap().await
}
