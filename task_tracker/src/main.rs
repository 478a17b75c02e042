#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let config = task_tracker::config::Config::from_env()?;
    task_tracker::web::start_web_server(config).await
}
