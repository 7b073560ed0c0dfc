use medtriage_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    medtriage_lib::init_tracing();

    if let Err(e) = medtriage_lib::run(AppConfig::from_env()).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
