use dcu_dashboard::AnalysisConfig;
use dcu_dashboard::app;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional arguments: listen address, then a JSON config file
    let args: Vec<String> = env::args().collect();
    let addr = args.get(1).map(String::as_str).unwrap_or("127.0.0.1:3000");

    let config = match args.get(2) {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    println!("Starting DCU dashboard API on {}", addr);
    app::run(addr, config).await
}
