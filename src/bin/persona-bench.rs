#[path = "persona-bench/app.rs"]
mod app;
#[path = "persona-bench/args.rs"]
mod args;
#[path = "persona-bench/logging.rs"]
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
