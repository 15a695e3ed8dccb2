use chronoframe_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under large uploads,
// especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (_state, router) = chronoframe_api::setup::initialize_app(config.clone()).await?;

    chronoframe_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
