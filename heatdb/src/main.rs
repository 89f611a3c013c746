use clap::Parser;
use heatdb::{
    Config, Gateway,
    config::{Args, Command},
    db::handlers::{ListFilter, Stacks},
    db::models::record::Record,
    errors::Error,
    telemetry,
};

async fn run(args: &Args, config: Config) -> Result<(), Error> {
    let gateway = Gateway::connect(&config.database).await?;

    match args.command.unwrap_or(Command::Sync) {
        Command::Sync => {}
        Command::Stacks => {
            let mut conn = gateway.pool().acquire().await.map_err(heatdb::db::errors::DbError::from)?;
            let stacks = Stacks::new(&mut conn)
                .list_with_resource_counts(&ListFilter::new(0, i64::MAX))
                .await?;

            for stack in &stacks {
                let line = serde_json::to_string(&stack.fields_with_extra()).map_err(anyhow::Error::from)?;
                println!("{line}");
            }
            tracing::info!(count = stacks.len(), "Listed stacks");
        }
    }

    gateway.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            let e = Error::from(e);
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.log_format)?;

    tracing::debug!("{:?}", args);

    if let Err(e) = run(&args, config).await {
        tracing::error!(error = %e, "heatdb failed");
        std::process::exit(e.exit_code());
    }
    Ok(())
}
