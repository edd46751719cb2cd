//! Hub server binary: configuration, logging, collaborator wiring.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use arhub::runtime::VirtualFactory;
use arhub::services::{
    DescriptorIntrospector, RestBuildService, RestProjectStorage, RestSceneService,
};
use arhub::{Collaborators, Ctx};

#[derive(Parser)]
#[command(name = "arhub-server", version = arhub::version(), about = "Orchestration hub for the robotic-programming platform")]
struct Cli {
    /// Increase verbosity.
    #[arg(short, long)]
    verbose: bool,
    /// Set logging level to debug.
    #[arg(short, long)]
    debug: bool,
    /// Print the protocol version and exit.
    #[arg(long)]
    api_version: bool,
    /// Print the RPC and event catalogue as JSON and exit.
    #[arg(long)]
    openapi: bool,
}

fn init_tracing(cli: &Cli) {
    let default = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();

    if cli.api_version {
        println!("{}", arhub::api_version());
        return;
    }
    if cli.openapi {
        let catalogue = serde_json::json!({
            "rpcRequests": serve::dispatch::supported_rpc_requests(),
            "events": &arhub_data::events::EVENT_NAMES[..],
        });
        println!("{}", serde_json::to_string_pretty(&catalogue).expect("static catalogue"));
        return;
    }

    init_tracing(&cli);

    let settings = match env_config::load_and_apply(None) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&settings.data_path) {
        eprintln!("cannot create data directory: {e}");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("cannot start runtime: {e}");
            std::process::exit(1);
        }
    };

    let exit = runtime.block_on(async move {
        let collaborators = Collaborators {
            storage: Arc::new(RestProjectStorage::new(settings.project_service_url.clone())),
            scene_service: Arc::new(RestSceneService::new(settings.scene_service_url.clone())),
            build_service: Arc::new(RestBuildService::new(settings.build_url.clone())),
            calibration: None,
            introspector: Arc::new(DescriptorIntrospector),
            factory: Arc::new(VirtualFactory),
        };
        let (ctx, background) = Ctx::new(settings, collaborators);
        arhub::context::spawn_background(ctx.clone(), background);

        // wait until the project service becomes available
        loop {
            match ctx
                .object_types
                .refresh(ctx.storage.as_ref(), ctx.introspector.as_ref())
                .await
            {
                Ok(_) => break,
                Err(e) => {
                    tracing::warn!("project service not available yet: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
        tracing::info!("server initialized");

        match serve::run_serve(ctx).await {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("server failed: {e}");
                1
            }
        }
    });
    std::process::exit(exit);
}
