use std::sync::Arc;

use clap::Parser;

use judged::config::CliArgs;
use judged::pipeline::JudgeContext;
use judged::sandbox::DockerRuntime;
use judged::scheduler::Scheduler;
use judged::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().expect("Failed to load configuration");

    let runtime = DockerRuntime::connect().expect("Failed to connect to the sandbox runtime");
    let ctx = Arc::new(JudgeContext {
        runtime: Arc::new(runtime),
        host_tmp: config.judge.host_tmp.clone(),
        runtime_tmp: config.judge.sandbox_tmp(),
    });

    // ======= PREPARATION END, EXECUTION START =======

    let scheduler = Scheduler::new(ctx, &config.judge);
    let scheduler_task = scheduler.run();

    let server =
        build_server(config.server, Arc::clone(&scheduler)).expect("Failed to build server");
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    // 1. Shutdown actix-web server gracefully
    server_handle.stop(true).await;

    // 2. Stop the scheduler loop; in-flight workers are fire-and-forget
    scheduler.stop();
    if let Err(e) = scheduler_task.await {
        log::error!("Scheduler task finished with error: {e:?}");
    }

    log::info!("Shutdown complete");
    Ok(())
}
