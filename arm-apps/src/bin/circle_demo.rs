use std::path::PathBuf;

use anyhow::Result;
use arm_apps::{
    utils::{get_apps_config_path, init_tracing_with_file_appender, resolve_circle_demo_config},
    CircleDemoConfig, DemoRobot,
};
use clap::Parser;
use tracing::{debug, info};

/// Moves the arm along a half circle and back to its named pose.
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_BIN_NAME"))]
struct CircleDemoArgs {
    /// Path to the setting file.
    #[arg(short, long, value_parser)]
    config_path: Option<PathBuf>,
    /// Set options from command line. These settings take priority over the
    /// setting file specified by --config-path.
    #[arg(long)]
    config: Option<String>,
    /// Prints the default setting as TOML.
    #[arg(long)]
    show_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing_with_file_appender(env!("CARGO_BIN_NAME"));
    let args = CircleDemoArgs::parse();
    debug!(?args);

    if args.show_default_config {
        print!("{}", toml::to_string(&CircleDemoConfig::default())?);
        return Ok(());
    }

    let config_path = get_apps_config_path(args.config_path);
    let config = resolve_circle_demo_config(config_path.as_deref(), args.config.as_deref())?;

    let mut robot = DemoRobot::new(&config)?;
    let report = robot.run(&config.demo).await;
    robot.shutdown();
    let report = report?;
    info!(
        "finished: executed={} fraction={:.6} attempts={}",
        report.executed, report.fraction, report.attempts
    );
    Ok(())
}
