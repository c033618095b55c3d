mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ctrhook")]
#[command(about = "Run runtime-managed containers as init-system services")]
struct Args {
    /// Config file (default: /etc/ctrhook/ctrhook.conf)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Init-system hook proxies for containers
    #[command(hide = true)]
    Systemd {
        #[command(subcommand)]
        hook: Hook,
    },
}

#[derive(Subcommand)]
enum Hook {
    /// ExecStartPre: prepare the host and remove any stale task
    ExecStartPre {
        /// Container ID
        id: Option<String>,
    },

    /// ExecStart: run and supervise the container's task
    ExecStart {
        /// Container ID
        id: Option<String>,
    },

    /// ExecStartPost: remove the task and mark the service down
    ExecStartPost {
        /// Container ID
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config.as_deref();

    let result = match args.command {
        Command::Systemd { hook } => match hook {
            Hook::ExecStartPre { id } => commands::exec_start_pre(config, id.as_deref())
                .await
                .map(|()| 0),
            Hook::ExecStart { id } => commands::exec_start(config, id.as_deref()).await,
            Hook::ExecStartPost { id } => commands::exec_start_post(config, id.as_deref())
                .await
                .map(|()| 0),
        },
    };

    match result {
        // The task's own status, truncated the way the kernel would
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
