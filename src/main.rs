use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gravel::apps::bfs::BfsProgram;
use gravel::engine::scheduler::{Engine, EngineConfig};
use gravel::graph::Vid;

const USAGE: &str = "usage: gravel <workspace> <root_id> [num_lc num_cc num_dc num_cores buffer_size]";

fn main() {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cfg, root_id) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("gravel: {msg}\n{USAGE}");
            std::process::exit(1);
        }
    };
    info!(
        target: "gravel",
        workspace = %cfg.workspace.display(),
        root_id,
        lc = cfg.num_lc,
        cc = cfg.num_cc,
        dc = cfg.num_dc,
        cores = cfg.num_cores,
        buffer = cfg.buffer_size,
        "gravel starting"
    );

    let engine = match Engine::new(cfg, Arc::new(BfsProgram::new(root_id))) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("gravel: {e:#}");
            std::process::exit(3);
        }
    };
    match engine.run() {
        Ok(summary) => {
            let _ = engine.show_result(8);
            info!(
                target: "gravel",
                fragments = summary.fragments,
                evals = summary.evals,
                final_epoch = summary.final_epoch,
                "done"
            );
        }
        Err(err) => {
            eprintln!("gravel: {}", err.diagnostic());
            std::process::exit(err.exit_code());
        }
    }
}

fn parse_args(args: &[String]) -> Result<(EngineConfig, Vid), String> {
    if args.len() < 2 {
        return Err("missing <workspace> or <root_id>".into());
    }
    let root_id: Vid =
        args[1].parse().map_err(|_| format!("root_id '{}' is not an integer", args[1]))?;
    let mut cfg = EngineConfig::new(&args[0]);
    cfg.num_lc = width(args, 2, "GRAVEL_LC", cfg.num_lc)?;
    cfg.num_cc = width(args, 3, "GRAVEL_CC", cfg.num_cc)?;
    cfg.num_dc = width(args, 4, "GRAVEL_DC", cfg.num_dc)?;
    cfg.num_cores = width(args, 5, "GRAVEL_CORES", cfg.num_cores)?;
    cfg.buffer_size = width(args, 6, "GRAVEL_BUFFER", cfg.buffer_size)?;
    Ok((cfg, root_id))
}

/// Positional value if given, else `GRAVEL_*` env var, else the default.
fn width(args: &[String], idx: usize, env: &str, default: usize) -> Result<usize, String> {
    if let Some(v) = args.get(idx) {
        return v.parse().map_err(|_| format!("'{v}' is not a valid {env}"));
    }
    match std::env::var(env) {
        Ok(v) => v.parse().map_err(|_| format!("{env}='{v}' is not an integer")),
        Err(_) => Ok(default),
    }
}
