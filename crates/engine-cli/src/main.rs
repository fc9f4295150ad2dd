use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use contracts::EngineConfig;
use engine_api::{serve, EngineApi};
use engine_core::terrain;

fn print_usage() {
    println!("shardfall <command>");
    println!("commands:");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
    println!("    sqlite path falls back to SHARDFALL_SQLITE_PATH, else in-memory");
    println!("  schemas");
    println!("    print the intent catalog as JSON");
    println!("  sanitize <intent> <json>");
    println!("    run one payload through the sanitizer");
    println!("  terrain-stats <terrain-string>");
    println!("    decode a terrain string and print its tile census");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn sqlite_path(value: Option<&String>) -> Option<String> {
    value
        .map(String::to_string)
        .or_else(|| env::var("SHARDFALL_SQLITE_PATH").ok())
        .filter(|path| !path.trim().is_empty())
}

fn build_api(sqlite: Option<&str>) -> Result<EngineApi, String> {
    match sqlite {
        Some(path) => EngineApi::with_sqlite(PathBuf::from(path), EngineConfig::default())
            .map_err(|err| format!("failed to open sqlite store: {err}")),
        None => Ok(EngineApi::in_memory(EngineConfig::default())),
    }
}

fn print_schemas() -> Result<(), String> {
    let api = EngineApi::in_memory(EngineConfig::default());
    let rendered = serde_json::to_string_pretty(&api.schemas())
        .map_err(|err| format!("failed to render schemas: {err}"))?;
    println!("{rendered}");
    Ok(())
}

fn run_sanitize(args: &[String]) -> Result<(), String> {
    let name = args.get(2).ok_or_else(|| "missing intent".to_string())?;
    let raw = args.get(3).ok_or_else(|| "missing json".to_string())?;
    let payload: serde_json::Value =
        serde_json::from_str(raw).map_err(|err| format!("invalid json: {err}"))?;

    let api = EngineApi::in_memory(EngineConfig::default());
    match api.sanitize_preview(name, &payload, false) {
        contracts::Decision::Accepted { value } => {
            let rendered = serde_json::to_string_pretty(&value)
                .map_err(|err| format!("failed to render record: {err}"))?;
            println!("{rendered}");
        }
        contracts::Decision::Rejected { reason } => {
            println!("rejected: {reason}");
        }
    }
    Ok(())
}

fn run_terrain_stats(args: &[String]) -> Result<(), String> {
    let encoded = args
        .get(2)
        .ok_or_else(|| "missing terrain-string".to_string())?;
    let counts = terrain::counts(encoded).map_err(|err| format!("invalid terrain: {err}"))?;

    println!(
        "tiles={} plain={} swamp={} wall={}",
        counts.plain + counts.swamp + counts.wall,
        counts.plain,
        counts.swamp,
        counts.wall
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("serve") => {
            let addr = match parse_socket_addr(args.get(2)) {
                Ok(addr) => addr,
                Err(err) => {
                    eprintln!("error: {err}");
                    print_usage();
                    std::process::exit(2);
                }
            };
            let sqlite = sqlite_path(args.get(3));
            let api = match build_api(sqlite.as_deref()) {
                Ok(api) => api,
                Err(err) => {
                    eprintln!("error: {err}");
                    std::process::exit(1);
                }
            };

            match sqlite.as_deref() {
                Some(path) => println!("serving api on http://{addr} (sqlite: {path})"),
                None => println!("serving api on http://{addr} (in-memory)"),
            }
            if let Err(err) = serve(addr, api).await {
                eprintln!("server error: {err}");
                std::process::exit(1);
            }
        }
        Some("schemas") => {
            if let Err(err) = print_schemas() {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
        Some("sanitize") => {
            if let Err(err) = run_sanitize(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("terrain-stats") => {
            if let Err(err) = run_terrain_stats(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }
}
