use std::fs::OpenOptions;
use std::path::PathBuf;
use wavedeck::app::LaunchOptions;

#[derive(Debug, Default)]
struct CliArgs {
    paths: Vec<PathBuf>,
    playlist: Option<PathBuf>,
    null_audio: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    init_logging();

    wavedeck::app::run(LaunchOptions {
        paths: args.paths,
        playlist: args.playlist,
        null_audio: args.null_audio,
    })
}

// The terminal is in alternate-screen mode, so log lines go to a file.
fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    let file = wavedeck::config::log_path().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(anyhow::Error::from)
    });
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--null-audio" => out.null_audio = true,
            "--playlist" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--playlist requires a file path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--playlist cannot be empty");
                }
                out.playlist = Some(PathBuf::from(value));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            path => out.paths.push(PathBuf::from(path)),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("wavedeck [OPTIONS] [PATH...]");
    println!("  PATH                Media file or folder to enqueue");
    println!("  --playlist FILE     Load a JSON playlist before enqueuing paths");
    println!("  --null-audio        Run without an audio device");
    println!();
    println!("Logs go to $WAVEDECK_CONFIG_DIR/wavedeck.log (RUST_LOG sets the level)");
}
