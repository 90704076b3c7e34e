use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use magpie_config::{ConfigurationRecord, Format, ProfileSet, DEFAULT_PROFILE};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magpie", version, about = "magpie experiment configuration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    #[value(name = "js")]
    Js,
    #[value(name = "json")]
    Json,
    #[value(name = "yaml")]
    Yaml,
}

impl From<FormatArg> for Format {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Js => Format::Js,
            FormatArg::Json => Format::Json,
            FormatArg::Yaml => Format::Yaml,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Profiles {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Show {
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "set")]
        set_values: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    Validate {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    Render {
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "set")]
        set_values: Vec<String>,
        #[arg(long, value_enum, default_value_t = FormatArg::Js)]
        format: FormatArg,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Init {
        #[arg(long, default_value = "magpie.profiles.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Profiles { file, json } => {
            let set = load_profile_set(file.as_deref())?;
            if json {
                let profiles: Vec<Value> = set
                    .iter()
                    .map(|(name, record)| {
                        json!({
                            "name": name,
                            "experiment_id": record.experiment_id(),
                            "mode": record.mode().as_str(),
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "profiles",
                    "profiles": profiles
                })));
            }
            for (name, record) in set.iter() {
                println!(
                    "{}: experiment={} mode={}",
                    name,
                    record.experiment_id(),
                    record.mode()
                );
            }
        }
        Commands::Show {
            profile,
            file,
            set_values,
            json,
        } => {
            let record = magpie_config::resolve_record(&profile, file.as_deref(), &set_values)?;
            let digest = record.digest()?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "show",
                    "profile": profile,
                    "record": serde_json::to_value(&record)?,
                    "digest": digest,
                    "socket_shares_server_host": record.socket_shares_server_host()
                })));
            }
            println!("profile: {}", profile);
            print_record(&record);
            println!("digest: {}", digest);
        }
        Commands::Validate { path, json } => {
            let (kind, count) = validate_path(&path)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "validate",
                    "valid": true,
                    "kind": kind,
                    "records": count,
                    "path": path.display().to_string()
                })));
            }
            println!("ok");
        }
        Commands::Render {
            profile,
            file,
            set_values,
            format,
            out,
            json,
        } => {
            let record = magpie_config::resolve_record(&profile, file.as_deref(), &set_values)?;
            let format: Format = format.into();
            let rendered = match &out {
                Some(out_path) => {
                    magpie_config::write_record(&record, format, out_path)?;
                    None
                }
                None => Some(magpie_config::render(&record, format)?),
            };
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "render",
                    "profile": profile,
                    "format": format.as_str(),
                    "out": out.as_ref().map(|p| p.display().to_string()),
                    "rendered": rendered,
                    "digest": record.digest()?
                })));
            }
            match (&out, rendered) {
                (Some(out_path), _) => println!("wrote: {}", out_path.display()),
                (None, Some(text)) => print!("{}", text),
                (None, None) => {}
            }
        }
        Commands::Init { path, force, json } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "init file already exists (use --force): {}",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let set = ProfileSet::builtin();
            std::fs::write(&path, set.to_yaml()?)
                .with_context(|| format!("failed to write profiles to {}", path.display()))?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "init",
                    "path": path.display().to_string(),
                    "profiles": set.names()
                })));
            }
            println!("wrote: {}", path.display());
            println!("next: edit the profiles, then run magpie validate {}", path.display());
            println!(
                "next: magpie render --file {} --profile direct-link --out magpie.config.js",
                path.display()
            );
        }
    }
    Ok(None)
}

fn load_profile_set(file: Option<&Path>) -> Result<ProfileSet> {
    let set = ProfileSet::builtin();
    match file {
        Some(path) => Ok(set.merge(ProfileSet::load(path)?)),
        None => Ok(set),
    }
}

/// Accepts a single record (`.js`, `.json`, `.yaml`) or a profile set.
fn validate_path(path: &Path) -> Result<(&'static str, usize)> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let origin = path.display().to_string();
    if format == Format::Js {
        magpie_config::from_js_module(&text)
            .with_context(|| format!("failed to load config from {}", origin))?;
        return Ok(("record", 1));
    }
    let document = magpie_config::render::document_from_text(&text, format)
        .with_context(|| format!("failed to parse {}", origin))?;
    if document.get("profiles").is_some() {
        let set = ProfileSet::from_document(document, &origin)?;
        return Ok(("profiles", set.len()));
    }
    magpie_config::render::record_from_document(document, &origin)?;
    Ok(("record", 1))
}

fn print_record(record: &ConfigurationRecord) {
    println!("experimentId: {}", record.experiment_id());
    println!("serverUrl: {}", record.server_url());
    println!("socketUrl: {}", record.socket_url());
    println!("completionUrl: {}", record.completion_url());
    println!("contactEmail: {}", record.contact_email());
    println!("mode: {}", record.mode());
    println!("language: {}", record.language());
    println!("stimuli.main: {}", record.stimuli_main());
    if !record.socket_shares_server_host() {
        println!("note: socketUrl host differs from serverUrl host");
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Profiles { json, .. }
        | Commands::Show { json, .. }
        | Commands::Validate { json, .. }
        | Commands::Render { json, .. }
        | Commands::Init { json, .. } => *json,
    }
}
