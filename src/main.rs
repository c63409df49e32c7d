use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use promptsmith::config::{ApiType, ConfigStore, DEFAULT_CONFIG_FILE};
use promptsmith::presets::{PresetManager, DEFAULT_PRESETS_DIR};
use promptsmith::{ExampleSet, Session, SettingsUpdate};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Command-line arguments for promptsmith
#[derive(Parser, Debug)]
#[command(
    name = "promptsmith",
    about = "Generate new text prompts from examples with a local LLM",
    long_about = "Sends example prompts, a topic and a system prompt preset to a locally \
                  running Ollama or OpenAI-compatible server and appends the generated \
                  prompt to an output file."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Configuration file path (JSON format)"
    )]
    config: PathBuf,

    /// Directory holding system prompt presets
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PRESETS_DIR)]
    presets_dir: PathBuf,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new prompt from example files and a topic
    Generate(GenerateArgs),
    /// List the models installed on the configured server
    Models,
    /// Manage system prompt presets
    #[command(subcommand)]
    Presets(PresetCommand),
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// View or edit an output file
    #[command(subcommand)]
    Output(OutputCommand),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Files containing example prompts
    #[arg(short, long = "examples", value_name = "FILE", required = true, num_args = 1..)]
    examples: Vec<PathBuf>,

    /// Topic or goal for the new prompt
    #[arg(short, long)]
    topic: String,

    /// Append the generated prompt to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Activate this preset before generating
    #[arg(short, long, value_name = "NAME")]
    preset: Option<String>,
}

#[derive(Subcommand, Debug)]
enum PresetCommand {
    /// List presets; the active one is marked with '*'
    List,
    /// Print a preset (the active one by default)
    Show { name: Option<String> },
    /// Create or overwrite a preset
    Save {
        name: String,
        /// Read the instructions from this file
        #[arg(long, value_name = "FILE", conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,
        /// Instructions given inline
        #[arg(long)]
        text: Option<String>,
    },
    /// Delete an inactive preset
    Delete { name: String },
    /// Make a preset the active one
    Activate { name: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        endpoint: Option<String>,
        /// "ollama" or "openai-compatible"
        #[arg(long)]
        api_type: Option<ApiType>,
        /// Pass an empty string to remove the key
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum OutputCommand {
    /// Print the content of an output file
    Show {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Replace an output file with edited content
    Write {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// File with the edited content
        #[arg(long, value_name = "SRC")]
        from: PathBuf,
    },
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if self.config.is_dir() {
            return Err(format!(
                "Configuration path is a directory: {}",
                self.config.display()
            ));
        }
        if self.presets_dir.exists() && !self.presets_dir.is_dir() {
            return Err(format!(
                "Presets path is not a directory: {}",
                self.presets_dir.display()
            ));
        }
        if let Command::Generate(args) = &self.command {
            if args.topic.trim().is_empty() {
                return Err("Topic must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Decides whether Ctrl+C may still abort a generation
///
/// Exactly one of [`CancelGate::fire`] and [`CancelGate::disarm`] wins; once
/// disarmed, interrupts are ignored so the output write is never cut short.
#[derive(Clone, Debug)]
struct CancelGate(Arc<AtomicU8>);

impl CancelGate {
    const ARMED: u8 = 0;
    const DISARMED: u8 = 1;
    const FIRED: u8 = 2;

    fn armed() -> Self {
        Self(Arc::new(AtomicU8::new(Self::ARMED)))
    }

    /// Claim the gate for an interrupt; `true` means the process should exit
    fn fire(&self) -> bool {
        self.claim(Self::FIRED)
    }

    /// Claim the gate for the save step; `false` means an interrupt won
    fn disarm(&self) -> bool {
        self.claim(Self::DISARMED)
    }

    fn claim(&self, state: u8) -> bool {
        self.0
            .compare_exchange(Self::ARMED, state, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

fn run_generate(session: &Session, args: GenerateArgs) -> anyhow::Result<()> {
    if let Some(preset) = &args.preset {
        session.set_active_preset(preset)?;
    }
    let examples = ExampleSet::load(&args.examples)?;

    // Ctrl+C while the request is pending exits before anything is written
    let gate = CancelGate::armed();
    let handler_gate = gate.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_gate.fire() {
            warn!("Interrupted, generation cancelled; output file left untouched");
            std::process::exit(130);
        }
        warn!("Interrupt ignored while the result is being saved");
    }) {
        warn!("Could not install Ctrl+C handler: {}", e);
    }

    let config = session.config();
    info!(
        "Generating with preset '{}' via {} at {}",
        config.active_preset, config.api_type, config.endpoint
    );
    let worker = session.spawn_generation(examples, args.topic)?;
    let text = worker
        .join()
        .map_err(|_| anyhow!("generation worker panicked"))??;
    if !gate.disarm() {
        bail!("generation interrupted");
    }

    println!("{}", text);

    if let Some(output) = args.output {
        session.set_output_path(&output);
        session.save_generated(&text)?;
        info!("Appended generated prompt to {}", output.display());
    }
    Ok(())
}

fn run_presets(session: &Session, command: PresetCommand) -> anyhow::Result<()> {
    let presets = session.presets();
    match command {
        PresetCommand::List => {
            let active = session.config().active_preset;
            for name in presets.list()? {
                let marker = if name == active { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
        PresetCommand::Show { name } => {
            let text = match name {
                Some(name) => presets.read(&name)?,
                None => session.active_preset_text()?,
            };
            println!("{}", text);
        }
        PresetCommand::Save { name, file, text } => {
            let text = match (file, text) {
                (Some(file), _) => std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
                (None, Some(text)) => text,
                (None, None) => bail!("either --file or --text is required"),
            };
            presets.write(&name, &text)?;
            println!("Saved preset '{}'", name);
        }
        PresetCommand::Delete { name } => {
            session.delete_preset(&name)?;
            println!("Deleted preset '{}'", name);
        }
        PresetCommand::Activate { name } => {
            session.set_active_preset(&name)?;
            println!("'{}' is now the active preset", name);
        }
    }
    Ok(())
}

fn run_config(session: &Session, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = session.config();
            println!("config file:   {}", session.config_store().path().display());
            println!("endpoint:      {}", config.endpoint);
            println!("api type:      {}", config.api_type);
            println!("model:         {}", config.model);
            println!("active preset: {}", config.active_preset);
            println!(
                "api key:       {}",
                if config.has_api_key() { "(set)" } else { "(none)" }
            );
            println!("timeout:       {}s", config.request_timeout_secs);
        }
        ConfigCommand::Set {
            endpoint,
            api_type,
            api_key,
            model,
            timeout,
        } => {
            let update = SettingsUpdate {
                endpoint,
                api_type,
                api_key,
                model,
                request_timeout_secs: timeout,
            };
            if update.is_empty() {
                bail!("nothing to change; pass at least one setting");
            }
            let config = session.update_settings(&update)?;
            println!(
                "Settings saved: {} at {} (model {})",
                config.api_type, config.endpoint, config.model
            );
        }
    }
    Ok(())
}

fn run_output(session: &Session, command: OutputCommand) -> anyhow::Result<()> {
    match command {
        OutputCommand::Show { file } => {
            session.set_output_path(file);
            print!("{}", session.read_output()?);
        }
        OutputCommand::Write { file, from } => {
            let text = std::fs::read_to_string(&from)
                .with_context(|| format!("failed to read {}", from.display()))?;
            session.set_output_path(&file);
            session.overwrite_output(&text)?;
            println!("Saved {}", file.display());
        }
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session::open(
        ConfigStore::at_path(&cli.config),
        PresetManager::new(&cli.presets_dir),
    );

    match cli.command {
        Command::Generate(args) => run_generate(&session, args),
        Command::Models => {
            let models = runtime()?.block_on(session.list_models())?;
            if models.is_empty() {
                println!("No models found ({})", session.config().api_type);
            }
            for model in models {
                println!("{}", model);
            }
            Ok(())
        }
        Command::Presets(command) => run_presets(&session, command),
        Command::Config(command) => run_config(&session, command),
        Command::Output(command) => run_output(&session, command),
    }
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_command() {
        let cli = Cli::try_parse_from([
            "promptsmith",
            "generate",
            "--examples",
            "a.txt",
            "b.txt",
            "--topic",
            "a green parrot",
            "--output",
            "out.txt",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.presets_dir, PathBuf::from("system_prompts"));
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(
                    args.examples,
                    vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
                );
                assert_eq!(args.topic, "a green parrot");
                assert_eq!(args.output, Some(PathBuf::from("out.txt")));
                assert!(args.preset.is_none());
            }
            other => panic!("Expected generate, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_requires_examples() {
        let result = Cli::try_parse_from(["promptsmith", "generate", "--topic", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_set_api_type() {
        let cli = Cli::try_parse_from([
            "promptsmith",
            "config",
            "set",
            "--api-type",
            "openai-compatible",
            "--timeout",
            "120",
        ])
        .unwrap();

        match cli.command {
            Command::Config(ConfigCommand::Set {
                api_type, timeout, ..
            }) => {
                assert_eq!(api_type, Some(ApiType::OpenAICompatible));
                assert_eq!(timeout, Some(120));
            }
            other => panic!("Expected config set, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_api_type() {
        let result = Cli::try_parse_from(["promptsmith", "config", "set", "--api-type", "gemini"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_preset_save_needs_content() {
        assert!(Cli::try_parse_from(["promptsmith", "presets", "save", "poetry"]).is_err());
        assert!(Cli::try_parse_from([
            "promptsmith",
            "presets",
            "save",
            "poetry",
            "--text",
            "Write haiku."
        ])
        .is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory_config() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "promptsmith",
            "--config",
            dir.path().to_str().unwrap(),
            "models",
        ])
        .unwrap();

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_blank_topic() {
        let cli = Cli::try_parse_from([
            "promptsmith",
            "generate",
            "--examples",
            "a.txt",
            "--topic",
            "   ",
        ])
        .unwrap();

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cancel_gate_ignores_interrupts_after_disarm() {
        let gate = CancelGate::armed();
        let handler = gate.clone();

        assert!(gate.disarm());
        assert!(!handler.fire());
        assert!(!handler.fire());
    }

    #[test]
    fn test_cancel_gate_interrupt_blocks_save() {
        let gate = CancelGate::armed();
        let handler = gate.clone();

        assert!(handler.fire());
        assert!(!gate.disarm());
    }

    #[test]
    fn test_cli_validation_defaults() {
        let cli = Cli::try_parse_from(["promptsmith", "presets", "list"]).unwrap();
        assert!(cli.validate().is_ok());
    }
}
