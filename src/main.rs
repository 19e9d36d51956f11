/*!
 * dp2 CLI - command-line client for the DAISY Pipeline 2 web service
 */

use clap::{Args, Parser, Subcommand, ValueEnum};
use dp2::{
    cli_style::{
        self, format_message, job_table, jobs_table, print_info, print_success, queue_table,
        scripts_table, Theme,
    },
    archive,
    config::{load_halt_key, load_last_id, store_last_id, LinkConfig},
    error::{LinkError, Result, EXIT_SUCCESS},
    logging, JobDescription, Link, VERSION,
};
use dp2_connect::RemotePipeline;
use dp2_core_interface::Priority;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Parser)]
#[command(name = "dp2")]
#[command(version, about = "Command-line client for the DAISY Pipeline 2", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print client and pipeline versions
    Version,

    /// List the available scripts
    Scripts,

    /// Submit a job
    Run {
        /// Script id
        script: String,

        /// Input as NAME=PATH_OR_URL (repeatable)
        #[arg(short, long = "input", value_name = "NAME=PATH")]
        inputs: Vec<String>,

        /// Option as NAME=VALUE (repeatable)
        #[arg(short = 'x', long = "option", value_name = "NAME=VALUE")]
        options: Vec<String>,

        #[arg(short, long)]
        nicename: Option<String>,

        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,

        /// Follow the job messages until it finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Status of a job
    Status {
        #[command(flatten)]
        job: JobArg,

        /// Print the job messages
        #[arg(short = 'v', long = "messages")]
        messages: bool,
    },

    /// List the jobs present in the server
    Jobs,

    /// Remove a job from the server
    Delete {
        #[command(flatten)]
        job: JobArg,
    },

    /// Store the results of a job
    Results {
        #[command(flatten)]
        job: JobArg,

        /// Directory where the results are stored
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Print or store the log of a job
    Log {
        #[command(flatten)]
        job: JobArg,

        /// Write the log into this file instead of printing it
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Stop the web service
    Halt,

    /// Show the execution queue
    Queue,

    /// Move a job up the execution queue
    Moveup { id: String },

    /// Move a job down the execution queue
    Movedown { id: String },
}

/// Job addressed either by id or as the last one submitted
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct JobArg {
    /// Job id
    id: Option<String>,

    /// Use the last job submitted
    #[arg(short = 'l', long = "lastid")]
    last_id: bool,
}

impl JobArg {
    fn resolve(self, last_id_path: &Path) -> Result<String> {
        match self.id {
            Some(id) if !self.last_id => Ok(id),
            _ => load_last_id(last_id_path),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            cli_style::print_error(&e.to_string(), hint(&e));
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn hint(err: &LinkError) -> Option<&'static str> {
    match err {
        LinkError::Connectivity(_) => {
            Some("Is the pipeline running? Set `starting = true` to launch it automatically")
        }
        LinkError::Authentication(_) => Some("Check client_key and client_secret"),
        _ => None,
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.debug = true;
    }

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(cli.command, config))
}

/// Explicit file must load; the default location is optional
fn load_config(path: Option<&Path>) -> Result<LinkConfig> {
    if let Some(path) = path {
        return LinkConfig::from_file(path);
    }
    match LinkConfig::default_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "Loading configuration");
            LinkConfig::from_file(&path)
        }
        _ => Ok(LinkConfig::default()),
    }
}

async fn connect(config: LinkConfig) -> Result<Link> {
    let url = config.url();
    let api = RemotePipeline::new(&url, config.call_timeout())
        .map_err(|e| LinkError::Config(format!("Invalid service url {}: {}", url, e)))?;
    Link::connect(Arc::new(api), config).await
}

async fn dispatch(command: Commands, config: LinkConfig) -> Result<()> {
    let halt_key_path = config.halt_key_path();
    let last_id_path = config.last_id_path();
    let link = connect(config).await?;

    match command {
        Commands::Version => {
            println!("Client version:          {}", VERSION);
            println!("Pipeline version:        {}", link.version());
            println!("Pipeline authentication: {}", link.authentication());
        }
        Commands::Scripts => {
            let scripts = link.scripts().await?;
            println!("{}", scripts_table(&scripts));
        }
        Commands::Run {
            script,
            inputs,
            options,
            nicename,
            priority,
            watch,
        } => {
            let mut description = JobDescription::new(script);
            if let Some(nicename) = nicename {
                description = description.with_nicename(nicename);
            }
            if let Some(priority) = priority {
                description = description.with_priority(priority.into());
            }
            for input in &inputs {
                let (name, value) = parse_pair(input)?;
                description = description.with_input(name, [to_url(value, link.is_local())?]);
            }
            for option in &options {
                let (name, value) = parse_pair(option)?;
                description = description.with_option(name, [value]);
            }

            let job = link.submit(&description).await?;
            print_success(&format!("Job {} submitted", job.id));
            if let Err(e) = store_last_id(&last_id_path, &job.id) {
                cli_style::print_warning(&format!("Could not remember the job id: {}", e));
            }

            if watch {
                let mut stream = link.stream_messages(&job.id)?;
                while let Some(message) = stream.recv().await {
                    println!("{}", format_message(&message?));
                }
                let job = link.job(&job.id).await?;
                println!("{}", job_table(&job));
            }
        }
        Commands::Status { job, messages } => {
            let id = job.resolve(&last_id_path)?;
            let job = link.job(&id).await?;
            println!("{}", job_table(&job));
            if messages {
                println!("{}", Theme::header("Messages"));
                for message in &job.messages {
                    println!("{}", format_message(message));
                }
            }
        }
        Commands::Jobs => {
            let jobs = link.jobs().await?;
            println!("{}", jobs_table(&jobs));
        }
        Commands::Delete { job } => {
            let id = job.resolve(&last_id_path)?;
            if link.delete(&id).await? {
                print_success(&format!("Job {} removed", id));
            } else {
                cli_style::print_warning(&format!("Job {} was not removed", id));
            }
        }
        Commands::Results { job, output } => {
            let id = job.resolve(&last_id_path)?;
            let data = link.results(&id).await?;
            let files = archive::extract_into(&data, &output)?;
            debug!(job_id = %id, files = files.len(), "Results extracted");
            print_success(&format!("Results stored into {}", output.display()));
        }
        Commands::Log { job, output } => {
            let id = job.resolve(&last_id_path)?;
            let data = link.log(&id).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, data)?;
                    print_info(&format!("Log written to {}", path.display()));
                }
                None => print!("{}", String::from_utf8_lossy(&data)),
            }
        }
        Commands::Halt => {
            let key = load_halt_key(&halt_key_path)?;
            link.halt(&key).await?;
            print_success("The web service has been halted");
        }
        Commands::Queue => {
            let queue = link.queue().await?;
            println!("{}", queue_table(&queue));
        }
        Commands::Moveup { id } => {
            let queue = link.move_up(&id).await?;
            println!("{}", queue_table(&queue));
        }
        Commands::Movedown { id } => {
            let queue = link.move_down(&id).await?;
            println!("{}", queue_table(&queue));
        }
    }

    Ok(())
}

/// Split `NAME=VALUE`
fn parse_pair(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(LinkError::Validation(format!(
            "expected NAME=VALUE, got '{}'",
            arg
        ))),
    }
}

/// URLs pass through; local paths need a service sharing our filesystem
fn to_url(value: &str, local: bool) -> Result<Url> {
    if let Ok(url) = Url::parse(value) {
        // A one-letter scheme is a Windows drive, not a URL
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }

    if !local {
        return Err(LinkError::Validation(format!(
            "'{}' is a local path but the pipeline is not running in local mode",
            value
        )));
    }
    let path = std::fs::canonicalize(value)?;
    Url::from_file_path(&path).map_err(|_| {
        LinkError::Validation(format!("cannot express {} as a URL", path.display()))
    })
}
