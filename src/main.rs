//! rust_toro command-line interface.
//!
//! `rust_toro compile job.toml -o MainModule.mod` compiles the move blocks of a job file
//! and writes the assembled module. `rust_toro config` prints the effective configuration.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};

use rust_toro::config::{ToroConfig, DEFAULT_CONFIG_PATH};
use rust_toro::motion::{CartesianPose, JointPose, MotionParameter};
use rust_toro::program::data::{tooldata, wobjdata};
use rust_toro::program::{
    insert_instructions, program_descriptor, write_module, CompiledSet, Frames, ProgramModule,
    TargetCompiler,
};
use rust_toro::telemetry;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[clap(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Compile a job file into a program module
    Compile {
        /// Job description (TOML)
        job: PathBuf,
        /// Module file to write
        #[clap(short, long)]
        output: PathBuf,
        /// Also write a program descriptor next to the module
        #[clap(long)]
        pgf: Option<PathBuf>,
        /// Write the compiled sets as JSON
        #[clap(long)]
        manifest: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

/// Job file layout.
#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default, rename = "tool")]
    tools: Vec<FrameSpec>,
    #[serde(default, rename = "wobj")]
    wobjs: Vec<FrameSpec>,
    #[serde(default, rename = "block")]
    blocks: Vec<Block>,
    #[serde(default, rename = "insert")]
    inserts: Vec<InsertSpec>,
}

#[derive(Debug, Deserialize)]
struct FrameSpec {
    name: String,
    frame: CartesianPose,
    #[serde(default = "default_tool_mass")]
    mass: f64,
}

fn default_tool_mass() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum Block {
    MoveL(CartesianBlock),
    MoveJ(CartesianBlock),
    MoveAbsJ(JointBlock),
    MoveC(CircularBlock),
    Custom { statements: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct Motion {
    set_name: String,
    speeds: Vec<MotionParameter>,
    zones: Vec<MotionParameter>,
    tool: Option<String>,
    wobj: Option<String>,
}

impl Motion {
    fn frames(&self) -> Frames {
        let defaults = Frames::default();
        Frames::new(
            self.tool.clone().unwrap_or(defaults.tool),
            self.wobj.clone().unwrap_or(defaults.wobj),
        )
    }
}

#[derive(Debug, Deserialize)]
struct CartesianBlock {
    #[serde(flatten)]
    motion: Motion,
    targets: Vec<CartesianPose>,
}

#[derive(Debug, Deserialize)]
struct JointBlock {
    #[serde(flatten)]
    motion: Motion,
    targets: Vec<JointPose>,
}

#[derive(Debug, Deserialize)]
struct CircularBlock {
    #[serde(flatten)]
    motion: Motion,
    via: Vec<CartesianPose>,
    targets: Vec<CartesianPose>,
}

/// Statements spliced into the routine body after compilation.
#[derive(Debug, Deserialize)]
struct InsertSpec {
    at: Vec<usize>,
    statements: Vec<String>,
}

fn compile_job(job: &Job, compiler: &TargetCompiler) -> Result<(ProgramModule, Vec<CompiledSet>)> {
    let mut module = ProgramModule::new();
    for tool in &job.tools {
        module.add_tool(tooldata(&tool.name, &tool.frame, tool.mass));
    }
    for wobj in &job.wobjs {
        module.add_wobj(wobjdata(&wobj.name, &wobj.frame));
    }

    let mut sets = Vec::with_capacity(job.blocks.len());
    for (n, block) in job.blocks.iter().enumerate() {
        let set = match block {
            Block::MoveL(b) => {
                let m = &b.motion;
                compiler.move_l(&b.targets, &m.speeds, &m.zones, &m.set_name, &m.frames())
            }
            Block::MoveJ(b) => {
                let m = &b.motion;
                compiler.move_j(&b.targets, &m.speeds, &m.zones, &m.set_name, &m.frames())
            }
            Block::MoveAbsJ(b) => {
                let m = &b.motion;
                compiler.move_abs_j(&b.targets, &m.speeds, &m.zones, &m.set_name, &m.frames())
            }
            Block::MoveC(b) => {
                let m = &b.motion;
                compiler.move_c(&b.via, &b.targets, &m.speeds, &m.zones, &m.set_name, &m.frames())
            }
            Block::Custom { statements } => Ok(compiler.custom(statements)),
        }
        .with_context(|| format!("block {n} failed to compile"))?;
        debug!(block = n, instructions = set.instructions.len(), "Compiled block");
        module.push_set(&set);
        sets.push(set);
    }

    for insert in &job.inserts {
        let spliced = insert_instructions(module.instructions(), &insert.statements, &insert.at)
            .context("insert failed")?;
        module.set_instructions(spliced);
    }
    Ok((module, sets))
}

async fn compile(
    config: &ToroConfig,
    job_path: &Path,
    output: &Path,
    pgf: Option<&Path>,
    manifest: Option<&Path>,
) -> Result<()> {
    let text = tokio::fs::read_to_string(job_path)
        .await
        .with_context(|| format!("cannot read job file {}", job_path.display()))?;
    let job: Job = toml::from_str(&text)
        .with_context(|| format!("invalid job file {}", job_path.display()))?;

    let compiler = config.compiler()?;
    let (module, sets) = compile_job(&job, &compiler)?;
    write_module(output, &module.render()).await?;

    if let Some(pgf) = pgf {
        let module_file = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("output path has no file name")?;
        write_module(pgf, &program_descriptor(&[module_file.as_str()])).await?;
    }
    if let Some(manifest) = manifest {
        let json = serde_json::to_string_pretty(&sets)?;
        tokio::fs::write(manifest, json)
            .await
            .with_context(|| format!("cannot write manifest {}", manifest.display()))?;
    }

    info!(
        job = %job_path.display(),
        blocks = sets.len(),
        instructions = module.instructions().len(),
        "Module compiled"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ToroConfig::load_from(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let level = match args.verbose {
        0 => telemetry::parse_level(&config.application.log_level),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    telemetry::init(level);
    debug!(app = %config.application.name, "Configuration loaded");

    match args.cmd {
        Command::Compile {
            job,
            output,
            pgf,
            manifest,
        } => compile(&config, &job, &output, pgf.as_deref(), manifest.as_deref()).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
