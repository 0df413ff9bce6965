//! Minimal CLI: request.json → OpenAPI documents
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use proto_openapi::descriptor::Model;
use proto_openapi::generator::{Generator, OutputFile};
use proto_openapi::markers::Registry;
use proto_openapi::options::GenerationOptions;
use proto_openapi::path_de::request_from_slice;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile protobuf declarations (a JSON-encoded CodeGeneratorRequest) into OpenAPI v3 schemas
#[derive(Parser, Debug)]
#[command(name = "proto-openapi", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate OpenAPI documents from one or more requests
    Generate(GenerateOut),
    /// list the registered constraint directives
    Markers,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// generator parameters (`k=v,k=v`); replaces the request's own parameter string
    #[arg(long, short)]
    parameter: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory (stdout if omitted)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&Path, Vec<OutputFile>) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source = std::fs::read(&source_path)
                .with_context(|| format!("failed to read source file {}", source_path.display()))?;
            let request = request_from_slice(&source)
                .with_context(|| format!("failed to decode request {}", source_path.display()))?;

            let parameter = self.parameter.as_deref().or(request.parameter.as_deref()).unwrap_or_default();
            debug!(input = %source_path.display(), parameter, "loaded request");
            let options = GenerationOptions::parse_parameters(parameter)
                .with_context(|| format!("invalid parameters for {}", source_path.display()))?;

            let model = Model::from_request(&request)?;
            let outputs = Generator::new(&model, options)?
                .generate(&request.file_to_generate)
                .with_context(|| format!("failed to generate from {}", source_path.display()))?;
            apply(&source_path, outputs)?;
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                target.input_settings.load_process(|_, outputs| {
                    for out in outputs {
                        write_output(target.out_dir.as_deref(), &out)?;
                    }
                    Ok(())
                })
            }
            Command::Markers => {
                let registry = Registry::global();
                for def in registry.definitions() {
                    println!("{:<52} {}", def.name.bold(), def.target);
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out_dir: Option<&Path>, out: &OutputFile) -> Result<()> {
    let Some(dir) = out_dir else {
        println!("{}", out.content);
        return Ok(());
    };
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(&out.name);
    std::fs::write(&path, &out.content).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("{} {}", "wrote".green(), path.display());
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // explicit glob that matched nothing
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
