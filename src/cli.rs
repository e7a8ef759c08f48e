//! CLI: declarations → (export | check)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use api_shapes::decl::{Document, Loaded};
use api_shapes::{RequestPipeline, Scope, Validation};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// load type declarations, then export their structural trees or check payloads against them
#[derive(Parser, Debug)]
#[command(name = "api-shapes", version)]
pub struct CommandLineInterface {
    /// debug-level logging for this crate (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print every registered type and enum as plain JSON trees
    Export(ExportOut),
    /// run coerce → validate → transform over input documents
    Check(CheckRun),
}

#[derive(Args, Debug, Clone)]
struct DeclSettings {
    /// declaration document (JSON)
    #[arg(long)]
    decl: PathBuf,

    /// owner scope; omitted means the global scope
    #[arg(long)]
    scope: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is checked.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct ExportOut {
    #[command(flatten)]
    decl_settings: DeclSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckRun {
    #[command(flatten)]
    decl_settings: DeclSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// type to check against (short name, resolved from --scope)
    #[arg(long = "type")]
    type_name: String,

    /// validate payloads exactly as sent
    #[arg(long)]
    no_coerce: bool,

    /// print the full result of each payload as JSON
    #[arg(long)]
    json: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl DeclSettings {
    fn load(&self) -> Result<Loaded> {
        let bytes = std::fs::read(&self.decl)
            .with_context(|| format!("failed to read declarations {}", self.decl.display()))?;
        let loaded = Document::from_slice(&bytes)
            .and_then(Document::load)
            .with_context(|| format!("invalid declarations in {}", self.decl.display()))?;
        Ok(loaded)
    }

    fn scope(&self) -> Scope {
        self.scope.as_deref().map(Scope::owner).unwrap_or_default()
    }
}

impl InputSettings {
    /// Every payload across all inputs, labelled `path` or `path#n`.
    fn load_documents(&self) -> Result<Vec<(String, Value)>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let per_file = source_paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(per_file.into_iter().flatten().collect())
    }

    fn load_file(&self, source_path: &Path) -> Result<Vec<(String, Value)>> {
        let label = source_path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read source file {label}"))?;

        let documents = if self.ndjson {
            source
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str::<Value>)
                .collect::<Result<Vec<_>, _>>()
        } else {
            serde_json::from_str::<Value>(&source).map(|v| vec![v])
        }
        .with_context(|| format!("failed to parse JSON source file ({label})"))?;

        let mut payloads = Vec::new();
        for document in documents {
            let document = match self.json_pointer.as_deref() {
                None => document,
                Some(pointer) => document
                    .pointer(pointer)
                    .cloned()
                    .with_context(|| format!("JSON pointer {pointer} matched nothing in {label}"))?,
            };
            match self.jq_expr.as_deref() {
                None => payloads.push(document),
                Some(jq_expr) => {
                    let outputs = crate::jq_exec::run_jaq(jq_expr, &document).with_context(|| {
                        format!("failed to apply jq expression to source file ({label})")
                    })?;
                    payloads.extend(outputs);
                }
            }
        }

        Ok(match payloads.len() {
            1 => payloads.into_iter().map(|p| (label.clone(), p)).collect(),
            _ => payloads
                .into_iter()
                .enumerate()
                .map(|(index, p)| (format!("{label}#{index}"), p))
                .collect(),
        })
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Export(target) => target.run(),
            Command::Check(target) => target.run(),
        }
    }
}

impl ExportOut {
    fn run(&self) -> Result<ExitCode> {
        let loaded = self.decl_settings.load()?;
        let serialized = match &self.decl_settings.scope {
            None => loaded.registry.serialize_all(),
            Some(_) => loaded.registry.serialize_scope(&self.decl_settings.scope()),
        };
        let schema_src = serde_json::to_string_pretty(&serialized.to_json())?;
        match self.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(out, &schema_src).with_context(|| format!("failed to write {}", out.display()))?;
                info!(path = %out.display(), "exported");
            }
            None => println!("{schema_src}"),
        }
        Ok(ExitCode::SUCCESS)
    }
}

impl CheckRun {
    fn run(&self) -> Result<ExitCode> {
        let loaded = self.decl_settings.load()?;
        let scope = self.decl_settings.scope();
        if loaded.registry.definition(&self.type_name, &scope).is_none() {
            bail!("type `{}` does not resolve in {scope}", self.type_name);
        }
        let payloads = self.input_settings.load_documents()?;
        debug!(count = payloads.len(), "payloads loaded");

        let pipeline = match self.no_coerce {
            true => RequestPipeline::new(&loaded.registry).without_coercion(),
            false => RequestPipeline::new(&loaded.registry),
        };
        let results = payloads
            .par_iter()
            .map(|(label, payload)| {
                let validation = pipeline
                    .process_type(payload, &self.type_name, &scope)
                    .with_context(|| format!("type `{}` vanished while checking {label}", self.type_name))?;
                Ok((label.as_str(), validation))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut invalid = 0usize;
        for (label, validation) in &results {
            if !validation.is_valid() {
                invalid += 1;
            }
            self.report(label, validation)?;
        }
        info!(checked = results.len(), invalid, "done");
        Ok(if invalid == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }

    fn report(&self, label: &str, validation: &Validation) -> Result<()> {
        if self.json {
            let mut out = validation.to_json();
            out["input"] = Value::from(label);
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }
        if validation.is_valid() {
            println!("{} {label}", "✓".green().bold());
            return Ok(());
        }
        println!("{} {label}", "✗".red().bold());
        for issue in &validation.issues {
            let pointer = issue.pointer();
            let at = if pointer.is_empty() { "/".to_string() } else { pointer };
            println!("    {} {} {}", at.yellow(), issue.detail(), format!("({})", issue.code()).dimmed());
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
                out.push(entry?);
            }
            if out.len() == before {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_arguments() {
        let cli = CommandLineInterface::try_parse_from([
            "api-shapes", "-v", "check", "--decl", "d.json", "--type", "", "--scope", "invoice",
            "--input", "a.json", "b.json", "--no-coerce",
        ])
        .unwrap();
        assert!(cli.verbose());
        let Command::Check(check) = cli.cmd else { panic!("expected check") };
        assert_eq!(check.input_settings.input, ["a.json", "b.json"]);
        assert_eq!(check.decl_settings.scope(), Scope::owner("invoice"));
        assert!(check.no_coerce);
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["x.json", "dir/y.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("x.json"), PathBuf::from("dir/y.json")]);
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }
}
