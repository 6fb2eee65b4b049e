//! CLI: inputs → model definitions → (emit | schema)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::definition::{read_model_definitions, ModelDefinition, Registries};
use crate::jq_exec::JqFilter;
use crate::model::MixedModel;
use crate::parsers::Parsed;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// turn data samples, field lists and model definitions into structs, enums and SQL DDL
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// parse inputs and emit code for a target
    Emit(EmitOut),
    /// parse inputs and print the JSON debug view of each parsed tree
    Schema(SchemaOut),
    /// list registered emitters and the targets they answer to
    Targets,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// inputs are model definition files rather than samples
    #[arg(long, default_value_t = false)]
    models: bool,

    /// sample format when inputs are data samples
    #[arg(long, default_value = "json", conflicts_with = "lang")]
    format: String,

    /// inputs are program sources in this language
    #[arg(long)]
    lang: Option<String>,

    /// model name for samples (file stem if omitted)
    #[arg(long)]
    name: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct EmitOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// emitter target, see `targets`
    #[arg(long, short)]
    target: String,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// INPUTS
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Whether documents must be decoded and re-encoded, losing comments.
    fn preprocessed(&self) -> bool {
        self.ndjson || self.json_pointer.is_some() || self.jq_expr.is_some()
    }

    fn documents(&self, path: &Path, source: &str, jq: Option<&JqFilter>) -> Result<Vec<serde_json::Value>> {
        let mut docs = Vec::new();
        if self.ndjson {
            for (i, line) in source.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                let doc: serde_json::Value = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid JSON line", path.display(), i + 1))?;
                docs.push(doc);
            }
        } else {
            docs.push(
                serde_json::from_str(source)
                    .with_context(|| format!("{}: invalid JSON", path.display()))?,
            );
        }
        if let Some(pointer) = self.json_pointer.as_deref() {
            docs = docs
                .into_iter()
                .map(|doc| {
                    doc.pointer(pointer)
                        .cloned()
                        .with_context(|| format!("{}: nothing at JSON pointer {pointer}", path.display()))
                })
                .collect::<Result<_>>()?;
        }
        if let Some(jq) = jq {
            let mut out = Vec::new();
            for doc in &docs {
                out.extend(jq.run(doc).with_context(|| format!("{}: jq failed", path.display()))?);
            }
            docs = out;
        }
        Ok(docs)
    }

    fn model_name(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "root".to_string())
        })
    }

    /// Every model the inputs describe, in input order.
    fn load_models(&self) -> Result<Vec<ModelDefinition>> {
        let jq = self.jq_expr.as_deref().map(JqFilter::compile).transpose()?;
        let mut models = Vec::new();
        for path in resolve_file_path_patterns(&self.input)? {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = self.model_name(&path);

            if self.models {
                let defs = read_model_definitions(&source)
                    .with_context(|| format!("{}: invalid model definitions", path.display()))?;
                models.extend(defs);
            } else if let Some(lang) = self.lang.as_deref() {
                models.push(ModelDefinition::from_source(&name, lang, &source));
            } else if !self.preprocessed() {
                models.push(ModelDefinition::from_example(&name, &self.format, &source));
            } else {
                let docs = self.documents(&path, &source, jq.as_ref())?;
                let many = docs.len() > 1;
                for (i, doc) in docs.iter().enumerate() {
                    let name = if many { format!("{name}_{i}") } else { name.clone() };
                    models.push(ModelDefinition::from_example(&name, &self.format, &doc.to_string()));
                }
            }
        }
        tracing::info!(models = models.len(), "inputs loaded");
        Ok(models)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
    pub fn init_logging(&self) {
        let default = if self.verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn run(&self) -> Result<()> {
        let registries = Registries::standard();
        match &self.cmd {
            Command::Targets => {
                for emitter in registries.emitters.emitters() {
                    println!("{}: {}", emitter.name(), emitter.targets().join(", "));
                }
                Ok(())
            }
            Command::Emit(target) => {
                let models = target.input_settings.load_models()?;
                let Some(emitter) = registries.emitters.find_emitter(&target.target) else {
                    bail!(crate::Error::NoEmitter(target.target.clone()));
                };
                let outputs = models
                    .par_iter()
                    .map(|model| {
                        emitter
                            .emit_model(&target.target, model, &registries)
                            .with_context(|| format!("model `{}`", model.name))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let text: Vec<String> = outputs.into_iter().filter(|s| !s.is_empty()).collect();
                write_output(target.out.as_deref(), &text.join("\n"))
            }
            Command::Schema(target) => {
                let models = target.input_settings.load_models()?;
                let views = models
                    .par_iter()
                    .map(|model| {
                        let parsed = model
                            .get_parsed(&registries)
                            .with_context(|| format!("model `{}`", model.name))?;
                        Ok(match parsed {
                            Parsed::Type(ty) => ty.entity().to_json(),
                            Parsed::Node(node) => node.entity().to_json(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let view = match <[_; 1]>::try_from(views) {
                    Ok([single]) => single,
                    Err(views) => serde_json::Value::Array(views),
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&view)?)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

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
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matched nothing is an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> InputSettings {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            settings: InputSettings,
        }
        let argv = std::iter::once("unidef").chain(args.iter().copied());
        Wrapper::parse_from(argv).settings
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }

    #[test]
    fn documents_honour_ndjson_pointer_and_jq() {
        let s = settings(&["--ndjson", "--json-pointer", "/data", "-i", "x"]);
        let docs = s
            .documents(Path::new("x"), "{\"data\": {\"a\": 1}}\n\n{\"data\": {\"a\": 2}}\n", None)
            .unwrap();
        assert_eq!(docs, vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})]);

        let jq = JqFilter::compile(".items[]").unwrap();
        let s = settings(&["--jq-expr", ".items[]", "-i", "x"]);
        let docs = s.documents(Path::new("x"), "{\"items\": [1, 2, 3]}", Some(&jq)).unwrap();
        assert_eq!(docs.len(), 3);

        let s = settings(&["--json-pointer", "/missing", "-i", "x"]);
        assert!(s.documents(Path::new("x"), "{}", None).is_err());
    }

    #[test]
    fn ndjson_lines_each_go_through_the_pointer() {
        let s = settings(&["--ndjson", "--json-pointer", "/payload/0", "-i", "x"]);
        let source = "{\"payload\": [{\"id\": 1}]}\n{\"payload\": [{\"id\": 2}, {\"id\": 3}]}\n";
        let docs = s.documents(Path::new("feed.ndjson"), source, None).unwrap();
        assert_eq!(docs, vec![serde_json::json!({"id": 1}), serde_json::json!({"id": 2})]);

        let err = s.documents(Path::new("feed.ndjson"), "{\"payload\": []}\nnot json\n", None).unwrap_err();
        assert!(err.to_string().contains("feed.ndjson:2"), "{err}");
    }

    #[test]
    fn model_names_default_to_file_stems() {
        let s = settings(&["-i", "x"]);
        assert_eq!(s.model_name(Path::new("samples/order_fill.json")), "order_fill");
        let s = settings(&["--name", "fill", "-i", "x"]);
        assert_eq!(s.model_name(Path::new("samples/order_fill.json")), "fill");
    }
}
