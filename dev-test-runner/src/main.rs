//! Runs every bundled sample definition through every registered emitter.
//!
//! `cargo run -p dev-test-runner [-- <glob>]`, default `samples/*.json`.
use anyhow::{Context, Result};
use colored::Colorize;
use unidef::{read_model_definitions, ModelDefinition, Registries};

fn load(pattern: &str) -> Result<Vec<(String, ModelDefinition)>> {
    let mut models = Vec::new();
    for path in glob::glob(pattern).with_context(|| format!("invalid glob: {pattern}"))? {
        let path = path?;
        let source = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let defs = read_model_definitions(&source).with_context(|| format!("{}", path.display()))?;
        models.extend(defs.into_iter().map(|m| (path.display().to_string(), m)));
    }
    Ok(models)
}

fn main() -> Result<()> {
    let pattern = std::env::args().nth(1).unwrap_or_else(|| "samples/*.json".to_string());
    let registries = Registries::standard();
    let models = load(&pattern)?;
    if models.is_empty() {
        anyhow::bail!("no model definitions matched {pattern}");
    }

    let mut failed = 0usize;
    for (origin, model) in &models {
        for emitter in registries.emitters.emitters() {
            let target = emitter.targets()[0];
            match emitter.emit_model(target, model, &registries) {
                Ok(text) => {
                    eprintln!("{} {origin} {} → {target} ({} bytes)", "✅".green(), model.name, text.len());
                }
                Err(error) => {
                    failed += 1;
                    eprintln!("{} {origin} {} → {target}: {error}", "❌".red(), model.name);
                }
            }
        }
    }

    let total = models.len() * registries.emitters.emitters().count();
    let summary = format!("{}/{total} passed", total - failed);
    if failed > 0 {
        eprintln!("{}", summary.red().bold());
        std::process::exit(1);
    }
    eprintln!("{}", summary.green().bold());
    Ok(())
}
