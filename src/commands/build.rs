use std::path::Path;

use tracing::info;

use crate::analysis;
use crate::loader;
use crate::models::ModuleSet;

pub fn run(symbol: &str, input: &Path, modules: &str, swing_n: usize, output: Option<&Path>) {
    if let Err(e) = build(symbol, input, modules, swing_n, output) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn build(
    symbol: &str,
    input: &Path,
    modules: &str,
    swing_n: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let modules = ModuleSet::parse(modules)?;
    let loaded = loader::load_input(input)?;
    let snapshot = analysis::build_context(symbol, &modules, swing_n, &loaded)?;

    let json = serde_json::to_string_pretty(&snapshot)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "snapshot written");
            println!("✅ Snapshot for {} written to {}", snapshot.symbol, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
