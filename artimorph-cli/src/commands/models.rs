//! Model library CLI commands.

use std::path::PathBuf;

use artimorph::config::ConfigFile;
use artimorph::store::{ModelEntry, ModelStore};
use clap::Subcommand;
use dialoguer::Confirm;

use crate::error::CliError;

/// Models subcommands.
#[derive(Debug, Subcommand)]
pub enum ModelsAction {
    /// List saved models, newest first
    List,

    /// Delete a saved model
    Remove {
        /// File name as shown by `models list`
        name: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Copy a .glb, .gltf or .usdz file into the library
    Import {
        /// Model file to import
        path: PathBuf,
    },

    /// Show the models directory
    Path,
}

/// Run a models subcommand.
pub fn run(action: ModelsAction, config: &ConfigFile) -> Result<(), CliError> {
    let store = ModelStore::open(&config.storage.models_dir)?;

    match action {
        ModelsAction::List => run_list(&store),
        ModelsAction::Remove { name, yes } => run_remove(&store, &name, yes),
        ModelsAction::Import { path } => {
            let saved = store.import(&path)?;
            println!("Imported {}", saved.display());
            Ok(())
        }
        ModelsAction::Path => {
            println!("{}", store.root().display());
            Ok(())
        }
    }
}

fn run_list(store: &ModelStore) -> Result<(), CliError> {
    let entries = store.list()?;
    if entries.is_empty() {
        println!("No models in {}", store.root().display());
        return Ok(());
    }

    println!("Models in {}", store.root().display());
    println!();
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    println!();
    println!("{} model(s)", entries.len());
    Ok(())
}

fn run_remove(store: &ModelStore, name: &str, yes: bool) -> Result<(), CliError> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {}?", name))
            .default(false)
            .interact()
            .map_err(|e| CliError::Prompt(e.to_string()))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = store.remove(name)?;
    println!("Deleted {}", removed.display());
    Ok(())
}

fn format_entry(entry: &ModelEntry) -> String {
    format!(
        "  {}  {:>9}  {}",
        entry.modified.format("%Y-%m-%d %H:%M"),
        format_size(entry.size),
        entry.name
    )
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_remove_with_yes_skips_prompt() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("chair.glb"), b"glTF").unwrap();

        run_remove(&store, "chair.glb", true).unwrap();
        assert!(!dir.path().join("chair.glb").exists());
    }

    #[test]
    fn test_format_entry_includes_name_and_size() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("lamp.usdz"), vec![0u8; 2048]).unwrap();

        let entries = store.list().unwrap();
        let line = format_entry(&entries[0]);
        assert!(line.contains("lamp.usdz"));
        assert!(line.contains("2.0 KB"));
    }
}
