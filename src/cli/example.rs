//! The bundled example scenarios and the CLI commands for interacting with them.
use super::{RunOpts, handle_run_command};
use crate::settings::Settings;
use anyhow::{Context, Result, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory containing the example scenarios
static EXAMPLES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// Name of the file describing an example
const README_FILE_NAME: &str = "README.txt";

/// The available subcommands for managing example scenarios.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Describe the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example scenario to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => {
                for name in example_names() {
                    println!("{name}");
                }
            }
            Self::Info { name } => println!("{}", example_info(&name)?),
            Self::Extract { name, new_path } => {
                let dest = new_path.unwrap_or_else(|| PathBuf::from(&name));
                extract_example(&name, &dest)?;
            }
            Self::Run { name, opts } => handle_example_run_command(&name, &opts, None)?,
        }

        Ok(())
    }
}

/// Names of the bundled examples
pub fn example_names() -> impl Iterator<Item = &'static str> {
    EXAMPLES_DIR
        .dirs()
        .filter_map(|dir| dir.path().file_name()?.to_str())
}

/// The description of an example
pub fn example_info(name: &str) -> Result<&'static str> {
    let path: PathBuf = [name, README_FILE_NAME].iter().collect();
    EXAMPLES_DIR
        .get_file(path)
        .with_context(|| format!("Example {name} not found."))?
        .contents_utf8()
        .with_context(|| format!("{README_FILE_NAME} for example {name} is not UTF-8 encoded"))
}

/// Extract the specified example to a new directory
pub fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    let sub_dir = EXAMPLES_DIR
        .get_dir(name)
        .with_context(|| format!("Example {name} not found."))?;
    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    write_dir(sub_dir, sub_dir.path(), new_path)
}

/// Write the contents of an embedded directory, including subproblem folders, under `dest`
fn write_dir(dir: &Dir, root: &Path, dest: &Path) -> Result<()> {
    let dir_path = dest.join(dir.path().strip_prefix(root)?);
    fs::create_dir_all(&dir_path)
        .with_context(|| format!("Could not create directory {}", dir_path.display()))?;
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(sub_dir) => write_dir(sub_dir, root, dest)?,
            DirEntry::File(file) => {
                let file_path = dest.join(file.path().strip_prefix(root)?);
                fs::write(&file_path, file.contents())
                    .with_context(|| format!("Could not write {}", file_path.display()))?;
            }
        }
    }

    Ok(())
}

/// Handle the `example run` command.
///
/// The example is extracted to a temporary directory, which is deleted afterwards. Output goes to
/// the folder named after the example, unless another is given.
pub fn handle_example_run_command(
    name: &str,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let scenario_path = temp_dir.path().join(name);
    extract_example(name, &scenario_path)?;

    let opts = RunOpts {
        output_dir: Some(opts.output_dir.clone().unwrap_or_else(|| {
            [crate::output::OUTPUT_DIRECTORY_ROOT, name].iter().collect()
        })),
        ..*opts
    };
    handle_run_command(&scenario_path, &opts, settings)
}
