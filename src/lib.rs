//! Common functionality for GridPlan.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod build;
pub mod capacity;
pub mod cli;
pub mod formulation;
pub mod id;
pub mod input;
pub mod linkage;
pub mod log;
pub mod operations;
pub mod output;
pub mod period;
pub mod project;
pub mod registry;
pub mod scenario;
pub mod settings;
pub mod simulation;
pub mod solver;
pub mod system;
pub mod temporal;
pub mod zone;

#[cfg(test)]
mod fixture;

/// Get the directory in which program settings are stored
pub fn get_gridplan_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir for this platform; use the working directory instead
        return PathBuf::from(".");
    };

    config_dir.push("gridplan");
    config_dir
}
