//! Create a starter configuration and suites directory

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Args;

use proofshot_common::ProofshotConfig;

use crate::output;

const EXAMPLE_SUITE: &str = "\
*** Settings ***
Documentation     Example todo app flow
Test Setup        Go To Page    ${BASE_URL}

*** Variables ***
${EMAIL}          test@example.com
${PASSWORD}       password

*** Test Cases ***
Login
    Login    ${EMAIL}    ${PASSWORD}

Add And Complete Todo
    Login    ${EMAIL}    ${PASSWORD}
    Add Todo    Buy milk
    Complete Todo    Buy milk
    Verify Todo Visible    Buy milk
";

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,

    /// Skip writing the example suite
    #[arg(long)]
    pub no_example: bool,
}

/// Write the default config to `config_path` and an example suite into the
/// configured suites directory. Returns the files written.
pub fn scaffold(config_path: &Path, args: &InitArgs) -> anyhow::Result<Vec<PathBuf>> {
    if config_path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let config = ProofshotConfig::default();
    config.save(config_path)?;
    let mut written = vec![config_path.to_path_buf()];

    if !args.no_example {
        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        let suites_dir = base.join(&config.suites.dir);
        let example = suites_dir.join("example.robot");
        if example.exists() {
            output::print_warning(&format!("{} exists, leaving it alone", example.display()));
        } else {
            std::fs::create_dir_all(&suites_dir)?;
            std::fs::write(&example, EXAMPLE_SUITE)?;
            written.push(example);
        }
    }

    Ok(written)
}

pub async fn execute(args: InitArgs, config_path: &Path) -> anyhow::Result<()> {
    for path in scaffold(config_path, &args)? {
        output::print_success(&format!("Wrote {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofshot_e2e::KeywordSuite;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_scaffold() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("proofshot.toml");

        let written = scaffold(&config_path, &InitArgs::default()).unwrap();
        assert_eq!(written.len(), 2);

        let loaded = ProofshotConfig::load(&config_path).unwrap();
        assert_eq!(loaded.output.root, PathBuf::from("test-output"));

        let preset = HashMap::from([("BASE_URL".to_string(), "http://localhost:3000".to_string())]);
        let suite = KeywordSuite::from_file(&written[1], &preset).unwrap();
        assert_eq!(suite.tests.len(), 2);

        // Second run refuses without --force
        assert!(scaffold(&config_path, &InitArgs::default()).is_err());
        let forced = InitArgs {
            force: true,
            no_example: true,
        };
        assert_eq!(scaffold(&config_path, &forced).unwrap(), vec![config_path]);
    }
}
