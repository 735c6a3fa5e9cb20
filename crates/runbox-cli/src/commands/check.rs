//! `runbox check`

use crate::args::SourceArgs;
use runbox_core::{SandboxConfig, SecurityChecker};
use std::process::ExitCode;

pub fn execute(config: &SandboxConfig, source: &SourceArgs, json: bool) -> anyhow::Result<ExitCode> {
    let code = super::read_source(source)?;
    let report = SecurityChecker::new(config)?.check(&code);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.safe {
        println!("OK: no security violations found");
    } else {
        println!("{}", report.message());
        for violation in &report.violations {
            println!("  - {}", violation);
        }
    }

    Ok(if report.safe {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
