use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use audiobook_meta::config::Config;
use audiobook_meta::validate::{profile_for, ValidationResult, Validator};

pub fn run(
    config: &Config,
    path: &Path,
    tracker: Option<&str>,
    offline: bool,
    json: bool,
) -> Result<()> {
    let profile = match tracker {
        Some(name) => match profile_for(name) {
            Some(profile) => Some(profile),
            None => bail!("Unknown tracker: {}", name),
        },
        None => None,
    };

    let record = super::extract_record(config, path, offline)?;
    let validator = Validator::new(config.validation_rules()?);
    let result = match &profile {
        Some(profile) => validator.validate_for(&record, profile.as_ref()),
        None => validator.validate(&record),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    result.into_result()?;
    Ok(())
}

pub fn print_result(result: &ValidationResult) {
    for issue in &result.errors {
        println!("{} {}", "error:".red().bold(), issue);
    }
    for issue in &result.warnings {
        println!("{} {}", "warning:".yellow(), issue);
    }

    let completeness = format!("{:.0}%", result.completeness * 100.0);
    if result.valid {
        println!("{} (completeness {})", "valid".green().bold(), completeness);
    } else {
        println!("{} (completeness {})", "invalid".red().bold(), completeness);
    }
}
