use anyhow::{bail, Result};
use std::path::Path;

use audiobook_meta::config::Config;
use audiobook_meta::tracker::mapper_for;
use audiobook_meta::validate::{profile_for, Validator};

pub fn run(config: &Config, path: &Path, tracker: &str, offline: bool) -> Result<()> {
    let (Some(mapper), Some(profile)) = (mapper_for(tracker), profile_for(tracker)) else {
        bail!("Unknown tracker: {}", tracker);
    };

    let record = super::extract_record(config, path, offline)?;

    // Mappers expect a validated record
    let result = Validator::new(config.validation_rules()?).validate_for(&record, profile.as_ref());
    if !result.valid {
        super::validate::print_result(&result);
    }
    result.into_result()?;

    let fields = mapper.map(&record)?;
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}
