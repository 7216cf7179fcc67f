use anyhow::Result;
use colored::Colorize;

use audiobook_meta::config::Config;
use audiobook_meta::metadata::fields;

/// Print the effective per-field precedence after config overrides
pub fn run(config: &Config) -> Result<()> {
    let rules = config.precedence()?;

    println!("Field precedence (first meaningful value wins):");
    println!();

    for (name, _) in fields::ALL {
        let Some(order) = rules.order(name) else {
            println!("  {:<18} {}", name, "(no rule)".dimmed());
            continue;
        };
        let chain = order
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        if rules.is_union(name) {
            println!("  {:<18} {} {}", name, chain, "(union)".dimmed());
        } else {
            println!("  {:<18} {}", name, chain);
        }
    }

    Ok(())
}
