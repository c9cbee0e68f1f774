//! `jitctx config`: Configuration management commands.

use jitctx_config::EngineConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match EngineConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            let skills_dir = config.effective_skills_dir();
            if !skills_dir.is_dir() {
                warnings.push(format!(
                    "Skills directory {} does not exist; bundles will carry no skills",
                    skills_dir.display()
                ));
            }

            let phases = config.phase_configs()?;
            let largest = phases.iter().map(|p| p.max_tokens).max().unwrap_or(0);
            if largest > config.budget.max_total_tokens {
                warnings.push(format!(
                    "A phase budget ({largest}) exceeds the global ceiling ({})",
                    config.budget.max_total_tokens
                ));
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Skills:    {}", skills_dir.display());
            println!("   Project:   {}", config.project_root.display());
            println!(
                "   Cache:     {} entries / {} MiB",
                config.cache.max_size, config.cache.max_memory_mb
            );
            println!("   Ceiling:   {} tokens", config.budget.max_total_tokens);
            println!("   Overrides: {}", config.phases.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn defaults() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", EngineConfig::default_toml());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = EngineConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
