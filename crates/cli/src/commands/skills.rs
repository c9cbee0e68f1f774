//! `jitctx skills`: Inspect the skill index.

use jitctx_config::EngineConfig;
use jitctx_context::ContextOrchestrator;
use jitctx_core::{Phase, SkillInfo};

pub async fn run(phase: Option<Phase>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let engine = ContextOrchestrator::from_config(&config).await?;
    let index = engine.skill_index();

    if index.is_empty() {
        println!("No skills found in {}", config.effective_skills_dir().display());
        return Ok(());
    }

    match phase {
        Some(phase) => {
            let phase_config = engine.detector().get_phase_config(phase)?;
            let selected = index.filter_skills(phase_config, phase_config.max_tokens);
            let used: usize = selected.iter().map(|s| s.estimated_tokens).sum();

            println!("🎯 Selection for {phase} ({used} / {} tokens)", phase_config.max_tokens);
            println!("─────────────────────────────────────");
            for skill in &selected {
                print_skill(skill, phase_config.is_essential_skill(&skill.name));
            }
            println!();
            println!("  {} of {} skills selected", selected.len(), index.len());
        }
        None => {
            println!("📚 Skills in {}", config.effective_skills_dir().display());
            println!("─────────────────────────────────────");
            for skill in index.skills() {
                print_skill(skill, false);
            }
            println!();
            println!("  {} skills", index.len());
        }
    }

    Ok(())
}

fn print_skill(skill: &SkillInfo, essential: bool) {
    let categories: Vec<&str> = skill.categories.iter().map(String::as_str).collect();
    println!(
        "  {:<32} {:>6} tokens  p{}  [{}]{}",
        skill.name,
        skill.estimated_tokens,
        skill.priority,
        categories.join(", "),
        if essential { "  essential" } else { "" }
    );
}
