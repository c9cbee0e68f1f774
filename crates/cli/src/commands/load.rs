//! `jitctx load`: Assemble and print the bundle for one turn.

use jitctx_config::EngineConfig;
use jitctx_context::ContextOrchestrator;
use jitctx_core::{ContextBundle, ContextMetrics};
use serde_json::Value;

pub async fn run(
    input: &str,
    history: Vec<String>,
    context: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let context = parse_context(context)?;

    let mut engine = ContextOrchestrator::from_config(&config).await?;
    let history = (!history.is_empty()).then_some(history.as_slice());
    let (bundle, metrics) = engine.load_context(input, history, context.as_ref()).await?;

    if json {
        let out = serde_json::json!({ "bundle": bundle, "metrics": metrics });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&bundle, &metrics);
    }

    Ok(())
}

fn parse_context(raw: Option<&str>) -> Result<Option<Value>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(Some(value)),
        Ok(_) => Err("--context must be a JSON object".into()),
        Err(e) => Err(format!("Invalid --context JSON: {e}")),
    }
}

fn print_summary(bundle: &ContextBundle, metrics: &ContextMetrics) {
    let pct = if bundle.budget > 0 {
        bundle.total_tokens as f64 / bundle.budget as f64 * 100.0
    } else {
        0.0
    };

    println!("📦 Context bundle: {} phase", bundle.phase);
    println!("─────────────────────────────────────");
    println!(
        "  Tokens:     {} / {} ({:.1}%){}",
        bundle.total_tokens,
        bundle.budget,
        pct,
        if bundle.over_budget { " ⛔ OVER BUDGET" } else { "" }
    );
    println!(
        "  Load time:  {:.2}ms{}",
        metrics.load_time.as_secs_f64() * 1000.0,
        if metrics.cache_hit { " (cached)" } else { "" }
    );

    println!();
    println!("  Skills ({}):", bundle.skills.len());
    for s in &bundle.skills {
        println!(
            "    • {:<32} {:>6} tokens  p{}{}",
            s.name,
            s.tokens,
            s.priority,
            if s.essential { "  essential" } else { "" }
        );
    }

    println!();
    println!("  Documents ({}):", bundle.documents.len());
    for d in &bundle.documents {
        println!(
            "    • {:<32} {:>6} tokens{}",
            d.id,
            d.tokens,
            if d.compressed { "  compressed" } else { "" }
        );
    }

    if metrics.optimized {
        println!();
        println!("  ⚠ Bundle was trimmed to fit the phase budget");
    }
}
