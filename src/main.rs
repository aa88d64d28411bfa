// Business Exit Platform - CLI
// Offline access to the valuation, matching, transfer and wizard engines

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;

use exit_platform::{
    format_currency, quick_estimate, BusinessProfile, FinancialRecord, MatchEngine, StepCatalog,
    StepGuidance, TransferCatalog, ValuationEngine,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("value") => run_valuation(&args[2..])?,
        Some("quick") => run_quick(&args[2..])?,
        Some("match") => run_match(&args[2..])?,
        Some("transfer") => run_transfer(&args[2..])?,
        Some("step") => run_step(&args[2..])?,
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("💼 Business Exit Platform v{}", exit_platform::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Usage:");
    println!("  exit-platform value <financials.json> [method]   Full valuation (method: auto, revenue_multiple, ebitda_multiple, dcf, asset_based)");
    println!("  exit-platform quick <financials.json>            Quick 3x-EBITDA estimate");
    println!("  exit-platform match <sector> <location> <value>  Top anonymized buyers");
    println!("  exit-platform transfer <business_type>           Transfer checklist");
    println!("  exit-platform step <n>                           Listing wizard guidance (0-based)");
}

fn load_financials(path: &str) -> Result<FinancialRecord> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path))?;
    Ok(FinancialRecord::from_json(&value)?)
}

fn run_valuation(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("value: missing <financials.json>");
    };
    let method = args.get(1).map(String::as_str).unwrap_or("auto");

    println!("💰 Valuation Engine");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let data = load_financials(path)?;
    let result = ValuationEngine::new().calculate_valuation(&data, method)?;

    println!("\n✓ {}", result.summary());
    println!("   Method:     {}", result.method);
    println!("   Confidence: {:.0}%", result.confidence_score * 100.0);
    for (key, value) in &result.method_details {
        println!("   {:<20} {}", key, value);
    }

    Ok(())
}

fn run_quick(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("quick: missing <financials.json>");
    };

    let data = load_financials(path)?;
    println!("⚡ Quick estimate: {}", format_currency(quick_estimate(&data)));

    Ok(())
}

fn run_match(args: &[String]) -> Result<()> {
    let [sector, location, valuation, ..] = args else {
        bail!("match: expected <sector> <location> <valuation>");
    };
    let valuation: f64 = valuation
        .parse()
        .with_context(|| format!("Invalid valuation: {}", valuation))?;

    println!("🤝 Match Engine");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let engine = MatchEngine::default();
    let matches = engine.find_matches(&BusinessProfile::new(sector, location, valuation));

    if matches.is_empty() {
        println!("\n⚠️  No buyers above the match threshold");
        return Ok(());
    }

    println!("\n✓ {} investors matched", matches.len());
    for m in &matches {
        println!(
            "   {}  {:>4.0}%  {}  ({} - {})",
            m.anonymized_id,
            m.match_score * 100.0,
            m.buyer.buyer_type.as_str(),
            format_currency(m.buyer.min_investment),
            format_currency(m.buyer.max_investment),
        );
    }

    Ok(())
}

fn run_transfer(args: &[String]) -> Result<()> {
    let business_type = args.first().map(String::as_str).unwrap_or("private_limited");

    println!("📋 Transfer Checklist: {}", business_type);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let plan = TransferCatalog::new().get_transfer_plan(business_type);
    if plan.business_type.is_none() {
        println!("\n⚠️  Unknown business type, showing generic documents only");
    }

    for (i, item) in plan.checklist.iter().enumerate() {
        println!("   {}. {}", i + 1, item);
    }
    println!("\n📄 Documents required:");
    for doc in &plan.documents_required {
        println!("   - {}", doc);
    }
    println!("\n⏱️  Estimated timeline: {}", plan.estimated_timeline);

    Ok(())
}

fn run_step(args: &[String]) -> Result<()> {
    let step: usize = match args.first() {
        Some(raw) => raw.parse().with_context(|| format!("Invalid step: {}", raw))?,
        None => 0,
    };

    let guidance = StepCatalog::new().advance(step, &serde_json::Value::Null);
    match &guidance {
        StepGuidance::InProgress {
            total_steps,
            step_name,
            requirements,
            ..
        } => {
            println!("🧭 {} ({}/{})", step_name, step + 1, total_steps);
            println!("   {}", guidance.message());
            for req in requirements {
                println!("   • {}", req);
            }
        }
        StepGuidance::Completed { .. } => println!("✅ {}", guidance.message()),
    }

    Ok(())
}
