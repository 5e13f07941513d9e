use chrono::Utc;
use console::style;
use serde_json::json;

use callscore::analytics::daily_trend;
use callscore::{IntentionDistribution, Orchestrator, Overview};

pub fn cmd_stats(orchestrator: &Orchestrator, days: u32, json: bool) -> anyhow::Result<()> {
    let jobs = orchestrator.list();
    let now = Utc::now();

    let overview = Overview::compute(&jobs, now);
    let distribution = IntentionDistribution::compute(&jobs);
    let trend = daily_trend(&jobs, now.date_naive(), days.max(1));

    if json {
        let report = json!({
            "overview": overview,
            "distribution": distribution,
            "trend": trend,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", style("Overview").bold());
    println!("{}", "-".repeat(40));
    println!("Total jobs:         {}", overview.total);
    println!("Uploads (7 days):   {}", overview.uploads_last_7_days);
    println!("Completed:          {}", overview.completed);
    println!("High intent:        {}", overview.high_intent);

    println!("\n{}", style("Intention").bold());
    println!("{}", "-".repeat(40));
    let total = distribution.total();
    for (label, count) in [
        ("high", distribution.high),
        ("medium", distribution.medium),
        ("low", distribution.low),
    ] {
        let pct = if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        };
        println!("{:<8} {:>5}  {:>5.1}%  {}", label, count, pct, bar(pct));
    }

    println!("\n{}", style("Daily trend (UTC)").bold());
    println!("{}", "-".repeat(40));
    for point in &trend {
        println!(
            "{}  uploads {:>4}  avg score {:>3}",
            point.day, point.uploads, point.avg_score
        );
    }
    Ok(())
}

fn bar(pct: f64) -> String {
    let width = (pct / 5.0).round() as usize;
    style("#".repeat(width)).cyan().to_string()
}
