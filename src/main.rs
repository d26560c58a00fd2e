//! 手牌分析示範程式
//!
//! 用法：`nmjl_engine [--charleston] [--json] [tile ...]`
//! 未給手牌時以 `NMJL_SEED`（預設 2025）隨機發 14 張。
//! `NMJL_CORPUS` 指定外部語料，否則使用內建 2025 卡片。

use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nmjl_engine::game::{deal_hand, HAND_TILE_COUNT};
use nmjl_engine::service::{AnalysisRequest, GameContext, HandAnalysis, HandAnalyzer, VariationStore};
use nmjl_engine::EngineConfig;

const DEFAULT_SEED: u64 = 2025;
const DEMO_WALL_REMAINING: u16 = 80;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let store = match std::env::var("NMJL_CORPUS") {
        Ok(path) => {
            info!(%path, "loading external corpus");
            VariationStore::load(path).await?
        }
        Err(_) => VariationStore::builtin()?,
    };
    let analyzer = HandAnalyzer::new(Arc::new(store), config);

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let charleston = args.iter().any(|a| a == "--charleston");
    let json = args.iter().any(|a| a == "--json");
    args.retain(|a| !a.starts_with("--"));

    let context = if charleston {
        GameContext::charleston()
    } else {
        GameContext::gameplay(DEMO_WALL_REMAINING)
    };

    let request = if args.is_empty() {
        let seed = std::env::var("NMJL_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);
        let mut rng = StdRng::seed_from_u64(seed);
        info!(seed, "dealing a random hand");
        AnalysisRequest::new(deal_hand(&mut rng, HAND_TILE_COUNT), context)?
    } else {
        AnalysisRequest::from_ids(&args, context)?
    };

    let result = analyzer.analyze(&request);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&request, &result);
    }
    Ok(())
}

fn print_summary(request: &AnalysisRequest, result: &HandAnalysis) {
    let hand: Vec<String> = request.hand().iter().map(ToString::to_string).collect();
    println!("Hand ({}): {}", hand.len(), hand.join(" "));
    println!("Overall score: {:.1}", result.overall_score);

    println!();
    println!("Top patterns:");
    for r in &result.top_patterns {
        println!(
            "  {:<8} {:<22} {:>5.1} = {:>4.1} + {:>4.1} + {:>4.1}  [{}] {}/14",
            r.pattern.id.as_str(),
            r.pattern.display,
            r.total_score,
            r.current_tile_score,
            r.availability_score,
            r.priority_score,
            r.tier.as_str(),
            r.best.tiles_matched,
        );
    }

    println!();
    println!("Tiles:");
    for rec in &result.tile_recommendations {
        println!(
            "  {:<6} x{} {:<8} {:>3}% p{:<2} {}",
            rec.tile.to_string(),
            rec.count,
            format!("{:?}", rec.action).to_lowercase(),
            rec.confidence,
            rec.priority,
            rec.reasoning,
        );
    }

    if !result.strategic_advice.is_empty() {
        println!();
        println!("Advice:");
        for line in &result.strategic_advice {
            println!("  - {line}");
        }
    }
}
