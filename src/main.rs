use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};
use ethers::types::U256;
use std::str::FromStr;
use swap_router::{utils, Chain, Config, Pool, Result, Route, RoutingError, SwapRouter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swaproute")]
#[command(about = "Find the best multi-hop swap route across constant-product pools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network to use (fuji, alfajores, celo-sepolia); overrides CHAIN
    #[arg(long, global = true)]
    chain: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Output as JSON
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List tokens known for the selected chain
    Tokens,

    /// List pools currently served
    Pools {
        /// Refresh from chain before listing
        #[arg(long)]
        refresh: bool,

        /// Filter by token symbol or address
        #[arg(long)]
        token: Option<String>,
    },

    /// Read live reserves for every known pair
    Refresh {
        /// Write the refreshed set to a snapshot file
        #[arg(long)]
        export: Option<String>,
    },

    /// Find the best swap route
    Route {
        /// Input token symbol or address
        token_in: String,

        /// Output token symbol or address
        token_out: String,

        /// Amount to swap, in whole tokens (e.g. "1.5")
        amount: String,

        /// Maximum number of hops (defaults to MAX_HOPS)
        #[arg(long)]
        max_hops: Option<usize>,

        /// Show this many ranked routes
        #[arg(long, default_value_t = 1)]
        top: usize,

        /// Refresh pools from chain first
        #[arg(long)]
        refresh: bool,

        /// Cross-check the best route with the router's getAmountsOut
        #[arg(long)]
        verify: bool,

        /// Slippage tolerance for the minimum output (defaults to DEFAULT_SLIPPAGE_BPS)
        #[arg(long)]
        slippage_bps: Option<u32>,
    },

    /// Cache management
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Export cache to file
    Export {
        /// Output file path (defaults to CACHE_PATH)
        path: Option<String>,
    },

    /// Import cache from file
    Import {
        /// Input file path (defaults to CACHE_PATH)
        path: Option<String>,
    },

    /// Show cache statistics
    Stats,

    /// Clear cache
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let config = match load_config(cli.chain.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            eprintln!("\nCheck your .env file (CHAIN, RPC_URL, FACTORY_ADDRESS, ROUTER_ADDRESS).");
            std::process::exit(1);
        }
    };

    let router = match SwapRouter::new(config) {
        Ok(router) => router,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Tokens => handle_tokens(&router, cli.json),
        Commands::Pools { refresh, token } => handle_pools(&router, refresh, token.as_deref(), cli.json).await,
        Commands::Refresh { export } => handle_refresh(&router, export.as_deref(), cli.json).await,
        Commands::Route {
            token_in,
            token_out,
            amount,
            max_hops,
            top,
            refresh,
            verify,
            slippage_bps,
        } => {
            let request = RouteRequest {
                token_in,
                token_out,
                amount,
                max_hops,
                top,
                refresh,
                verify,
                slippage_bps,
            };
            handle_route(&router, request, cli.json).await
        }
        Commands::Cache { action } => handle_cache(&router, action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Ignore a second initialisation attempt
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.without_time().try_init()
    };
}

fn load_config(chain: Option<&str>) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(chain) = chain {
        config.chain = Chain::from_str(chain)?;
        if std::env::var("RPC_URL").is_err() {
            config.rpc_url = config.chain.default_rpc_url().to_string();
        }
    }
    Ok(config)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RoutingError::Other(anyhow::anyhow!("JSON error: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_banner(title: &str) {
    println!("\n{}", "━".repeat(60).bright_cyan());
    println!("  {}", title.bright_cyan().bold());
    println!("{}", "━".repeat(60).bright_cyan());
}

fn handle_tokens(router: &SwapRouter, json_output: bool) -> Result<()> {
    let tokens = router.registry().all();

    if json_output {
        let output: Vec<serde_json::Value> = tokens
            .iter()
            .map(|t| {
                serde_json::json!({
                    "symbol": t.symbol,
                    "name": t.name,
                    "address": format!("{:?}", t.address),
                    "decimals": t.decimals,
                    "native": t.is_native(),
                })
            })
            .collect();
        return print_json(&serde_json::Value::Array(output));
    }

    let chain = router.config().chain;
    print_banner(&format!("Tokens on {} (native {})", chain, chain.native_symbol()));
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "Name", "Address", "Decimals"]);
    for token in &tokens {
        let address = if token.is_native() {
            "native".to_string()
        } else {
            format!("{:?}", token.address)
        };
        table.add_row(vec![
            token.symbol.bright_cyan().to_string(),
            token.name.clone(),
            address.bright_black().to_string(),
            token.decimals.to_string(),
        ]);
    }
    println!("{}\n", table);
    Ok(())
}

async fn handle_pools(router: &SwapRouter, refresh: bool, token_filter: Option<&str>, json_output: bool) -> Result<()> {
    if refresh {
        router.refresh_all_pools().await?;
    }

    let pools: Vec<Pool> = match token_filter {
        Some(token) => {
            let info = router.resolve_token(token)?;
            let address = router.registry().routing_address(&info)?;
            router.pools_with_token(address)
        }
        None => router.list_pools().to_vec(),
    };

    if json_output {
        let output: Vec<serde_json::Value> = pools.iter().map(|p| pool_json(router, p)).collect();
        return print_json(&serde_json::Value::Array(output));
    }

    if pools.is_empty() {
        println!("\n  {}", "No pools found".bright_yellow().bold());
        println!("  {}", "Tip: set FACTORY_ADDRESS and run `swaproute refresh`".bright_black());
        println!();
        return Ok(());
    }

    print_banner(&format!("Pools - {}", pools.len()));
    println!();
    print_pool_table(router, &pools);
    Ok(())
}

fn pool_json(router: &SwapRouter, pool: &Pool) -> serde_json::Value {
    let registry = router.registry();
    serde_json::json!({
        "dex": pool.dex_name,
        "pair": pool.pair_address.map(|a| format!("{:?}", a)),
        "token0": registry.label(&pool.token0),
        "token1": registry.label(&pool.token1),
        "reserve0": pool.reserve0.to_string(),
        "reserve1": pool.reserve1.to_string(),
        "fee_bps": pool.fee_bps,
        "source": pool.source.to_string(),
        "last_updated": pool.last_updated,
    })
}

fn print_pool_table(router: &SwapRouter, pools: &[Pool]) {
    let registry = router.registry();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "DEX".bright_white().bold().to_string(),
        "Pair".bright_white().bold().to_string(),
        "Reserve0".bright_white().bold().to_string(),
        "Reserve1".bright_white().bold().to_string(),
        "Fee".bright_white().bold().to_string(),
        "Source".bright_white().bold().to_string(),
    ]);

    for pool in pools {
        let source = match pool.source {
            swap_router::PoolSource::OnChain => pool.source.to_string().bright_green(),
            swap_router::PoolSource::Fallback => pool.source.to_string().bright_yellow(),
        };
        table.add_row(vec![
            pool.dex_name.bright_cyan().to_string(),
            format!("{}/{}", registry.label(&pool.token0), registry.label(&pool.token1)),
            utils::format_token_amount(pool.reserve0, registry.decimals(&pool.token0)),
            utils::format_token_amount(pool.reserve1, registry.decimals(&pool.token1)),
            format!("{:.2}%", pool.fee_bps as f64 / 100.0),
            source.to_string(),
        ]);
    }

    println!("{}\n", table);
}

async fn handle_refresh(router: &SwapRouter, export: Option<&str>, json_output: bool) -> Result<()> {
    let report = router.refresh_all_pools().await?;

    if let Some(path) = export {
        router.export_cache(path)?;
    }

    if json_output {
        return print_json(&serde_json::json!({
            "refreshed": report.refreshed,
            "retained": report.retained,
            "missing": report.missing,
            "carried": report.carried,
            "total_pools": report.total_pools,
        }));
    }

    print_banner("Pool Refresh");
    println!("  Refreshed: {}", report.refreshed.to_string().bright_green().bold());
    println!("  Retained:  {}", report.retained.to_string().bright_yellow());
    println!("  Missing:   {}", report.missing.to_string().bright_black());
    println!("  Carried:   {}", report.carried.to_string().bright_black());
    println!("  Total:     {}", report.total_pools.to_string().bright_white().bold());
    if let Some(path) = export {
        println!("  Saved to:  {}", path.bright_cyan());
    }
    println!();
    Ok(())
}

struct RouteRequest {
    token_in: String,
    token_out: String,
    amount: String,
    max_hops: Option<usize>,
    top: usize,
    refresh: bool,
    verify: bool,
    slippage_bps: Option<u32>,
}

async fn handle_route(router: &SwapRouter, request: RouteRequest, json_output: bool) -> Result<()> {
    if request.refresh {
        router.refresh_all_pools().await?;
    }

    let amount_in = router.parse_amount(&request.token_in, &request.amount)?;
    let max_hops = request.max_hops.unwrap_or(router.config().max_hops);
    let slippage_bps = request.slippage_bps.unwrap_or(router.config().default_slippage_bps);

    let routes = router.find_top_routes(
        &request.token_in,
        &request.token_out,
        amount_in,
        max_hops,
        request.top.max(1),
    )?;

    let Some(best) = routes.first() else {
        if json_output {
            return print_json(&serde_json::json!({ "route": null }));
        }
        println!(
            "\n  {} {} → {} within {} hop(s)\n",
            "No route found:".bright_yellow().bold(),
            request.token_in,
            request.token_out,
            max_hops
        );
        return Ok(());
    };

    let on_chain = if request.verify {
        Some(router.quote_on_chain(best).await?)
    } else {
        None
    };

    if json_output {
        let output: Vec<serde_json::Value> = routes
            .iter()
            .map(|route| route_json(router, route, slippage_bps))
            .collect();
        return print_json(&serde_json::json!({
            "routes": output,
            "on_chain_amount_out": on_chain.map(|v| v.to_string()),
        }));
    }

    for (rank, route) in routes.iter().enumerate() {
        print_route(router, route, rank + 1, slippage_bps);
    }

    if let Some(expected) = on_chain {
        let decimals = router.registry().decimals(&best.token_out);
        let matches = expected == best.amount_out;
        println!(
            "  {} {} {}",
            "On-chain quote:".bright_white().bold(),
            utils::format_token_amount(expected, decimals).bright_green(),
            if matches {
                "(matches)".bright_green()
            } else {
                "(differs from cached reserves)".bright_yellow()
            }
        );
        println!();
    }

    Ok(())
}

fn route_json(router: &SwapRouter, route: &Route, slippage_bps: u32) -> serde_json::Value {
    let registry = router.registry();
    serde_json::json!({
        "path": route.path().iter().map(|t| registry.label(t)).collect::<Vec<_>>(),
        "hops": route.hop_count(),
        "amount_in": route.amount_in.to_string(),
        "amount_out": route.amount_out.to_string(),
        "min_amount_out": route.min_amount_out(slippage_bps).to_string(),
        "rate": route.exchange_rate(),
        "price_impact_bps": route.price_impact_bps,
        "pools": route.edges.iter().map(|e| e.pool_key.clone()).collect::<Vec<_>>(),
    })
}

fn print_route(router: &SwapRouter, route: &Route, rank: usize, slippage_bps: u32) {
    let registry = router.registry();
    let in_decimals = registry.decimals(&route.token_in);
    let out_decimals = registry.decimals(&route.token_out);
    let in_symbol = registry.label(&route.token_in);
    let out_symbol = registry.label(&route.token_out);

    let title = if rank == 1 {
        "Best Route Found".to_string()
    } else {
        format!("Route #{}", rank)
    };
    println!();
    println!("{}", "━".repeat(60).bright_green());
    println!("  {}", title.bright_green().bold());
    println!("{}", "━".repeat(60).bright_green());
    println!();

    println!("  {}", "Route Path:".bright_white().bold());
    println!("    {}", route.describe(|t| registry.label(t)).bright_cyan());
    println!(
        "  {} {}",
        format!("Hops: {}", route.hop_count()).bright_white().bold(),
        if route.hop_count() == 1 { "hop" } else { "hops" }.bright_black()
    );
    println!();

    println!(
        "  {} {} {}",
        "Input:".bright_white().bold(),
        utils::format_token_amount(route.amount_in, in_decimals).bright_cyan().bold(),
        in_symbol.bright_cyan()
    );
    println!(
        "  {} {} {}",
        "Output:".bright_white().bold(),
        utils::format_token_amount(route.amount_out, out_decimals).bright_green().bold(),
        out_symbol.bright_green()
    );
    println!(
        "  {} {} {} ({:.2}% slippage)",
        "Minimum:".bright_white().bold(),
        utils::format_token_amount(route.min_amount_out(slippage_bps), out_decimals).bright_yellow(),
        out_symbol.bright_yellow(),
        slippage_bps as f64 / 100.0
    );

    // Exchange rate adjusted for decimals
    let amount_in = utils::u256_to_f64(route.amount_in) / 10f64.powi(in_decimals as i32);
    let amount_out = utils::u256_to_f64(route.amount_out) / 10f64.powi(out_decimals as i32);
    let rate = if amount_in > 0.0 { amount_out / amount_in } else { 0.0 };
    println!(
        "  {} {}",
        "Rate:".bright_white().bold(),
        format!("{:.6} {} per {}", rate, out_symbol, in_symbol).bright_yellow().bold()
    );

    let impact = route.price_impact_percent();
    let impact_str = format!("{:.2}%", impact);
    let colored_impact = if impact < 0.5 {
        impact_str.bright_green()
    } else if impact < 1.0 {
        impact_str.bright_yellow()
    } else {
        impact_str.bright_red()
    };
    println!("  {} {}", "Price Impact:".bright_white().bold(), colored_impact.bold());

    for (token, fee) in route.total_fees() {
        if fee > U256::zero() {
            println!(
                "  {} {} {}",
                "Fee:".bright_white().bold(),
                utils::format_token_amount(fee, registry.decimals(&token)).bright_black(),
                registry.label(&token).bright_black()
            );
        }
    }
    println!();
}

fn handle_cache(router: &SwapRouter, action: CacheAction, json_output: bool) -> Result<()> {
    let default_path = router.config().cache_path.clone();

    match action {
        CacheAction::Export { path } => {
            let path = path.unwrap_or(default_path);
            router.export_cache(&path)?;
            if json_output {
                print_json(&serde_json::json!({ "exported": router.list_pools().len(), "path": path }))?;
            } else {
                println!("\n  {}", "Cache Exported".bright_green().bold());
                println!("  Location: {}", path.bright_cyan());
                println!();
            }
        }
        CacheAction::Import { path } => {
            let path = path.unwrap_or(default_path);
            let count = router.import_cache(&path)?;
            if json_output {
                print_json(&serde_json::json!({ "pools_imported": count }))?;
            } else {
                println!("\n  {}", "Cache Imported".bright_green().bold());
                println!("  Pools loaded: {}", count.to_string().bright_yellow().bold());
                println!("  From: {}", path.bright_cyan());
                println!();
            }
        }
        CacheAction::Stats => {
            let stats = router.cache_stats();
            if json_output {
                print_json(&serde_json::json!({
                    "total_pools": stats.total_pools,
                    "serving_runtime": stats.serving_runtime,
                    "on_chain_pools": stats.on_chain_pools,
                    "fallback_pools": stats.fallback_pools,
                    "dex_counts": stats.dex_counts,
                    "oldest_update": stats.oldest_update,
                }))?;
            } else {
                print_banner("Cache Statistics");
                println!("\n  Total Pools: {}", stats.total_pools.to_string().bright_yellow().bold());
                println!(
                    "  Serving:     {}",
                    if stats.serving_runtime { "runtime cache" } else { "fallback list" }.bright_white()
                );
                println!("  On-chain:    {}", stats.on_chain_pools.to_string().bright_green());
                println!("  Fallback:    {}\n", stats.fallback_pools.to_string().bright_yellow());

                if !stats.dex_counts.is_empty() {
                    println!("  Pools by DEX:");
                    for (dex, count) in stats.dex_counts {
                        println!("    {} {}: {}", "•".bright_cyan(), dex.bright_white().bold(), count.to_string().bright_yellow());
                    }
                    println!();
                }
            }
        }
        CacheAction::Clear => {
            // Each invocation starts from the fallback list, so this only
            // matters for snapshots exported afterwards in the same process
            router.clear_pool_cache();
            if !json_output {
                println!("\n  {}", "Cache Cleared".bright_green().bold());
                println!("  Serving {} fallback pools", router.list_pools().len());
                println!();
            }
        }
    }

    Ok(())
}
