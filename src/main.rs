use anyhow::Context;
use callscreen::classifier::CallClassifier;
use callscreen::config::DEFAULT_CONFIG_PATH;
use callscreen::fanout::{CallEvent, Fanout};
use callscreen::lifecycle::CallCoordinator;
use callscreen::lists::PhoneLists;
use callscreen::models::{CallAction, CallRecord};
use callscreen::rules::{CandidateCall, RuleSet};
use callscreen::simulator::TrafficGenerator;
use callscreen::statistics::CallStatistics;
use callscreen::store::{CallStore, SqliteStore};
use callscreen::{Classification, Config};
use chrono::Utc;
use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use std::process;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("callscreen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inbound call screening: allow/deny lists, spam heuristics, voice screening")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show call metrics")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-rules")
                .long("list-rules")
                .help("List classification rules and thresholds")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-entries")
                .long("list-entries")
                .help("List whitelist and blacklist entries")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("classify")
                .long("classify")
                .value_name("NUMBER")
                .help("Show how a caller would be classified (nothing is recorded)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("to")
                .long("to")
                .value_name("NUMBER")
                .help("Destination number for --classify")
                .requires("classify")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .value_name("N")
                .help("Generate N synthetic calls")
                .value_parser(clap::value_parser!(u32))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("ID")
                .help("Simulation profile for --simulate (random when omitted)")
                .requires("simulate")
                .value_parser(clap::value_parser!(i64))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run the traffic generator and print the live call feed until Ctrl-C")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("MS")
                .help("Generator interval for --demo")
                .requires("demo")
                .value_parser(clap::value_parser!(u64))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    if let Err(e) = run(&matches, config).await {
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, config: Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.database_path, &config)
        .with_context(|| format!("Failed to open call database {}", config.database_path))?;

    if matches.get_flag("stats") {
        return show_stats(&store);
    }
    if matches.get_flag("list-rules") {
        return list_rules(&store);
    }
    if matches.get_flag("list-entries") {
        return list_entries(&store);
    }
    if let Some(number) = matches.get_one::<String>("classify") {
        let to = matches.get_one::<String>("to").map(String::as_str).unwrap_or("");
        return classify_number(&store, &config, number, to);
    }

    let config = Arc::new(config);
    let fanout = Arc::new(Fanout::new(config.fanout.subscriber_buffer));
    let coordinator = Arc::new(CallCoordinator::new(
        Arc::new(store),
        fanout,
        Arc::clone(&config),
    ));

    if let Some(count) = matches.get_one::<u32>("simulate") {
        let profile = matches.get_one::<i64>("profile").copied();
        return simulate(coordinator, *count, profile);
    }
    if matches.get_flag("demo") {
        let interval = matches.get_one::<u64>("interval").copied();
        return run_demo(coordinator, interval).await;
    }

    cli().print_help().context("Failed to print help")?;
    println!();
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();
    match config.validate() {
        Ok(()) => {
            println!("Database: {}", config.database_path);
            println!(
                "History window: {} minutes",
                config.policy.history_window_minutes
            );
            println!("Stores: {}", config.store_names().len());
            println!("Rules: {}", config.rules.len());
            for seed in &config.rules {
                let state = if seed.enabled { "enabled" } else { "disabled" };
                println!("  • {} (threshold {}, {state})", seed.rule, seed.threshold);
            }
            println!("Simulation profiles: {}", config.profiles.len());
            println!("Seed list entries: {}", config.lists.len());
            println!("✅ Configuration is valid");
        }
        Err(e) => {
            println!("❌ Configuration validation failed:");
            println!("Error: {e}");
            process::exit(1);
        }
    }
}

fn show_stats(store: &dyn CallStore) -> anyhow::Result<()> {
    let metrics = CallStatistics::metrics(store).context("Failed to get call metrics")?;

    println!("📊 Call Screening Statistics");
    println!("═══════════════════════════════════════");
    println!();
    println!("  Total Calls: {}", metrics.total);
    println!("  ├─ Blocked: {} ({}%)", metrics.blocked, metrics.blocked_pct);
    println!("  └─ Allowed: {} ({}%)", metrics.allowed, metrics.allowed_pct);
    println!();
    println!("🏷️  By Classification:");
    for classification in Classification::ALL {
        println!(
            "  {:<14} {:>7}",
            classification.as_str(),
            metrics.by_classification.get(classification)
        );
    }
    println!();
    println!("🔎 Reviewer Feedback:");
    println!("  False positives: {}", metrics.false_positives);
    println!("  False negatives: {}", metrics.false_negatives);
    Ok(())
}

fn list_rules(store: &dyn CallStore) -> anyhow::Result<()> {
    let rules = store.rules().context("Failed to load rules")?;
    let active = RuleSet::from_rules(&rules);
    println!("📋 Classification Rules");
    println!("═══════════════════════════════════════");
    println!("  Enabled: {} of {}", active.len(), rules.len());
    if active.is_empty() {
        println!("  ⚠️  All rules are disabled; only list entries affect decisions");
    }
    for rule in &rules {
        let status = if rule.enabled { "✅" } else { "⏸️ " };
        println!(
            "  {} [{}] {:<20} threshold {}",
            status,
            rule.id,
            rule.rule.as_str(),
            rule.threshold
        );
    }
    Ok(())
}

fn list_entries(store: &dyn CallStore) -> anyhow::Result<()> {
    let entries = PhoneLists::entries(store, None).context("Failed to load list entries")?;
    if entries.is_empty() {
        println!("📭 No list entries");
        return Ok(());
    }
    println!("📋 Phone Lists ({} entries)", entries.len());
    println!("═══════════════════════════════════════");
    for entry in entries {
        println!(
            "  [{}] {:<16} {:<9} {}",
            entry.id,
            entry.phone_number,
            entry.list_type.as_str(),
            entry.label.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn classify_number(
    store: &dyn CallStore,
    config: &Config,
    number: &str,
    to: &str,
) -> anyhow::Result<()> {
    let candidate = CandidateCall::inbound(number, Some(config.store_name_for(to)));
    let classified =
        CallClassifier::classify(store, &candidate, config.policy.history_window(), Utc::now())
            .context("Classification failed")?;
    let decision = &classified.decision;

    println!("📞 {}", callscreen::PhoneNumber::display(number));
    println!("  Store: {}", candidate.to_store.as_deref().unwrap_or("-"));
    println!("  List status: {}", classified.verdict.caller_status());
    for flag in &classified.flags {
        println!("  ⚠️  {flag}");
    }
    println!(
        "  {} {} ({})",
        action_icon(decision.action),
        decision.classification,
        decision.reason
    );
    Ok(())
}

fn simulate(
    coordinator: Arc<CallCoordinator>,
    count: u32,
    profile: Option<i64>,
) -> anyhow::Result<()> {
    let generator = TrafficGenerator::new(coordinator);
    for _ in 0..count {
        let record = generator
            .generate_call(profile)
            .context("Failed to generate call")?;
        print_call(&record, None);
    }
    println!();
    println!("✅ Generated {} calls", generator.status().call_count);
    Ok(())
}

async fn run_demo(coordinator: Arc<CallCoordinator>, interval: Option<u64>) -> anyhow::Result<()> {
    let mut subscription = coordinator.fanout().subscribe();
    let generator = TrafficGenerator::new(Arc::clone(&coordinator));
    generator
        .start(interval)
        .context("Failed to start traffic generator")?;
    println!("🚀 Demo running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = subscription.receiver.recv() => match event {
                Some(CallEvent::CallDecided { record, caller_label }) => {
                    print_call(&record, caller_label.as_deref());
                }
                Some(CallEvent::AutoWhitelisted { phone_number, .. }) => {
                    println!("⭐ {phone_number} auto-whitelisted");
                }
                None => break,
            },
        }
    }

    generator.stop();
    coordinator.fanout().unsubscribe(subscription.id);
    println!();
    println!("🛑 Demo stopped after {} calls", generator.status().call_count);
    Ok(())
}

fn action_icon(action: CallAction) -> &'static str {
    match action {
        CallAction::Blocked => "🚫",
        CallAction::Allowed => "✅",
    }
}

fn print_call(record: &CallRecord, label: Option<&str>) {
    println!(
        "{} {:<16} → {:<24} {:>3}s  {:<13} {}{}",
        action_icon(record.action),
        record.from_number,
        record.to_store.as_deref().unwrap_or("-"),
        record.duration_seconds.unwrap_or(0),
        record.classification.as_str(),
        record.reason,
        label.map(|l| format!(" [{l}]")).unwrap_or_default()
    );
}
