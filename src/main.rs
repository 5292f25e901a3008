use clap::CommandFactory;
use dnsexit_ddns::args::Args;
use dnsexit_ddns::clients::{self, DdnsProvider, ProviderRegistry, UpdateOutcome};
use dnsexit_ddns::config::Config;
use dnsexit_ddns::ip::{self, IpDetectionMethod};
use dnsexit_ddns::state::{self, StateManager};
use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

fn init_logger(verbose: bool, test: bool, debug: bool, quiet: bool) {
    let log_level = if quiet {
        log::LevelFilter::Error
    } else if debug {
        log::LevelFilter::Debug
    } else if verbose || test {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::builder()
        .filter(None, log_level)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::new();

    init_logger(args.verbose, args.test, args.debug, args.quiet);

    // Load and merge configuration
    let config = Config::load(&args)?;

    // Display help if no host is configured
    if config.dns_records().is_empty() {
        println!("Missing required argument: host (use --host)");
        Args::command().print_help()?;
        return Ok(());
    }
    config.validate()?;

    let registry = ProviderRegistry::builtin();
    let provider = registry.create_client(config.provider_name())?;
    provider.validate_config(&config)?;

    log::info!("Using provider: {}", provider.provider_name());

    let cache_path = args.cache.as_ref().map(PathBuf::from);
    let mut state_manager = StateManager::new(cache_path)?;

    let Some(period) = config.period else {
        return run_cycle(provider.as_ref(), &config, &mut state_manager, &args);
    };

    log::info!("Checking every {}s", period);
    loop {
        if let Err(e) = run_cycle(provider.as_ref(), &config, &mut state_manager, &args) {
            log::error!("Update cycle failed: {}", e);
        }
        thread::sleep(Duration::from_secs(period));
    }
}

/// Check the public IP once and update every alias that needs it.
fn run_cycle(
    provider: &dyn DdnsProvider,
    config: &Config,
    state_manager: &mut StateManager,
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    let method = IpDetectionMethod::from_config(config);
    let ip = ip::get_ip_with_method(&method, provider.info())?;
    log::info!("IP address: {}", ip);

    for alias in config.dns_records() {
        let ip_changed = state_manager.get(&alias).map_or(true, |s| s.ip_changed(ip));
        let (should, reason) = state_manager.should_update(
            &alias,
            ip_changed,
            args.force,
            state::DEFAULT_MAX_INTERVAL,
        );

        if !should {
            log::info!("{}: {} ({}), skipping update", alias, reason.unwrap_or_default(), ip);
            continue;
        }
        if let Some(reason) = reason {
            log::info!("{}: {}", alias, reason);
        }

        if args.test {
            log::info!("TEST MODE: Would update {} to {}", alias, ip);
            continue;
        }

        let ctx = config.update_context(&alias, provider.info());
        match clients::send_update(provider, &ctx, config.request_capacity()) {
            Ok(outcome) => {
                match outcome {
                    UpdateOutcome::Success => log::info!("Successfully updated {} to {}", alias, ip),
                    UpdateOutcome::NoChange => log::info!("{}: already set to {} (no change)", alias, ip),
                    UpdateOutcome::RetryLater => log::warn!("{}: update not accepted, retrying at next check", alias),
                }
                state_manager.get_mut(&alias).record(ip, outcome);
            }
            Err(e) => {
                log::error!("Failed to update {}: {}", alias, e);
                state_manager.get_mut(&alias).update_failure(&e.to_string());
            }
        }
    }

    if !args.test {
        state_manager.save()?;
    }

    Ok(())
}
