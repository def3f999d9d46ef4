use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sigwalk::config::ResolverConfig;
use sigwalk::dns::common::{fqdn_to_labels, name_wire_len, normalize_name};
use sigwalk::dns::enums::DNSResourceType;
use sigwalk::error::{Result, SigwalkError};
use sigwalk::output::{query_time_line, render};
use sigwalk::Resolver;

/// Exit status for bad arguments or configuration (sysexits EX_USAGE).
const EXIT_USAGE: u8 = 64;
const EXIT_UNKNOWN: u8 = 3;

/// Resolve a name from the root down, validating DNSSEC at every delegation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name to resolve
    hostname: String,

    /// Record type, e.g. A, AAAA, NS, MX, TXT, DS, DNSKEY
    record_type: DNSResourceType,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help and --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let (name, config, runtime) = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(e @ SigwalkError::Io(_)) => {
            error!("{}", e);
            return ExitCode::from(EXIT_UNKNOWN);
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    debug!("Root servers: {:?}", config.root_servers);

    let start = Instant::now();
    let resolver = Resolver::from_config(&config);
    debug!(
        "Trust anchor: root KSK {}",
        resolver.trust_anchor().ksk().key_tag()
    );
    let resolution = runtime.block_on(resolver.resolve(&name, args.record_type));

    print!("{}", render(&resolution));
    println!("{}", query_time_line(start.elapsed()));

    debug!(
        "Validated chain {:?} in {} hops",
        resolution.chain, resolution.hops
    );
    ExitCode::from(resolution.outcome.status().exit_code() as u8)
}

/// Checked query name, configuration and runtime.
fn prepare(args: &Args) -> Result<(String, ResolverConfig, tokio::runtime::Runtime)> {
    let name = check_hostname(&args.hostname)?;
    let config = ResolverConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok((name, config, runtime))
}

fn check_hostname(hostname: &str) -> Result<String> {
    let name = normalize_name(hostname);
    let labels = fqdn_to_labels(&name);
    if labels.iter().any(|l| l.len() > 63) {
        return Err(SigwalkError::InvalidQuery(format!(
            "label longer than 63 octets in {}",
            hostname
        )));
    }
    if name_wire_len(&labels) > 255 {
        return Err(SigwalkError::InvalidQuery(format!("{} is too long", hostname)));
    }
    Ok(name)
}
