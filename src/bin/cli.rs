use clap::{Parser, Subcommand};
use coldmail_dns::config::Config;
use coldmail_dns::dmarc::DmarcConfig;
use coldmail_dns::mx::EmailPlatform;
use coldmail_dns::orchestrator::{self, SetupEmailDnsConfig};
use coldmail_dns::provider::InMemoryDnsProvider;
use coldmail_dns::resolver::TrustDnsLookup;
use coldmail_dns::spf::{self, LookupOptions};
use coldmail_dns::store::InMemoryStore;
use coldmail_dns::types::DomainId;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a domain's SPF include chain and report the lookup count.
    SpfResolve {
        #[arg(short, long)]
        domain: String,
    },
    /// Provision the default email-DNS record set for a domain against
    /// the in-memory provider/store, for local inspection.
    Provision {
        #[arg(short, long)]
        domain: String,
        #[arg(long, value_enum, default_value = "google-workspace")]
        platform: CliPlatform,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CliPlatform {
    GoogleWorkspace,
    Microsoft365,
}

impl From<CliPlatform> for EmailPlatform {
    fn from(p: CliPlatform) -> Self {
        match p {
            CliPlatform::GoogleWorkspace => EmailPlatform::GoogleWorkspace,
            CliPlatform::Microsoft365 => EmailPlatform::Microsoft365,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::SpfResolve { domain } => {
            let resolver = TrustDnsLookup::new()?;
            let result = spf::resolve_spf(&resolver, &domain, LookupOptions::default()).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("SPF lookup chain for {domain}");
                println!("  Total DNS lookups: {}", result.total_lookups);
                println!("  Exceeds 10-lookup limit: {}", result.exceeds_limit);
                println!("  Resolved IPv4: {}", result.ipv4.len());
                println!("  Resolved IPv6: {}", result.ipv6.len());
                for warning in &result.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        Command::Provision { domain, platform } => {
            let config = Config::default();
            let provider = InMemoryDnsProvider::new();
            let store = InMemoryStore::new();

            let setup_config = SetupEmailDnsConfig {
                domain_id: DomainId::new(),
                domain: domain.clone(),
                zone_handle: format!("zone-{domain}"),
                provider_token: "demo-token".to_string(),
                platform: platform.into(),
                custom_mx: None,
                existing_spf: None,
                additional_includes: vec![],
                dmarc: DmarcConfig {
                    policy: Some(coldmail_dns::dmarc::DmarcPolicy::Quarantine),
                    ..Default::default()
                },
                dkim: None,
                tracking: None,
                skip_duplicates: true,
            };

            let result = orchestrator::setup_email_dns(&setup_config, &[], config.spf_record_cap as u32, &provider, &store, config.default_ttl).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Provisioning email DNS for {domain}");
                println!("  Created: {}", result.successful);
                println!("  Skipped: {}", result.skipped);
                println!("  Failed: {}", result.failed);
                for warning in &result.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
    }

    Ok(())
}
