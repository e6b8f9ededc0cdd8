//! Fabric CLI
//!
//! Command-line front end over the SDK gateway. Each subcommand performs one
//! gateway call and prints its `{status, message, payload}` result as JSON.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fabric_protos::config::{ConfigEnvelope, Organization};
use fabric_protos::{decode, Block, ChaincodeLang};
use fabric_sdk::channel::ChannelSource;
use fabric_sdk::config_update::{ConfigChange, ProposalEnvelope, ProposalSignature};
use fabric_sdk::lifecycle::ChaincodeInstaller;
use fabric_sdk::proposal::collections_from_json;
use fabric_sdk::{ChaincodeDefinition, Ed25519Signer, Gateway, GatewayResponse, Invocation, Signer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

/// Client for endorse, order and commit ledger networks
#[derive(Parser, Debug)]
#[command(name = "fabric")]
#[command(about = "Client for endorse, order and commit ledger networks", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ordering service address
    #[arg(long, global = true)]
    orderer: Option<String>,

    /// Endorsing peer address (repeatable)
    #[arg(long = "peer", global = true)]
    peers: Vec<String>,

    /// Peer used for lifecycle queries and commit confirmation
    #[arg(long, global = true)]
    committer: Option<String>,

    /// File holding the hex encoded ed25519 secret key
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Organization (MSP) id of the signing identity
    #[arg(long, global = true, default_value = "Org1MSP")]
    org_id: String,

    /// Commit wait in milliseconds; 0 returns once ordered
    #[arg(long, global = true)]
    commit_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a chaincode package on every peer
    Install {
        /// Package file
        #[arg(long, conflicts_with = "path")]
        package: Option<PathBuf>,
        /// Chaincode source directory
        #[arg(long, requires = "label")]
        path: Option<PathBuf>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "golang")]
        lang: ChaincodeLang,
    },
    /// Approve a chaincode definition for this organization
    Approve {
        #[arg(long, short = 'c')]
        channel: String,
        #[command(flatten)]
        definition: DefinitionArgs,
        #[arg(long)]
        package_id: Option<String>,
    },
    /// Commit a chaincode definition on the channel
    Commit {
        #[arg(long, short = 'c')]
        channel: String,
        #[command(flatten)]
        definition: DefinitionArgs,
    },
    /// Endorse and order a chaincode call
    Invoke {
        #[arg(long, short = 'c')]
        channel: String,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Evaluate a chaincode call without ordering it
    Query {
        #[arg(long, short = 'c')]
        channel: String,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Create a channel from a config update transaction file
    CreateChannel {
        #[arg(long, short = 'c')]
        channel: String,
        #[arg(long)]
        tx_file: PathBuf,
    },
    /// Join every peer to a channel
    Join {
        #[arg(long, short = 'c')]
        channel: String,
    },
    /// Sign and submit a channel config update
    UpdateChannel {
        /// Defaults to the channel named in the transaction
        #[arg(long, short = 'c', default_value = "")]
        channel: String,
        #[arg(long)]
        tx_file: PathBuf,
    },
    /// List channels joined by the committing peer
    ListChannels,
    /// Fetch a block from the ordering service
    FetchBlock {
        #[arg(long, short = 'c')]
        channel: String,
        /// Block number; newest when omitted
        #[arg(long)]
        number: Option<u64>,
        /// Write the encoded block here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fetch the current channel configuration
    FetchConfig {
        #[arg(long, short = 'c')]
        channel: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Propose a membership change as sponsor and write the proposal for other organizations
    ProposalInitiate {
        #[arg(long, short = 'c')]
        channel: String,
        /// JSON organization definition to add
        #[arg(long, conflicts_with = "remove_org", required_unless_present = "remove_org")]
        add_org: Option<PathBuf>,
        /// Name of the organization to remove
        #[arg(long)]
        remove_org: Option<String>,
        /// Change a consortium of the system channel instead of the channel itself
        #[arg(long)]
        consortium: Option<String>,
        /// Proposal JSON file to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Sign a proposal received from its sponsor
    ProposalSign {
        #[arg(long)]
        proposal: PathBuf,
        /// Signature JSON file to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Submit a proposal with the signatures collected from other organizations
    ProposalSubmit {
        #[arg(long)]
        proposal: PathBuf,
        /// Signature JSON file (repeatable)
        #[arg(long = "signature")]
        signatures: Vec<PathBuf>,
    },
}

fn config_change(
    add_org: Option<PathBuf>,
    remove_org: Option<String>,
    consortium: Option<String>,
) -> Result<ConfigChange> {
    let change = match (add_org, remove_org, consortium) {
        (Some(path), None, None) => ConfigChange::ChannelAddOrg(read_json(&path)?),
        (Some(path), None, Some(consortium)) => ConfigChange::ConsortiumAddOrg {
            consortium,
            org: read_json::<Organization>(&path)?,
        },
        (None, Some(name), None) => ConfigChange::ChannelRemoveOrg(name),
        (None, Some(name), Some(consortium)) => ConfigChange::ConsortiumRemoveOrg { consortium, name },
        _ => bail!("exactly one of --add-org or --remove-org is required"),
    };
    Ok(change)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

#[derive(clap::Args, Debug)]
struct DefinitionArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    version: String,
    #[arg(long)]
    sequence: i64,
    #[arg(long)]
    signature_policy: Option<String>,
    #[arg(long)]
    channel_config_policy: Option<String>,
    /// JSON file with private data collection definitions
    #[arg(long)]
    collections_config: Option<PathBuf>,
    #[arg(long)]
    init_required: bool,
}

impl DefinitionArgs {
    fn into_definition(self) -> Result<ChaincodeDefinition> {
        let mut definition =
            ChaincodeDefinition::new(self.name, self.version, self.sequence).with_init_required(self.init_required);
        if let Some(policy) = self.signature_policy {
            definition = definition.with_signature_policy(policy);
        }
        if let Some(policy) = self.channel_config_policy {
            definition = definition.with_channel_config_policy(policy);
        }
        if let Some(path) = self.collections_config {
            definition = definition.with_collections(collections_from_json(&std::fs::read_to_string(path)?)?);
        }
        Ok(definition)
    }
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// Chaincode name
    #[arg(long, short = 'n')]
    name: String,
    #[arg(long)]
    function: String,
    /// Function argument (repeatable)
    #[arg(long = "arg")]
    args: Vec<String>,
    /// JSON object of base64 encoded private fields
    #[arg(long)]
    transient: Option<String>,
    /// Call the chaincode's init function
    #[arg(long)]
    is_init: bool,
}

impl CallArgs {
    fn into_invocation(self) -> Invocation {
        let args = std::iter::once(self.function)
            .chain(self.args)
            .map(String::into_bytes)
            .collect();
        let mut invocation = Invocation::new(self.name, args).with_init(self.is_init);
        if let Some(transient) = self.transient {
            invocation = invocation.with_transient(transient);
        }
        invocation
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let overrides = config::Overrides {
        orderer: args.orderer.clone(),
        peers: args.peers.clone(),
        committer: args.committer.clone(),
        commit_timeout_ms: args.commit_timeout_ms,
    };
    let sdk_config = config::resolve(args.config.as_deref(), &overrides)?;
    let gateway = Gateway::connect(&sdk_config, load_signer(&args)?)?;

    run(&gateway, args.command).await
}

fn load_signer(args: &Args) -> Result<Arc<dyn Signer>> {
    let signer = match &args.key_file {
        Some(path) => Ed25519Signer::from_key_file(args.org_id.clone(), path)?,
        None => {
            tracing::warn!("No --key-file given, signing as a throwaway {} identity", args.org_id);
            Ed25519Signer::generate(args.org_id.clone())
        }
    };
    Ok(Arc::new(signer))
}

async fn run(gateway: &Gateway, command: Command) -> Result<()> {
    let response = match command {
        Command::Install {
            package,
            path,
            label,
            lang,
        } => {
            let installer = match (package, path, label) {
                (Some(package), _, _) => ChaincodeInstaller::PackageFile(package),
                (None, Some(path), Some(label)) => ChaincodeInstaller::Source { path, label, lang },
                _ => bail!("either --package or --path with --label is required"),
            };
            gateway.install_chaincode(&installer).await?
        }
        Command::Approve {
            channel,
            definition,
            package_id,
        } => {
            gateway
                .approve_chaincode(&channel, definition.into_definition()?, package_id)
                .await?
        }
        Command::Commit { channel, definition } => {
            gateway
                .commit_chaincode(&channel, definition.into_definition()?)
                .await?
        }
        Command::Invoke { channel, call } => gateway.invoke(&channel, call.into_invocation()).await?,
        Command::Query { channel, call } => gateway.query(&channel, call.into_invocation()).await?,
        Command::CreateChannel { channel, tx_file } => {
            gateway
                .create_channel(&channel, &ChannelSource::EnvelopeFile(tx_file))
                .await?
        }
        Command::Join { channel } => gateway.join_channel(&channel).await?,
        Command::UpdateChannel { channel, tx_file } => {
            let envelope = std::fs::read(tx_file)?;
            gateway.update_channel(&channel, &envelope).await?
        }
        Command::ListChannels => gateway.list_channels().await?,
        Command::FetchBlock {
            channel,
            number,
            output,
        } => {
            let response = gateway.fetch_block(&channel, number).await?;
            return match output {
                Some(path) => write_payload(&response, path),
                None => print_json(&decode::<Block>(&response.payload)?),
            };
        }
        Command::ProposalInitiate {
            channel,
            add_org,
            remove_org,
            consortium,
            output,
        } => {
            let change = config_change(add_org, remove_org, consortium)?;
            let response = gateway.proposal_initiate(&channel, &change).await?;
            return write_payload(&response, output);
        }
        Command::ProposalSign { proposal, output } => {
            let proposal: ProposalEnvelope = read_json(&proposal)?;
            let response = gateway.proposal_sign(&proposal)?;
            return write_payload(&response, output);
        }
        Command::ProposalSubmit { proposal, signatures } => {
            let proposal: ProposalEnvelope = read_json(&proposal)?;
            let signatures = signatures
                .iter()
                .map(|path| read_json::<ProposalSignature>(path))
                .collect::<Result<Vec<_>>>()?;
            gateway.proposal_submit(&proposal, &signatures).await?
        }
        Command::FetchConfig { channel, output } => {
            let response = gateway.fetch_config(&channel).await?;
            return match output {
                Some(path) => write_payload(&response, path),
                None => print_json(&decode::<ConfigEnvelope>(&response.payload)?.config),
            };
        }
    };

    print_response(&response)?;
    if !response.is_success() {
        bail!("request failed with status {}: {}", response.status, response.message);
    }
    Ok(())
}

fn print_response(response: &GatewayResponse) -> Result<()> {
    // Text payloads print as is, anything else as hex
    let payload = match std::str::from_utf8(&response.payload) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(&response.payload),
    };
    print_json(&serde_json::json!({
        "status": response.status,
        "message": response.message,
        "payload": payload,
    }))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_payload(response: &GatewayResponse, path: PathBuf) -> Result<()> {
    std::fs::write(&path, &response.payload)?;
    tracing::info!("Wrote {} bytes to {}", response.payload.len(), path.display());
    Ok(())
}
