//! Mini-Chain Relay CLI Application
//!
//! Runs a relay node, or inspects hex-encoded blocks and transactions.

use chrono::Utc;
use clap::{Parser, Subcommand};
use mini_chain_relay::core::identity::{deserialize_block, deserialize_transaction};
use mini_chain_relay::core::{
    get_transaction_sign_hash, verify_input_signatures, Block, Transaction,
};
use mini_chain_relay::crypto::{calculate_merkle_root, ObjectId};
use mini_chain_relay::network::{Node, NodeConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "relay")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Block and transaction relay for a minimal blockchain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// P2P Node operations
    Node {
        #[command(subcommand)]
        action: NodeCommands,
    },

    /// Decode a hex-encoded object and print its identifiers
    Inspect {
        #[command(subcommand)]
        action: InspectCommands,
    },

    /// Write a hex-encoded genesis block paying the given address
    Genesis {
        /// Recipient address (hex, 32 bytes)
        #[arg(short, long)]
        address: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Mining difficulty recorded in the header
        #[arg(short, long, default_value = "8")]
        difficulty: u32,
    },
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Start the P2P node
    Start {
        /// Port to listen on
        #[arg(short, long, default_value = "8333")]
        port: u16,

        /// Initial peers to connect to (comma-separated)
        #[arg(long)]
        peers: Option<String>,
    },
}

#[derive(Subcommand)]
enum InspectCommands {
    /// Inspect a block
    Block {
        /// File holding the block's hex encoding
        file: PathBuf,
    },

    /// Inspect a transaction
    Tx {
        /// File holding the transaction's hex encoding
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Node { action } => run_node_command(action),
        Commands::Inspect { action } => run_inspect_command(action),
        Commands::Genesis {
            address,
            output,
            difficulty,
        } => {
            let recipient = ObjectId::from_hex(&address)?;
            let coinbase = Transaction::coinbase(recipient, 50, Utc::now());
            let block = Block::new(ObjectId::NULL, &[coinbase], difficulty, Utc::now())?;
            let raw = block.to_bytes()?;
            fs::write(&output, hex::encode(&raw))?;

            println!("Genesis block written to {:?}", output);
            println!("   Id: {}", deserialize_block(&raw)?.id);
            Ok(())
        }
    }
}

fn run_node_command(
    action: NodeCommands,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match action {
            NodeCommands::Start { port, peers } => {
                let bootstrap_peers: Vec<String> = peers
                    .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default();

                let config = NodeConfig {
                    port,
                    bootstrap_peers,
                    ..Default::default()
                };

                println!("Starting relay node on port {}...", port);

                let mut node = Node::new(config);

                tokio::spawn(async move {
                    tokio::signal::ctrl_c().await.ok();
                    println!("\nShutting down node...");
                    std::process::exit(0);
                });

                node.start().await?;
            }
        }

        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    })
}

fn read_hex(file: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let text = fs::read_to_string(file)?;
    Ok(hex::decode(text.trim())?)
}

fn run_inspect_command(
    action: InspectCommands,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match action {
        InspectCommands::Block { file } => {
            let raw = read_hex(&file)?;
            let block = deserialize_block(&raw)?;

            println!("Block {}", block.id);
            println!("   Previous:   {}", block.previous_hash);
            println!("   Timestamp:  {}", block.timestamp);
            println!("   Difficulty: {}", block.difficulty);
            println!("   Nonce:      {}", block.nonce);
            println!("   Size:       {} bytes", raw.len());
            println!("   Transactions: {}", block.tx_count());

            if let Some(inline) = &block.transactions {
                let txs = inline
                    .iter()
                    .map(|bytes| deserialize_transaction(bytes))
                    .collect::<Result<Vec<_>, _>>()?;
                let root = calculate_merkle_root(&txs)?;
                let verdict = if root == block.transaction_root_hash {
                    "ok"
                } else {
                    "MISMATCH"
                };
                println!("   Merkle root: {} ({})", root, verdict);
            }
        }

        InspectCommands::Tx { file } => {
            let raw = read_hex(&file)?;
            let tx = deserialize_transaction(&raw)?;

            println!("Transaction {}", tx.id);
            println!("   Sign hash: {}", get_transaction_sign_hash(&raw)?);
            println!("   Inputs:    {}", tx.in_entries.len());
            println!("   Outputs:   {} ({} total)", tx.out_entries.len(), tx.total_output());

            if tx.is_coinbase() {
                println!("   Coinbase: yes");
            } else {
                match verify_input_signatures(&raw) {
                    Ok(true) => println!("   Signatures: valid"),
                    Ok(false) => println!("   Signatures: INVALID"),
                    Err(e) => println!("   Signatures: {}", e),
                }
            }
        }
    }

    Ok(())
}
