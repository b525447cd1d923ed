use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chord::node::Node;
use crate::chord::CLIENT_RPC_TIMEOUT;
use crate::error::NetworkError;
use crate::network::grpc::ChordGrpcClient;
use crate::network::resolve_address;

/// Interactive operator console. Returns when the user quits or stdin
/// closes.
pub async fn run(node: Arc<Node>, local_ip: &str) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                println!("\nExiting...");
                return;
            }
            Err(err) => {
                println!("Error reading input: {err}");
                continue;
            }
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        match command {
            "help" => print_help(),
            "ping" => {
                let Some(target) = parts.get(1) else {
                    println!("Usage: ping <address>");
                    continue;
                };
                let target = resolve_address(target, local_ip);
                match ping(&target).await {
                    Ok(()) => println!("Ping successful"),
                    Err(err) => println!("Ping failed: {err}"),
                }
            }
            "Lookup" => {
                let Some(filename) = parts.get(1) else {
                    println!("Usage: Lookup <filename>");
                    continue;
                };
                match node.lookup(filename).await {
                    Ok(result) => match result.value {
                        Some(value) => {
                            println!(
                                "Key '{filename}' (ID: {}) is located at node {}",
                                result.key, result.address
                            );
                            println!("Associated file: {}", String::from_utf8_lossy(&value));
                        }
                        None => println!("file not found"),
                    },
                    Err(err) => println!("Lookup failed: {err}"),
                }
            }
            "StoreFile" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: StoreFile <local path/filename>");
                    continue;
                };
                match node.store_file(path).await {
                    Ok(target) => {
                        println!("File '{path}' stored successfully in the DHT (node {target})")
                    }
                    Err(err) => println!("StoreFile failed: {err}"),
                }
            }
            "dump" | "PrintState" => print!("{}", node.dump()),
            "quit" => {
                println!("Exiting...");
                return;
            }
            _ => println!("Unknown command. Type 'help' for available commands."),
        }
    }
}

async fn ping(address: &str) -> Result<(), NetworkError> {
    ChordGrpcClient::connect_with_timeout(address, CLIENT_RPC_TIMEOUT)
        .await?
        .ping()
        .await
}

fn print_help() {
    println!("Available commands:");
    println!("  help              - Show this help message");
    println!("  ping <address>    - Ping another node");
    println!("                      (You can use :port for localhost)");
    println!("  Lookup <filename> - Find the node responsible for a key");
    println!("  StoreFile <path>  - Store a file in the DHT");
    println!("  dump              - Display info about the current node");
    println!("  quit              - Exit the program");
}
