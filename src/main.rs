use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use chord_dht::chord::id::Id;
use chord_dht::chord::node::Node;
use chord_dht::chord::workers;
use chord_dht::chord::DEFAULT_SUCCESSOR_LIST_SIZE;
use chord_dht::network::{self, grpc};
use chord_dht::shell;

#[derive(Parser, Debug)]
#[command(name = "chord", version, about = "A Chord DHT node")]
struct Cli {
    /// Bind host, or "local" to use the address on the default route
    #[arg(short = 'a')]
    address: String,

    /// Bind port
    #[arg(short = 'p')]
    port: u16,

    /// Bootstrap host to join (requires --jp)
    #[arg(long = "ja")]
    join_address: Option<String>,

    /// Bootstrap port to join (requires --ja)
    #[arg(long = "jp")]
    join_port: Option<u16>,

    /// Stabilize interval in milliseconds
    #[arg(long = "ts", default_value_t = 333, value_parser = clap::value_parser!(u64).range(1..=6000))]
    stabilize_ms: u64,

    /// Fix-fingers interval in milliseconds
    #[arg(long = "tff", default_value_t = 333, value_parser = clap::value_parser!(u64).range(1..=6000))]
    fix_fingers_ms: u64,

    /// Check-predecessor interval in milliseconds
    #[arg(long = "tcp", default_value_t = 333, value_parser = clap::value_parser!(u64).range(1..=6000))]
    check_predecessor_ms: u64,

    /// Successor-list length
    #[arg(short = 'r', default_value_t = DEFAULT_SUCCESSOR_LIST_SIZE as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    successors: u8,

    /// 40-hex-digit identifier used as the join target instead of hash(self)
    #[arg(short = 'i')]
    identifier: Option<String>,
}

fn parse_identifier(s: &str) -> Result<Id, String> {
    Id::from_hex(s).ok_or_else(|| format!("-i must be exactly 40 hexadecimal digits, got {s:?}"))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            process::exit(1);
        }
    };

    if cli.join_address.is_some() != cli.join_port.is_some() {
        eprintln!("--ja and --jp must be given together");
        process::exit(1);
    }
    let join_target = match cli.identifier.as_deref().map(parse_identifier).transpose() {
        Ok(target) => target,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    if let Err(err) = run(cli, join_target).await {
        error!("{err}");
        process::exit(2);
    }
}

async fn run(cli: Cli, join_target: Option<Id>) -> Result<(), Box<dyn std::error::Error>> {
    let local_ip = network::local_address()?;
    info!("found local address {local_ip}");

    let host = if cli.address == "local" {
        local_ip.clone()
    } else {
        cli.address.clone()
    };
    let address = format!("{host}:{}", cli.port);

    if let Some(ip) = network::public_ipv4().await {
        info!("public address: {ip}:{}", cli.port);
    }

    // Certificates are a startup requirement; fail before touching the ring.
    let tls = grpc::server_tls_config()?;

    let node = Arc::new(Node::new(address.clone(), cli.successors as usize));

    let bootstrap = cli.join_address.as_ref().zip(cli.join_port).map(|(ja, jp)| {
        let host = if ja == "local" { local_ip.clone() } else { ja.clone() };
        format!("{host}:{jp}")
    });
    match &bootstrap {
        None => {
            node.create();
            info!("created new ring with node at {address}");
        }
        Some(bootstrap) => {
            node.join(bootstrap, join_target).await?;
        }
    }

    let bind: SocketAddr = format!("0.0.0.0:{}", cli.port).parse()?;
    let server_node = node.clone();
    tokio::spawn(async move {
        if let Err(err) = grpc::thread::serve(server_node, bind, tls).await {
            error!("rpc server failed: {err}");
            process::exit(2);
        }
    });

    tokio::spawn(workers::run_stabilize(
        node.clone(),
        Duration::from_millis(cli.stabilize_ms),
    ));
    tokio::spawn(workers::run_fix_fingers(
        node.clone(),
        Duration::from_millis(cli.fix_fingers_ms),
    ));
    tokio::spawn(workers::run_check_predecessor(
        node.clone(),
        Duration::from_millis(cli.check_predecessor_ms),
    ));

    shell::run(node, &local_ip).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_arguments_parse_with_defaults() {
        let cli = Cli::try_parse_from(["chord", "-a", "local", "-p", "3410"]).unwrap();
        assert_eq!(cli.address, "local");
        assert_eq!(cli.port, 3410);
        assert_eq!(cli.stabilize_ms, 333);
        assert_eq!(cli.fix_fingers_ms, 333);
        assert_eq!(cli.check_predecessor_ms, 333);
        assert_eq!(cli.successors, 20);
        assert!(cli.join_address.is_none());
        assert!(cli.identifier.is_none());
    }

    #[test]
    fn bind_host_and_port_are_required() {
        assert!(Cli::try_parse_from(["chord", "-a", "local"]).is_err());
        assert!(Cli::try_parse_from(["chord", "-p", "3410"]).is_err());
    }

    #[test]
    fn interval_flags_are_range_checked() {
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "--ts", "0"]).is_err());
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "--tff", "6001"]).is_err());
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "--tcp", "6000"]).is_ok());
    }

    #[test]
    fn successor_list_length_is_range_checked() {
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "-r", "0"]).is_err());
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "-r", "33"]).is_err());
        assert!(Cli::try_parse_from(["chord", "-a", "x", "-p", "1", "-r", "32"]).is_ok());
    }

    #[test]
    fn identifier_must_be_forty_hex_digits() {
        assert!(parse_identifier("a9993e364706816aba3e25717850c26c9cd0d89d").is_ok());
        assert!(parse_identifier("a9993e").is_err());
        assert!(parse_identifier("zz993e364706816aba3e25717850c26c9cd0d89d").is_err());
    }
}
