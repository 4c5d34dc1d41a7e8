//! Line-delimited JSON operator interface.
//!
//! Each request line is `{"command": "...", "args": ...}` and each reply is a
//! single `{"success": ..., "message": ..., "data": ...}` line.

use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::network::Transport;
use crate::protocol::PacketKind;
use crate::router::Router;

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl ControlResponse {
    fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlCommand {
    pub command: String,
    pub args: Option<Value>,
}

pub struct ControlServer<T: Transport> {
    addr: SocketAddr,
    router: Arc<Router<T>>,
}

impl<T: Transport> ControlServer<T> {
    pub fn new(addr: SocketAddr, router: Arc<Router<T>>) -> Self {
        Self { addr, router }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Control server listening on {}", self.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Control connection from {}", addr);
                    let router = Arc::clone(&self.router);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, router).await {
                            error!("Error handling control client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept control connection: {}", e);
                }
            }
        }
    }

    async fn handle_client(mut stream: TcpStream, router: Arc<Router<T>>) -> anyhow::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            if buf_reader.read_line(&mut line).await? == 0 {
                break; // Connection closed
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<ControlCommand>(trimmed) {
                Ok(command) => Self::process_command(command, &router).await,
                Err(e) => ControlResponse::failure(format!("Invalid JSON command: {}", e)),
            };

            let response_json = serde_json::to_string(&response)?;
            writer.write_all(format!("{}\n", response_json).as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    pub async fn process_command(command: ControlCommand, router: &Arc<Router<T>>) -> ControlResponse {
        match command.command.as_str() {
            "status" => Self::get_status(router).await,
            "neighbors" => Self::get_neighbors(router).await,
            "routing_table" => Self::get_routing_table(router).await,
            "route" => Self::get_route(command.args, router).await,
            "lsdb" => Self::get_lsdb(router).await,
            "send" => Self::send(command.args, router).await,
            "advertise" => Self::advertise(router).await,
            "stop" => match router.stop().await {
                Ok(()) => ControlResponse::ok("Router stopped", None),
                Err(e) => ControlResponse::failure(format!("Failed to stop router: {}", e)),
            },
            "help" => Self::get_help(),
            _ => ControlResponse::failure(format!("Unknown command: {}", command.command)),
        }
    }

    async fn get_status(router: &Arc<Router<T>>) -> ControlResponse {
        let status = router.status().await;
        ControlResponse::ok("Status retrieved", serde_json::to_value(status).ok())
    }

    async fn get_neighbors(router: &Arc<Router<T>>) -> ControlResponse {
        let neighbors = router.neighbors().await;
        ControlResponse::ok(
            format!("Found {} neighbors", neighbors.len()),
            serde_json::to_value(neighbors).ok(),
        )
    }

    async fn get_routing_table(router: &Arc<Router<T>>) -> ControlResponse {
        let table = router.routing_table().await;
        let rows: Vec<Value> = table
            .entries()
            .iter()
            .map(|entry| {
                json!({
                    "destination": entry.destination,
                    "cost": entry.cost_display(),
                    "next_hop": entry.next_hop,
                    "path": entry.path_display(),
                })
            })
            .collect();
        ControlResponse::ok(format!("Retrieved {} routes", rows.len()), Some(Value::Array(rows)))
    }

    async fn get_route(args: Option<Value>, router: &Arc<Router<T>>) -> ControlResponse {
        let Some(destination) = string_arg(&args, "destination") else {
            return ControlResponse::failure("destination parameter required");
        };
        let entry = router.route_to(&destination).await;
        let message = if entry.is_reachable() {
            format!("{} reachable via {}", destination, entry.path_display())
        } else {
            format!("No route to {}", destination)
        };
        ControlResponse::ok(message, serde_json::to_value(entry).ok())
    }

    async fn get_lsdb(router: &Arc<Router<T>>) -> ControlResponse {
        let entries = router.lsdb_entries().await;
        let data: serde_json::Map<String, Value> = entries
            .into_iter()
            .filter_map(|(id, entry)| serde_json::to_value(entry).ok().map(|v| (id, v)))
            .collect();
        ControlResponse::ok(format!("{} LSDB entries", data.len()), Some(Value::Object(data)))
    }

    async fn send(args: Option<Value>, router: &Arc<Router<T>>) -> ControlResponse {
        let Some(to) = string_arg(&args, "to") else {
            return ControlResponse::failure("to parameter required");
        };
        let payload = args
            .as_ref()
            .and_then(|a| a.get("payload"))
            .cloned()
            .unwrap_or(Value::Null);
        let type_name = string_arg(&args, "type").unwrap_or_else(|| "message".to_string());
        let Some(kind) = PacketKind::data_kind(&type_name) else {
            return ControlResponse::failure(format!("Unsupported packet type: {}", type_name));
        };

        match router.send_data(kind, &to, payload).await {
            Ok(disposition) => ControlResponse::ok(
                format!("Sent {} to {}", type_name, to),
                Some(json!({ "disposition": format!("{:?}", disposition) })),
            ),
            Err(e) => ControlResponse::failure(format!("Send failed: {}", e)),
        }
    }

    async fn advertise(router: &Arc<Router<T>>) -> ControlResponse {
        router.send_hellos().await;
        match router.originate_lsp().await {
            Ok(reports) => {
                let delivered = reports.iter().filter(|r| r.result.is_ok()).count();
                ControlResponse::ok(
                    format!("LSP flooded to {}/{} neighbors", delivered, reports.len()),
                    None,
                )
            }
            Err(e) => ControlResponse::failure(format!("Failed to advertise: {}", e)),
        }
    }

    fn get_help() -> ControlResponse {
        let commands = vec![
            ("status", "Get router status"),
            ("neighbors", "Get list of current neighbors"),
            ("routing_table", "Get current routing table"),
            ("route", "Get the route to one destination (requires destination)"),
            ("lsdb", "Dump the link-state database"),
            ("send", "Send data (requires to; optional payload, type)"),
            ("advertise", "Send HELLOs and flood a fresh LSP now"),
            ("stop", "Stop the router"),
            ("help", "Show this help message"),
        ];

        ControlResponse::ok("Available commands", serde_json::to_value(commands).ok())
    }
}

/// Accepts either a bare string or an object carrying `key`.
fn string_arg(args: &Option<Value>, key: &str) -> Option<String> {
    match args {
        Some(Value::String(s)) => Some(s.clone()),
        Some(obj) => obj.get(key).and_then(Value::as_str).map(str::to_string),
        None => None,
    }
}
