#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Control CLI for a running bridge daemon.

use anyhow::Context;
use clap::{Parser, Subcommand};
use deskbridge_core::api::{
    CommandRequest, CommandResponse, ErrorBody, InboundRequest, InboundResponse,
};
use deskbridge_core::model::Identity;
use reqwest::StatusCode;

#[derive(Parser, Debug)]
#[command(name = "deskbridgectl", version, about = "Talk to a running deskbridge daemon")]
struct Args {
    /// Daemon base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8787")]
    daemon: String,

    /// Caller identity presented to the daemon's allow-set.
    #[arg(long, global = true, default_value_t = 0)]
    sender: i64,

    /// Print the raw JSON response.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Check that the daemon answers.
    Health,
    /// Type text into the desktop app, as if sent from chat.
    Send { text: String },
    Start,
    Status,
    Help,
    /// Dispatch the canned test message.
    Test,
    /// Relay the canned monitoring test message.
    TestMonitoring,
    MonitorStatus,
    MonitorToggle,
    Calibrate,
}

impl Cmd {
    fn command_name(&self) -> Option<&'static str> {
        Some(match self {
            Cmd::Health | Cmd::Send { .. } => return None,
            Cmd::Start => "start",
            Cmd::Status => "status",
            Cmd::Help => "help",
            Cmd::Test => "test",
            Cmd::TestMonitoring => "test_monitoring",
            Cmd::MonitorStatus => "monitor_status",
            Cmd::MonitorToggle => "monitor_toggle",
            Cmd::Calibrate => "calibrate",
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();
    let base = args.daemon.trim_end_matches('/');
    let sender = Identity(args.sender);

    match &args.cmd {
        Cmd::Health => {
            let body = client
                .get(format!("{base}/healthz"))
                .send()
                .await
                .with_context(|| format!("connect to {base}"))?
                .error_for_status()?
                .text()
                .await?;
            println!("{body}");
        }
        Cmd::Send { text } => {
            let resp = client
                .post(format!("{base}/v1/inbound"))
                .json(&InboundRequest {
                    sender,
                    text: text.clone(),
                })
                .send()
                .await
                .with_context(|| format!("connect to {base}"))?;
            // 403 still carries an InboundResponse body.
            if !resp.status().is_success() && resp.status() != StatusCode::FORBIDDEN {
                return Err(api_error(resp).await);
            }
            let out: InboundResponse = resp.json().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{:?}", out.status);
                for line in &out.replies {
                    println!("{line}");
                }
            }
        }
        cmd => {
            let name = cmd.command_name().context("not a daemon command")?;
            let resp = client
                .post(format!("{base}/v1/commands/{name}"))
                .json(&CommandRequest { sender })
                .send()
                .await
                .with_context(|| format!("connect to {base}"))?;
            if !resp.status().is_success() {
                return Err(api_error(resp).await);
            }
            let out: CommandResponse = resp.json().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", out.reply);
            }
            if !out.ok {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn api_error(resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => anyhow::anyhow!("daemon returned {status}: {}", body.error),
        Err(_) => anyhow::anyhow!("daemon returned {status}"),
    }
}
