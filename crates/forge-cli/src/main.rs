//! `forge`: command-line companion for Forge Connector.
//!
//! Generates and checks connection keys, signs requests the way Forge does,
//! drives a running connector over its REST API, and renders CTA JSON files
//! to HTML without a server.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use forge_core::connection::{ConnectionKey, validate_key_format};
use forge_core::cta::{Cta, CtaPage};
use forge_core::signing::SignedHeaders;

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BANNER_SMALL: &str = "◆ Forge";

// ── CLI structure ────────────────────────────────────────────────────

/// Forge Connector CLI.
#[derive(Parser)]
#[command(
    name = "forge",
    version,
    about = "Forge Connector CLI: sign requests, manage a connector, render CTAs",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         FORGE_ADDR             Connector address (default: http://127.0.0.1:8300)\n  \
         FORGE_CONNECTION_KEY   Connection key used to sign requests\n  \
         FORGE_SITE_ID          Forge site id sent with signed requests\n\n\
         {DIM}Examples:{RESET}\n  \
         forge keygen\n  \
         forge connect --site-id site_123\n  \
         forge sign --method POST --path /forge/v1/posts --body '{{\"title\":\"Hi\"}}'\n  \
         forge render cta.json --page > preview.html"
    ),
)]
struct Cli {
    /// Connector address.
    #[arg(long, env = "FORGE_ADDR", default_value = "http://127.0.0.1:8300")]
    addr: String,

    /// Connection key.
    #[arg(long, env = "FORGE_CONNECTION_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Forge site id.
    #[arg(long, env = "FORGE_SITE_ID")]
    site_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new connection key.
    Keygen,
    /// Check that a string is a well-formed connection key.
    #[command(name = "check-key")]
    CheckKey {
        /// The key to check.
        key: String,
    },
    /// Print the signature headers for a request.
    Sign {
        /// HTTP method.
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request path, e.g. /forge/v1/status.
        #[arg(long)]
        path: String,
        /// Request body.
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the request body from a file.
        #[arg(long)]
        body_file: Option<String>,
        /// Unix timestamp to sign with (default: now).
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Connect the connector to Forge with the configured key.
    Connect,
    /// Show connection status.
    Status,
    /// Disconnect the connector.
    Disconnect,
    /// Dump the full sync snapshot as JSON.
    Sync,
    /// Render a CTA JSON file to HTML.
    Render {
        /// File holding one CTA, an array of CTAs, or `{"ctas": [...]}`.
        file: String,
        /// Wrap the output in a standalone HTML page.
        #[arg(long, default_value = "false")]
        page: bool,
    },
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("-")
}

fn yes_no(flag: bool) -> String {
    if flag {
        format!("{GREEN}yes{RESET}")
    } else {
        format!("{RED}no{RESET}")
    }
}

fn print_json(value: &Value) {
    if value.is_null() {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}

// ── HTTP client ──────────────────────────────────────────────────────

struct Client {
    http: reqwest::Client,
    addr: String,
    key: Option<String>,
    site_id: Option<String>,
}

impl Client {
    fn new(addr: String, key: Option<String>, site_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            addr,
            key,
            site_id,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{path}", self.addr.trim_end_matches('/'));
        Url::parse(&raw).with_context(|| format!("invalid connector address: {raw}"))
    }

    fn key(&self) -> Result<&str> {
        self.key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("no connection key; set FORGE_CONNECTION_KEY or use --key")
            })
    }

    async fn get_public(&self, path: &str) -> Result<Value> {
        let resp = self
            .http
            .get(self.url(path)?)
            .send()
            .await
            .context("request failed")?;
        handle_response(resp).await
    }

    async fn post_public(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("request failed")?;
        handle_response(resp).await
    }

    /// Send a request signed with the connection key. The signed path is
    /// the one the server sees, so a path prefix in `addr` is included.
    async fn signed(&self, method: reqwest::Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let key = self.key()?;
        let url = self.url(path)?;
        let bytes = match body {
            Some(body) => serde_json::to_vec(body).context("failed to encode request body")?,
            None => Vec::new(),
        };
        let headers = SignedHeaders::build(
            key.as_bytes(),
            self.site_id.as_deref(),
            method.as_str(),
            url.path(),
            &bytes,
            chrono::Utc::now().timestamp(),
        );

        let mut req = self.http.request(method, url);
        for (name, value) in headers.pairs() {
            if !value.is_empty() {
                req = req.header(name, value);
            }
        }
        if body.is_some() {
            req = req.header("Content-Type", "application/json");
        }
        let resp = req.body(bytes).send().await.context("request failed")?;
        handle_response(resp).await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await.context("failed to read response body")?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or(body);
        bail!("server returned {status}: {message}");
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("failed to parse response JSON")
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let client = Client::new(cli.addr, cli.key, cli.site_id);

    match run(client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(client: Client, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Keygen => {
            println!("{}", ConnectionKey::generate().as_str());
            Ok(())
        }
        Commands::CheckKey { key } => cmd_check_key(&key),
        Commands::Sign {
            method,
            path,
            body,
            body_file,
            timestamp,
        } => cmd_sign(
            &client,
            &method,
            &path,
            body.as_deref(),
            body_file.as_deref(),
            timestamp,
        ),
        Commands::Connect => cmd_connect(&client).await,
        Commands::Status => cmd_status(&client).await,
        Commands::Disconnect => cmd_disconnect(&client).await,
        Commands::Sync => {
            let resp = client.signed(reqwest::Method::GET, "/forge/v1/sync", None).await?;
            print_json(&resp);
            Ok(())
        }
        Commands::Render { file, page } => cmd_render(Path::new(&file), page),
    }
}

// ── Key commands ─────────────────────────────────────────────────────

fn cmd_check_key(key: &str) -> Result<()> {
    if validate_key_format(key) {
        success("valid connection key");
        Ok(())
    } else {
        bail!("invalid connection key: expected 'fk_' followed by at least 32 letters or digits")
    }
}

fn cmd_sign(
    client: &Client,
    method: &str,
    path: &str,
    body: Option<&str>,
    body_file: Option<&str>,
    timestamp: Option<i64>,
) -> Result<()> {
    let key = client.key()?;
    let bytes = match (body, body_file) {
        (_, Some(file)) => {
            std::fs::read(file).with_context(|| format!("failed to read body file {file}"))?
        }
        (Some(body), None) => body.as_bytes().to_vec(),
        (None, None) => Vec::new(),
    };
    let headers = SignedHeaders::build(
        key.as_bytes(),
        client.site_id.as_deref(),
        &method.to_ascii_uppercase(),
        path,
        &bytes,
        timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
    );
    for (name, value) in headers.pairs() {
        if !value.is_empty() {
            println!("{name}: {value}");
        }
    }
    Ok(())
}

// ── Connector commands ───────────────────────────────────────────────

async fn cmd_connect(client: &Client) -> Result<()> {
    let key = client.key()?;
    let body = serde_json::json!({
        "connection_key": key,
        "forge_site_id": client.site_id.as_deref().unwrap_or_default(),
    });
    let resp = client.post_public("/forge/v1/connect", &body).await?;
    println!();
    success(str_field(&resp, "message"));
    if let Some(site) = resp.get("site") {
        kv_line("Site", str_field(site, "name"));
        kv_line("URL", str_field(site, "url"));
    }
    println!();
    Ok(())
}

async fn cmd_status(client: &Client) -> Result<()> {
    println!();
    println!("  {BANNER_SMALL} {DIM}checking connector...{RESET}");
    println!();

    let health = client.get_public("/forge/v1/health").await?;
    header("🔗", "Connector");
    kv_line("Version", str_field(&health, "version"));
    let connected = health
        .get("connected")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    kv_line("Connected", &yes_no(connected));

    if client.key.is_none() {
        println!();
        warning("no connection key; skipping signed status");
        println!();
        return Ok(());
    }

    let resp = client
        .signed(reqwest::Method::GET, "/forge/v1/status", None)
        .await?;
    let status = resp.get("status").cloned().unwrap_or(Value::Null);
    kv_line("Forge site id", str_field(&status, "forge_site_id"));
    kv_line("Connected at", str_field(&status, "connected_at"));
    if let Some(site) = resp.get("site") {
        kv_line("Site", str_field(site, "name"));
        kv_line("URL", str_field(site, "url"));
    }
    println!();
    Ok(())
}

async fn cmd_disconnect(client: &Client) -> Result<()> {
    let resp = client
        .signed(reqwest::Method::POST, "/forge/v1/disconnect", None)
        .await?;
    success(str_field(&resp, "message"));
    Ok(())
}

// ── Offline rendering ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum CtaFile {
    Wrapped { ctas: Vec<Cta> },
    Many(Vec<Cta>),
    One(Box<Cta>),
}

impl CtaFile {
    fn into_ctas(self) -> Vec<Cta> {
        match self {
            Self::Wrapped { ctas } | Self::Many(ctas) => ctas,
            Self::One(cta) => vec![*cta],
        }
    }
}

fn cmd_render(file: &Path, page: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let ctas = serde_json::from_str::<CtaFile>(&raw)
        .with_context(|| format!("{} is not CTA JSON", file.display()))?
        .into_ctas();

    let mut placed = CtaPage::new();
    let mut html = String::new();
    for cta in &ctas {
        if placed.contains(&cta.id) {
            continue;
        }
        html.push_str(&placed.render(cta));
        html.push('\n');
    }

    if page {
        println!("{}", standalone_page(&html, &placed.loaded_script()));
    } else {
        print!("{html}");
    }
    Ok(())
}

fn standalone_page(body: &str, script: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Forge CTA preview</title>\n</head>\n<body>\n{body}{script}\n</body>\n</html>"
    )
}
