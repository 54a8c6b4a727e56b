// # ipdef - IP Analysis Front End
//
// Thin integration layer over `ipdef-core`. All parsing, classification,
// CIDR arithmetic, caching and fallback logic lives in the core; this binary
// only wires transports to it and prints what it returns.
//
// The binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building an `IpAnalyzer` with the hickory and reqwest transports
// 4. Writing one JSON report to stdout
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Tasks
// - `IPDEF_ADDRESS`: Comma-separated addresses to classify
// - `IPDEF_NETWORK`: Comma-separated CIDR blocks to summarize
// - `IPDEF_RESOLVE`: Comma-separated hostnames to resolve
// - `IPDEF_REVERSE`: Comma-separated addresses to reverse-resolve
// - `IPDEF_DETECT`: Detect the public address (`true`/`1`)
//
// ### DNS
// - `IPDEF_DNS_UPSTREAM`: Nameservers (system, cloudflare, google, quad9)
// - `IPDEF_DNS_TTL_SECS`: Cache lifetime of answers
// - `IPDEF_DNS_TIMEOUT_MS`: Per-query deadline
//
// ### Detection
// - `IPDEF_SERVICES`: JSON list of endpoints, replacing the built-in list
//
// ### Logging
// - `IPDEF_LOG_LEVEL`: trace, debug, info, warn, error (logs go to stderr)
//
// ## Example
//
// ```bash
// export IPDEF_ADDRESS=192.168.1.1,2001:db8::1
// export IPDEF_NETWORK=10.0.0.0/22
// export IPDEF_RESOLVE=example.com
// export IPDEF_DETECT=true
// export IPDEF_SERVICES='[{"name":"ipify","url":"https://api.ipify.org"}]'
//
// ipdef
// ```

use anyhow::Result;
use ipdef_core::{DetectorConfig, IpAnalyzer, IpdefConfig, ServiceEndpoint};
use ipdef_dns_hickory::{HickoryDnsTransport, Upstream};
use ipdef_ip_http::ReqwestHttpTransport;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: Every task succeeded
/// - 1: Configuration or startup error
/// - 2: At least one task failed (the report is still printed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpdefExitCode {
    /// All tasks succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// One or more analysis tasks failed
    TaskFailed = 2,
}

impl From<IpdefExitCode> for ExitCode {
    fn from(code: IpdefExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    addresses: Vec<String>,
    networks: Vec<String>,
    hostnames: Vec<String>,
    reverse: Vec<String>,
    detect: bool,
    services: Option<Vec<ServiceEndpoint>>,
    dns_upstream: String,
    dns_ttl_secs: Option<u64>,
    dns_timeout_ms: Option<u64>,
    log_level: String,
}

/// Split a comma-separated variable, dropping blanks
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_number(name: &str, value: Option<String>) -> Result<Option<u64>> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", name, v)),
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let services = match lookup("IPDEF_SERVICES") {
            Some(json) if !json.trim().is_empty() => {
                Some(DetectorConfig::endpoints_from_json(&json)?)
            }
            _ => None,
        };

        Ok(Self {
            addresses: split_list(lookup("IPDEF_ADDRESS")),
            networks: split_list(lookup("IPDEF_NETWORK")),
            hostnames: split_list(lookup("IPDEF_RESOLVE")),
            reverse: split_list(lookup("IPDEF_REVERSE")),
            detect: lookup("IPDEF_DETECT")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            services,
            dns_upstream: lookup("IPDEF_DNS_UPSTREAM").unwrap_or_else(|| "system".to_string()),
            dns_ttl_secs: parse_number("IPDEF_DNS_TTL_SECS", lookup("IPDEF_DNS_TTL_SECS"))?,
            dns_timeout_ms: parse_number("IPDEF_DNS_TIMEOUT_MS", lookup("IPDEF_DNS_TIMEOUT_MS"))?,
            log_level: lookup("IPDEF_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
        })
    }

    /// Validate configuration
    ///
    /// This ensures the binary fails fast with a clear message instead of
    /// producing an empty report.
    fn validate(&self) -> Result<()> {
        if self.addresses.is_empty()
            && self.networks.is_empty()
            && self.hostnames.is_empty()
            && self.reverse.is_empty()
            && !self.detect
        {
            anyhow::bail!(
                "Nothing to do. Set at least one of IPDEF_ADDRESS, IPDEF_NETWORK, \
                IPDEF_RESOLVE, IPDEF_REVERSE or IPDEF_DETECT=true"
            );
        }

        if let Err(e) = self.dns_upstream.parse::<Upstream>() {
            anyhow::bail!(
                "IPDEF_DNS_UPSTREAM: {}. Supported: system, cloudflare, google, quad9",
                e
            );
        }

        if let Some(timeout) = self.dns_timeout_ms
            && !(100..=60_000).contains(&timeout)
        {
            anyhow::bail!(
                "IPDEF_DNS_TIMEOUT_MS must be between 100 and 60000. Got: {}",
                timeout
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IPDEF_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.core_config()?;
        Ok(())
    }

    /// Core configuration with the environment overrides applied
    fn core_config(&self) -> Result<IpdefConfig> {
        let mut config = IpdefConfig::new();
        if let Some(ttl) = self.dns_ttl_secs {
            config.dns.cache_ttl_secs = ttl;
        }
        if let Some(timeout) = self.dns_timeout_ms {
            config.dns.timeout_ms = timeout;
        }
        if let Some(ref services) = self.services {
            config.detector.endpoints = services.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

/// Collects task outcomes and remembers whether any failed
#[derive(Default)]
struct Report {
    sections: Map<String, Value>,
    failed: bool,
}

impl Report {
    fn entry<T: Serialize>(&mut self, input: &str, result: ipdef_core::Result<T>) -> Value {
        match result.map(|value| serde_json::to_value(value)) {
            Ok(Ok(value)) => json!({ "input": input, "result": value }),
            Ok(Err(e)) => {
                self.failed = true;
                json!({ "input": input, "error": format!("Failed to serialize result: {}", e) })
            }
            Err(e) => {
                if e.is_input_error() {
                    debug!("Rejected input '{}': {}", input, e);
                } else {
                    warn!("Task for '{}' failed: {}", input, e);
                }
                self.failed = true;
                json!({ "input": input, "error": e.to_string() })
            }
        }
    }

    fn section(&mut self, name: &str, entries: Vec<Value>) {
        if !entries.is_empty() {
            self.sections.insert(name.to_string(), Value::Array(entries));
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return IpdefExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return IpdefExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpdefExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpdefExitCode::ConfigError.into();
        }
    };

    let report = match rt.block_on(run(&config)) {
        Ok(report) => report,
        Err(e) => {
            error!("Startup error: {}", e);
            return IpdefExitCode::ConfigError.into();
        }
    };

    match serde_json::to_string_pretty(&Value::Object(report.sections)) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            error!("Failed to render report: {}", e);
            return IpdefExitCode::TaskFailed.into();
        }
    }

    if report.failed {
        IpdefExitCode::TaskFailed.into()
    } else {
        IpdefExitCode::Success.into()
    }
}

/// Run every configured task and collect the report
async fn run(config: &Config) -> Result<Report> {
    let mut report = Report::default();

    // Pure tasks need no transports
    let entries = config
        .addresses
        .iter()
        .map(|a| report.entry(a, ipdef_core::classify_address(a)))
        .collect();
    report.section("addresses", entries);

    let entries = config
        .networks
        .iter()
        .map(|n| report.entry(n, ipdef_core::compute_network(n)))
        .collect();
    report.section("networks", entries);

    if config.hostnames.is_empty() && config.reverse.is_empty() && !config.detect {
        return Ok(report);
    }

    let upstream: Upstream = config
        .dns_upstream
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    info!("Using DNS upstream: {:?}", upstream);

    let analyzer = IpAnalyzer::from_config(
        &config.core_config()?,
        Arc::new(HickoryDnsTransport::new(upstream)),
        Arc::new(ReqwestHttpTransport::new()),
    )?;

    let results = analyzer.resolver().resolve_batch(config.hostnames.clone()).await;
    let entries = config
        .hostnames
        .iter()
        .zip(results)
        .map(|(h, r)| report.entry(h, r))
        .collect();
    report.section("resolve", entries);

    let mut entries = Vec::with_capacity(config.reverse.len());
    for address in &config.reverse {
        let result = analyzer.resolve_reverse(address).await;
        entries.push(report.entry(address, result));
    }
    report.section("reverse", entries);

    if config.detect {
        let result = analyzer.detect_public_ip().await;
        let entry = report.entry("public", result);
        report.sections.insert("public".to_string(), entry);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_lists_are_split_and_trimmed() {
        let config = config_from(&[
            ("IPDEF_ADDRESS", " 10.0.0.1, ,::1 "),
            ("IPDEF_NETWORK", "10.0.0.0/8"),
        ])
        .unwrap();
        assert_eq!(config.addresses, vec!["10.0.0.1", "::1"]);
        assert_eq!(config.networks, vec!["10.0.0.0/8"]);
        assert!(config.hostnames.is_empty());
        assert!(!config.detect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let config = config_from(&[]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config =
            config_from(&[("IPDEF_DETECT", "true"), ("IPDEF_DNS_UPSTREAM", "8.8.8.8")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("IPDEF_DETECT", "1"), ("IPDEF_LOG_LEVEL", "loud")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("IPDEF_DETECT", "1"), ("IPDEF_DNS_TIMEOUT_MS", "5")]).unwrap();
        assert!(config.validate().is_err());

        assert!(config_from(&[("IPDEF_DNS_TTL_SECS", "soon")]).is_err());
    }

    #[test]
    fn test_services_override_default_endpoints() {
        let config = config_from(&[
            ("IPDEF_DETECT", "yes"),
            (
                "IPDEF_SERVICES",
                r#"[{"name":"local","url":"http://127.0.0.1:8080/ip","timeout_secs":2}]"#,
            ),
            ("IPDEF_DNS_TTL_SECS", "30"),
        ])
        .unwrap();
        assert!(config.detect);

        let core = config.core_config().unwrap();
        assert_eq!(core.dns.cache_ttl_secs, 30);
        assert_eq!(core.detector.endpoints.len(), 1);
        assert_eq!(core.detector.endpoints[0].name, "local");
        assert_eq!(core.detector.endpoints[0].timeout_secs, 2);

        assert!(config_from(&[("IPDEF_SERVICES", r#"[{"name":"x","url":"ftp://x"}]"#)]).is_err());
    }

    #[tokio::test]
    async fn test_pure_tasks_report_results_and_failures() {
        let config = config_from(&[
            ("IPDEF_ADDRESS", "192.168.1.1,999.1.1.1"),
            ("IPDEF_NETWORK", "10.0.0.0/30"),
        ])
        .unwrap();

        let report = run(&config).await.unwrap();
        assert!(report.failed);

        let addresses = report.sections["addresses"].as_array().unwrap();
        assert_eq!(addresses[0]["result"]["is_private"], json!(true));
        assert!(addresses[1]["error"].is_string());

        let networks = report.sections["networks"].as_array().unwrap();
        assert_eq!(networks[0]["input"], json!("10.0.0.0/30"));
        assert!(!report.sections.contains_key("resolve"));
    }
}
