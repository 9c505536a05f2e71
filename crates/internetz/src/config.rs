use anyhow::anyhow;
use clap::ValueEnum;
use file::ConfigFile;
use internetz_core::{
    defaults, DnsConfig, HttpConfig, IcmpConfig, LoopConfig, ResolverSpec, StartupFailure,
    TcpConfig, UdpConfig, MIN_PERIOD,
};
use itertools::Itertools;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

mod cmd;
mod constants;
mod file;

pub use cmd::Args;

/// What to do when a probe fails to start.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartupFailureConfig {
    /// Log the failure and keep the other probes running.
    Isolate,
    /// Shut down.
    Shutdown,
}

impl From<StartupFailure> for StartupFailureConfig {
    fn from(value: StartupFailure) -> Self {
        match value {
            StartupFailure::Isolate => Self::Isolate,
            StartupFailure::Shutdown => Self::Shutdown,
        }
    }
}

impl From<StartupFailureConfig> for StartupFailure {
    fn from(value: StartupFailureConfig) -> Self {
        match value {
            StartupFailureConfig::Isolate => Self::Isolate,
            StartupFailureConfig::Shutdown => Self::Shutdown,
        }
    }
}

/// How to format log data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Display log data in a compact format.
    Compact,
    /// Display log data in a pretty format.
    Pretty,
    /// Display log data in a json format.
    Json,
}

/// How to log event spans.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSpanEvents {
    /// Do not display event spans.
    Off,
    /// Display enter and exit event spans.
    Active,
    /// Display all event spans.
    Full,
}

/// The action to perform.
#[derive(Debug, Eq, PartialEq)]
pub enum InternetzAction {
    /// Run the probes.
    Run(InternetzConfig),
    /// Print a template toml config file and exit.
    PrintConfigTemplate,
}

impl InternetzAction {
    pub fn from(args: Args, terminal: bool) -> anyhow::Result<Self> {
        Ok(if args.print_config_template {
            Self::PrintConfigTemplate
        } else {
            Self::Run(InternetzConfig::from(args, terminal)?)
        })
    }
}

/// Fully parsed and validated configuration.
///
/// A probe which is disabled is `None`.
#[derive(Debug, Eq, PartialEq)]
pub struct InternetzConfig {
    pub loop_config: LoopConfig,
    pub startup_failure: StartupFailure,
    pub icmp: Option<IcmpConfig>,
    pub tcp: Option<TcpConfig>,
    pub udp: Option<UdpConfig>,
    pub dns: Option<DnsConfig>,
    pub http: Option<HttpConfig>,
    pub log_format: LogFormat,
    pub log_filter: String,
    pub log_span_events: LogSpanEvents,
}

impl InternetzConfig {
    pub fn from(args: Args, terminal: bool) -> anyhow::Result<Self> {
        let cfg_file = if let Some(cfg) = &args.config_file {
            file::read_config_file(cfg)?
        } else {
            file::read_default_config_file()?.unwrap_or_default()
        };
        Self::build_config(args, cfg_file, terminal)
    }

    /// The number of probe loops this config will start.
    pub fn probe_count(&self) -> usize {
        usize::from(self.icmp.is_some())
            + usize::from(self.tcp.is_some())
            + usize::from(self.udp.is_some())
            + self.dns.as_ref().map_or(0, |dns| dns.resolvers.len())
            + usize::from(self.http.is_some())
    }

    fn build_config(args: Args, cfg_file: ConfigFile, terminal: bool) -> anyhow::Result<Self> {
        let cfg_file_internetz = cfg_file.internetz.unwrap_or_default();
        let cfg_file_schedule = cfg_file.schedule.unwrap_or_default();
        let cfg_file_icmp = cfg_file.icmp.unwrap_or_default();
        let cfg_file_tcp = cfg_file.tcp.unwrap_or_default();
        let cfg_file_udp = cfg_file.udp.unwrap_or_default();
        let cfg_file_dns = cfg_file.dns.unwrap_or_default();
        let cfg_file_http = cfg_file.http.unwrap_or_default();
        let log_format = cfg_layer(
            args.log_format,
            cfg_file_internetz.log_format,
            default_log_format(terminal),
        );
        let log_filter = cfg_layer(
            args.log_filter,
            cfg_file_internetz.log_filter,
            String::from(constants::DEFAULT_LOG_FILTER),
        );
        let log_span_events = cfg_layer(
            args.log_span_events,
            cfg_file_internetz.log_span_events,
            constants::DEFAULT_LOG_SPAN_EVENTS,
        );
        let startup_failure = cfg_layer(
            args.startup_failure,
            cfg_file_internetz.startup_failure,
            StartupFailureConfig::from(defaults::DEFAULT_STARTUP_FAILURE),
        );
        let period = cfg_layer(
            args.period,
            cfg_file_schedule.period,
            defaults::DEFAULT_PERIOD,
        );
        let timeout = cfg_layer(
            args.timeout,
            cfg_file_schedule.timeout,
            defaults::DEFAULT_TIMEOUT,
        );
        let icmp_enabled = cfg_layer_disable_flag(
            args.no_icmp,
            cfg_file_icmp.enabled,
            constants::DEFAULT_PROBE_ENABLED,
        );
        let icmp_target = cfg_layer(
            args.icmp_target,
            cfg_file_icmp.target,
            IpAddr::V4(defaults::DEFAULT_ICMP_TARGET),
        );
        let tcp_enabled = cfg_layer_disable_flag(
            args.no_tcp,
            cfg_file_tcp.enabled,
            constants::DEFAULT_PROBE_ENABLED,
        );
        let tcp_target = cfg_layer(
            args.tcp_target,
            cfg_file_tcp.target,
            defaults::DEFAULT_TCP_TARGET,
        );
        let udp_enabled = cfg_layer_disable_flag(
            args.no_udp,
            cfg_file_udp.enabled,
            constants::DEFAULT_PROBE_ENABLED,
        );
        let udp_target = cfg_layer(
            args.udp_target,
            cfg_file_udp.target,
            defaults::DEFAULT_UDP_TARGET,
        );
        let dns_enabled = cfg_layer_disable_flag(
            args.no_dns,
            cfg_file_dns.enabled,
            constants::DEFAULT_PROBE_ENABLED,
        );
        let dns_hostname = cfg_layer(
            args.dns_hostname,
            cfg_file_dns.hostname,
            String::from(defaults::DEFAULT_DNS_HOSTNAME),
        );
        let dns_resolvers = cfg_layer(
            (!args.dns_resolvers.is_empty()).then_some(args.dns_resolvers),
            cfg_file_dns.resolvers,
            defaults::default_resolvers(),
        );
        let http_enabled = cfg_layer_disable_flag(
            args.no_http,
            cfg_file_http.enabled,
            constants::DEFAULT_PROBE_ENABLED,
        );
        let http_url = cfg_layer(
            args.http_url,
            cfg_file_http.url,
            String::from(defaults::DEFAULT_HTTP_URL),
        );
        validate_period(period)?;
        validate_timeout(timeout)?;
        validate_enabled(&[
            icmp_enabled,
            tcp_enabled,
            udp_enabled,
            dns_enabled,
            http_enabled,
        ])?;
        let icmp = if icmp_enabled {
            Some(IcmpConfig {
                target: validate_icmp_target(icmp_target)?,
                ..IcmpConfig::default()
            })
        } else {
            None
        };
        let tcp = tcp_enabled.then_some(TcpConfig { target: tcp_target });
        let udp = udp_enabled.then(|| UdpConfig {
            target: udp_target,
            ..UdpConfig::default()
        });
        let dns = if dns_enabled {
            validate_dns_hostname(&dns_hostname)?;
            validate_dns_resolvers(&dns_resolvers)?;
            Some(DnsConfig {
                hostname: dns_hostname,
                resolvers: dns_resolvers,
            })
        } else {
            None
        };
        let http = if http_enabled {
            validate_http_url(&http_url)?;
            Some(HttpConfig { url: http_url })
        } else {
            None
        };
        Ok(Self {
            loop_config: LoopConfig { period, timeout },
            startup_failure: StartupFailure::from(startup_failure),
            icmp,
            tcp,
            udp,
            dns,
            http,
            log_format,
            log_filter,
            log_span_events,
        })
    }
}

impl Default for InternetzConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            startup_failure: defaults::DEFAULT_STARTUP_FAILURE,
            icmp: Some(IcmpConfig::default()),
            tcp: Some(TcpConfig::default()),
            udp: Some(UdpConfig::default()),
            dns: Some(DnsConfig::default()),
            http: Some(HttpConfig::default()),
            log_format: default_log_format(true),
            log_filter: String::from(constants::DEFAULT_LOG_FILTER),
            log_span_events: constants::DEFAULT_LOG_SPAN_EVENTS,
        }
    }
}

/// Parse a resolver, either `system` or `name=ip`.
pub fn parse_resolver(value: &str) -> anyhow::Result<ResolverSpec> {
    if value == "system" {
        return Ok(ResolverSpec::System);
    }
    match value.split_once('=') {
        Some((name, addr)) if !name.is_empty() && name != "system" => {
            let addr = IpAddr::from_str(addr)
                .map_err(|err| anyhow!("invalid resolver address for {name} ({addr}): {err}"))?;
            Ok(ResolverSpec::named(name, addr))
        }
        _ => Err(anyhow!(
            "invalid resolver ({value}), expected `system` or `name=ip`"
        )),
    }
}

const fn default_log_format(terminal: bool) -> LogFormat {
    if terminal {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

fn cfg_layer<T>(fst: Option<T>, snd: Option<T>, def: T) -> T {
    match (fst, snd) {
        (Some(val), _) | (None, Some(val)) => val,
        (None, None) => def,
    }
}

/// Layer a `--no-<probe>` flag over an `enabled` config file value.
const fn cfg_layer_disable_flag(disable: bool, enabled: Option<bool>, default: bool) -> bool {
    match (disable, enabled) {
        (true, _) => false,
        (false, Some(val)) => val,
        (false, None) => default,
    }
}

/// Validate `period`.
fn validate_period(period: Duration) -> anyhow::Result<()> {
    if period < MIN_PERIOD {
        Err(anyhow!(
            "period ({:?}) must be at least {:?}",
            period,
            MIN_PERIOD
        ))
    } else {
        Ok(())
    }
}

/// Validate `timeout`.
fn validate_timeout(timeout: Duration) -> anyhow::Result<()> {
    if timeout.is_zero() {
        Err(anyhow!("timeout ({:?}) must be greater than zero", timeout))
    } else {
        Ok(())
    }
}

/// Validate at least one probe is enabled.
fn validate_enabled(enabled: &[bool]) -> anyhow::Result<()> {
    if enabled.iter().any(|&enabled| enabled) {
        Ok(())
    } else {
        Err(anyhow!("at least one probe must be enabled"))
    }
}

/// The echo probe is IPv4 only.
fn validate_icmp_target(target: IpAddr) -> anyhow::Result<Ipv4Addr> {
    match target {
        IpAddr::V4(addr) => Ok(addr),
        IpAddr::V6(_) => Err(anyhow!("icmp-target ({target}) must be an IPv4 address")),
    }
}

/// Validate `dns-hostname`.
fn validate_dns_hostname(hostname: &str) -> anyhow::Result<()> {
    if hostname.trim().is_empty() {
        Err(anyhow!("dns-hostname must not be blank"))
    } else {
        Ok(())
    }
}

/// Validate `dns-resolvers`.
fn validate_dns_resolvers(resolvers: &[ResolverSpec]) -> anyhow::Result<()> {
    let duplicates = resolvers.iter().map(ResolverSpec::name).duplicates().join(", ");
    if resolvers.is_empty() {
        Err(anyhow!("at least one dns-resolver must be given"))
    } else if duplicates.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("duplicate dns-resolver names: {duplicates}"))
    }
}

/// Validate `http-url`; only plain `http` is supported.
fn validate_http_url(url: &str) -> anyhow::Result<()> {
    match url.strip_prefix("http://") {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => Err(anyhow!("http-url ({url}) must be an http:// URL")),
    }
}
