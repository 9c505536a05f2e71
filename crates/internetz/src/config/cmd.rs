use crate::config::{parse_resolver, LogFormat, LogSpanEvents, StartupFailureConfig};
use clap::Parser;
use internetz_core::ResolverSpec;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Watch the local network stack, layer by layer, and report what is reachable
#[derive(Parser, Debug)]
#[command(name = "internetz", author, version, about, long_about = None)]
pub struct Args {
    /// Config file
    #[arg(short = 'c', long, value_hint = clap::ValueHint::FilePath)]
    pub config_file: Option<String>,

    /// The interval between checks of each probe [default: 1s]
    #[arg(short = 'p', long, value_parser = parse_duration)]
    pub period: Option<Duration>,

    /// The time allowed for a single check [default: 5s]
    #[arg(short = 't', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// What to do when a probe fails to start [default: isolate]
    #[arg(value_enum, long)]
    pub startup_failure: Option<StartupFailureConfig>,

    /// The ICMP echo target, an IPv4 address [default: 1.1.1.1]
    #[arg(long, value_parser = parse_addr)]
    pub icmp_target: Option<IpAddr>,

    /// Do not run the ICMP echo probe
    #[arg(long)]
    pub no_icmp: bool,

    /// The TCP handshake target [default: 1.1.1.1:80]
    #[arg(long, value_parser = parse_socket_addr)]
    pub tcp_target: Option<SocketAddr>,

    /// Do not run the TCP handshake probe
    #[arg(long)]
    pub no_tcp: bool,

    /// The UDP send target [default: 1.1.1.1:53]
    #[arg(long, value_parser = parse_socket_addr)]
    pub udp_target: Option<SocketAddr>,

    /// Do not run the UDP send probe
    #[arg(long)]
    pub no_udp: bool,

    /// The hostname to resolve [default: www.google.com]
    #[arg(long)]
    pub dns_hostname: Option<String>,

    /// A resolver to query, either `system` or `name=ip`, may be repeated
    /// [default: system cloudflare=1.1.1.1 google=8.8.8.8]
    #[arg(long = "dns-resolver", value_parser = parse_resolver)]
    pub dns_resolvers: Vec<ResolverSpec>,

    /// Do not run the DNS resolution probes
    #[arg(long)]
    pub no_dns: bool,

    /// The URL requested by the HTTP probe [default: http://172.217.169.68/robots.txt]
    #[arg(long)]
    pub http_url: Option<String>,

    /// Do not run the HTTP round-trip probe
    #[arg(long)]
    pub no_http: bool,

    /// The log format [default: pretty on a terminal, json otherwise]
    #[arg(value_enum, long)]
    pub log_format: Option<LogFormat>,

    /// The log filter [default: internetz=info]
    #[arg(long)]
    pub log_filter: Option<String>,

    /// How to log event spans [default: off]
    #[arg(value_enum, long)]
    pub log_span_events: Option<LogSpanEvents>,

    /// Print a template toml config file and exit
    #[arg(long)]
    pub print_config_template: bool,
}

fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    Ok(humantime::parse_duration(value)?)
}

fn parse_addr(value: &str) -> anyhow::Result<IpAddr> {
    Ok(IpAddr::from_str(value)?)
}

fn parse_socket_addr(value: &str) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from_str(value)?)
}
