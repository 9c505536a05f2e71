use crate::config::{constants, parse_resolver, LogFormat, LogSpanEvents, StartupFailureConfig};
use anyhow::Context;
use etcetera::BaseStrategy;
use internetz_core::{defaults, ResolverSpec};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "internetz.toml";
const DEFAULT_HIDDEN_CONFIG_FILE: &str = ".internetz.toml";

/// Read the config from the default location of user config for the platform.
///
/// Returns the parsed `Some(ConfigFile)` if the config file exists, `None` otherwise.
///
/// Looks for an `internetz.toml` or `.internetz.toml` config file in one of:
///     - the current directory
///     - the user home directory
///     - the XDG config directory: `$XDG_CONFIG_HOME` or `~/.config`
///     - the XDG app config directory: `$XDG_CONFIG_HOME/internetz` or `~/.config/internetz`
///
/// Only the first config file found is used.
pub fn read_default_config_file() -> anyhow::Result<Option<ConfigFile>> {
    use etcetera::base_strategy as base;
    if let Some(file) = read_files("")? {
        Ok(Some(file))
    } else {
        let basedirs = base::choose_base_strategy()?;
        if let Some(file) = read_files(basedirs.home_dir())? {
            Ok(Some(file))
        } else if let Some(file) = read_files(basedirs.config_dir())? {
            Ok(Some(file))
        } else if let Some(file) = read_files(basedirs.config_dir().join("internetz"))? {
            Ok(Some(file))
        } else {
            Ok(None)
        }
    }
}

/// Read the config from the given path.
pub fn read_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<ConfigFile> {
    let contents = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("config file not found: {}", path.as_ref().display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("invalid config file: {}", path.as_ref().display()))
}

fn read_files<P: AsRef<Path>>(dir: P) -> anyhow::Result<Option<ConfigFile>> {
    if let Some(file) = read_file(dir.as_ref(), DEFAULT_CONFIG_FILE)? {
        Ok(Some(file))
    } else if let Some(file) = read_file(dir.as_ref(), DEFAULT_HIDDEN_CONFIG_FILE)? {
        Ok(Some(file))
    } else {
        Ok(None)
    }
}

fn read_file<P: AsRef<Path>>(dir: P, file: &str) -> anyhow::Result<Option<ConfigFile>> {
    let path = dir.as_ref().join(file);
    if path.exists() {
        Ok(Some(read_config_file(path)?))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub internetz: Option<ConfigInternetz>,
    pub schedule: Option<ConfigSchedule>,
    pub icmp: Option<ConfigIcmp>,
    pub tcp: Option<ConfigTcp>,
    pub udp: Option<ConfigUdp>,
    pub dns: Option<ConfigDns>,
    pub http: Option<ConfigHttp>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            internetz: Some(ConfigInternetz::default()),
            schedule: Some(ConfigSchedule::default()),
            icmp: Some(ConfigIcmp::default()),
            tcp: Some(ConfigTcp::default()),
            udp: Some(ConfigUdp::default()),
            dns: Some(ConfigDns::default()),
            http: Some(ConfigHttp::default()),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigInternetz {
    pub startup_failure: Option<StartupFailureConfig>,
    pub log_format: Option<LogFormat>,
    pub log_filter: Option<String>,
    pub log_span_events: Option<LogSpanEvents>,
}

impl Default for ConfigInternetz {
    fn default() -> Self {
        Self {
            startup_failure: Some(StartupFailureConfig::from(defaults::DEFAULT_STARTUP_FAILURE)),
            // depends on whether stderr is a terminal
            log_format: None,
            log_filter: Some(String::from(constants::DEFAULT_LOG_FILTER)),
            log_span_events: Some(constants::DEFAULT_LOG_SPAN_EVENTS),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigSchedule {
    #[serde(default)]
    #[serde(deserialize_with = "humantime_deser")]
    pub period: Option<Duration>,
    #[serde(default)]
    #[serde(deserialize_with = "humantime_deser")]
    pub timeout: Option<Duration>,
}

impl Default for ConfigSchedule {
    fn default() -> Self {
        Self {
            period: Some(defaults::DEFAULT_PERIOD),
            timeout: Some(defaults::DEFAULT_TIMEOUT),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigIcmp {
    pub enabled: Option<bool>,
    #[serde(default)]
    #[serde(deserialize_with = "addr_deser")]
    pub target: Option<IpAddr>,
}

impl Default for ConfigIcmp {
    fn default() -> Self {
        Self {
            enabled: Some(constants::DEFAULT_PROBE_ENABLED),
            target: Some(IpAddr::V4(defaults::DEFAULT_ICMP_TARGET)),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigTcp {
    pub enabled: Option<bool>,
    #[serde(default)]
    #[serde(deserialize_with = "socket_addr_deser")]
    pub target: Option<SocketAddr>,
}

impl Default for ConfigTcp {
    fn default() -> Self {
        Self {
            enabled: Some(constants::DEFAULT_PROBE_ENABLED),
            target: Some(defaults::DEFAULT_TCP_TARGET),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigUdp {
    pub enabled: Option<bool>,
    #[serde(default)]
    #[serde(deserialize_with = "socket_addr_deser")]
    pub target: Option<SocketAddr>,
}

impl Default for ConfigUdp {
    fn default() -> Self {
        Self {
            enabled: Some(constants::DEFAULT_PROBE_ENABLED),
            target: Some(defaults::DEFAULT_UDP_TARGET),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigDns {
    pub enabled: Option<bool>,
    pub hostname: Option<String>,
    #[serde(default)]
    #[serde(deserialize_with = "resolvers_deser")]
    pub resolvers: Option<Vec<ResolverSpec>>,
}

impl Default for ConfigDns {
    fn default() -> Self {
        Self {
            enabled: Some(constants::DEFAULT_PROBE_ENABLED),
            hostname: Some(String::from(defaults::DEFAULT_DNS_HOSTNAME)),
            resolvers: Some(defaults::default_resolvers()),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigHttp {
    pub enabled: Option<bool>,
    pub url: Option<String>,
}

impl Default for ConfigHttp {
    fn default() -> Self {
        Self {
            enabled: Some(constants::DEFAULT_PROBE_ENABLED),
            url: Some(String::from(defaults::DEFAULT_HTTP_URL)),
        }
    }
}

fn humantime_deser<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    humantime::parse_duration(&String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
        .map(Some)
}

fn addr_deser<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    IpAddr::from_str(&String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
        .map(Some)
}

fn socket_addr_deser<'de, D>(deserializer: D) -> Result<Option<SocketAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    SocketAddr::from_str(&String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
        .map(Some)
}

fn resolvers_deser<'de, D>(deserializer: D) -> Result<Option<Vec<ResolverSpec>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|resolver| parse_resolver(resolver).map_err(serde::de::Error::custom))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_config_template() {
        let config: ConfigFile =
            toml::from_str(include_str!("../../internetz-config-template.toml")).unwrap();
        pretty_assertions::assert_eq!(ConfigFile::default(), config);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: ConfigFile = toml::from_str(
            r#"
            [schedule]
            period = "250ms"

            [icmp]
            enabled = false

            [dns]
            resolvers = ["quad9=9.9.9.9"]

            [http]
            url = "http://10.0.0.1/"
            "#,
        )
        .unwrap();
        let expected = ConfigFile {
            internetz: None,
            schedule: Some(ConfigSchedule {
                period: Some(Duration::from_millis(250)),
                timeout: None,
            }),
            icmp: Some(ConfigIcmp {
                enabled: Some(false),
                target: None,
            }),
            tcp: None,
            udp: None,
            dns: Some(ConfigDns {
                enabled: None,
                hostname: None,
                resolvers: Some(vec![ResolverSpec::named(
                    "quad9",
                    IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
                )]),
            }),
            http: Some(ConfigHttp {
                enabled: None,
                url: Some(String::from("http://10.0.0.1/")),
            }),
        };
        pretty_assertions::assert_eq!(expected, config);
    }

    #[test]
    fn test_unknown_field() {
        let err = toml::from_str::<ConfigFile>("[tcp]\nport = 80\n").unwrap_err();
        assert!(err.to_string().contains("unknown field `port`"));
    }

    #[test]
    fn test_bad_resolver() {
        let err = toml::from_str::<ConfigFile>("[dns]\nresolvers = [\"quad9\"]\n").unwrap_err();
        assert!(err.to_string().contains("invalid resolver"));
    }
}
