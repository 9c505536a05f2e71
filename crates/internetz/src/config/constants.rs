use crate::config::LogSpanEvents;

/// The default value for `log-span-events`.
pub const DEFAULT_LOG_SPAN_EVENTS: LogSpanEvents = LogSpanEvents::Off;

/// The default value for `log-filter`.
pub const DEFAULT_LOG_FILTER: &str = "internetz=info";

/// The default value for `icmp`, `tcp`, `udp` and `dns`.
pub const DEFAULT_PROBE_ENABLED: bool = true;
