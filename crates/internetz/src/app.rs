use crate::config::{InternetzConfig, LogFormat, LogSpanEvents};
use crate::netinfo;
use crate::report::Reporter;
use crate::signal::Signals;
use internetz_core::{
    DnsProbeBuilder, HttpProbeBuilder, IcmpProbeBuilder, PlatformImpl, ProbeId, SocketImpl,
    Supervisor, TcpProbeBuilder, UdpProbeBuilder,
};
use internetz_privilege::{Capabilities, FileCaps, PrivilegeManager};
use tracing::{debug, error, info};
use tracing_subscriber::fmt::format::FmtSpan;

/// Run the probes until shut down by a signal or, if so configured, a probe start failure.
pub fn run_internetz(cfg: &InternetzConfig) -> anyhow::Result<()> {
    let signals = Signals::block()?;
    configure_logging(cfg);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        probes = cfg.probe_count(),
        period = ?cfg.loop_config.period,
        timeout = ?cfg.loop_config.timeout,
        startup_failure = %cfg.startup_failure,
        "starting"
    );
    log_file_caps(internetz_privilege::executable_file_caps());
    drop_privileges(&PrivilegeManager::system());
    netinfo::log_host_addrs::<PlatformImpl>();
    let mut supervisor = Supervisor::new(cfg.loop_config);
    let mut reporter = Reporter::new(cfg.startup_failure, supervisor.cancellation());
    let _signal_handler = signals.spawn_handler(supervisor.cancellation())?;
    for probe in start_probes(cfg, &mut supervisor)? {
        reporter.register(probe);
    }
    reporter.run(supervisor.events(), &supervisor.token());
    let events = supervisor.events().clone();
    supervisor.shutdown();
    reporter.drain(events.try_iter());
    reporter.log_summary();
    info!("stopped");
    Ok(())
}

/// Clear the raw network privilege so that it is only effective while a socket is opened.
///
/// Failure is logged and startup continues; probes needing the privilege
/// report their own failure.
fn drop_privileges<C: Capabilities>(privilege: &PrivilegeManager<C>) {
    match privilege.state() {
        Ok(state) => info!(
            effective = state.effective,
            permitted = state.permitted,
            "CAP_NET_RAW at start"
        ),
        Err(err) => error!(error = %err, "failed to read CAP_NET_RAW state"),
    }
    if let Err(err) = privilege.drop_privileges() {
        error!(error = %err, "failed to drop privileges");
    }
}

/// Log the capabilities granted to this executable by `setcap`.
fn log_file_caps(caps: internetz_privilege::Result<Option<FileCaps>>) {
    match caps {
        Ok(Some(caps)) => info!(
            permitted = format!("{:#x}", caps.permitted),
            inheritable = format!("{:#x}", caps.inheritable),
            effective = caps.effective,
            net_raw = caps.has_net_raw(),
            "file capabilities"
        ),
        Ok(None) => debug!("no file capabilities"),
        Err(err) => error!(error = %err, "failed to read file capabilities"),
    }
}

/// Spawn a loop for every enabled probe, one per resolver for `DNS`.
fn start_probes(cfg: &InternetzConfig, supervisor: &mut Supervisor) -> anyhow::Result<Vec<ProbeId>> {
    let mut probes = Vec::with_capacity(cfg.probe_count());
    if let Some(icmp) = &cfg.icmp {
        probes.push(supervisor.spawn(IcmpProbeBuilder::new(icmp.clone()))?);
    }
    if let Some(tcp) = cfg.tcp {
        probes.push(supervisor.spawn(TcpProbeBuilder::<SocketImpl>::new(tcp))?);
    }
    if let Some(udp) = &cfg.udp {
        probes.push(supervisor.spawn(UdpProbeBuilder::<SocketImpl>::new(udp.clone()))?);
    }
    if let Some(dns) = &cfg.dns {
        for resolver in &dns.resolvers {
            probes.push(supervisor.spawn(DnsProbeBuilder::new(
                dns.hostname.clone(),
                resolver.clone(),
                cfg.loop_config.timeout,
            ))?);
        }
    }
    if let Some(http) = &cfg.http {
        probes.push(supervisor.spawn(HttpProbeBuilder::new(http.clone()))?);
    }
    Ok(probes)
}

fn configure_logging(cfg: &InternetzConfig) {
    let fmt_span = match cfg.log_span_events {
        LogSpanEvents::Off => FmtSpan::NONE,
        LogSpanEvents::Active => FmtSpan::ACTIVE,
        LogSpanEvents::Full => FmtSpan::FULL,
    };
    match cfg.log_format {
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_span_events(fmt_span)
                .with_env_filter(&cfg.log_filter)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_span_events(fmt_span)
                .with_env_filter(&cfg.log_filter)
                .with_writer(std::io::stderr)
                .pretty()
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_span_events(fmt_span)
                .with_env_filter(&cfg.log_filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
    }
}
