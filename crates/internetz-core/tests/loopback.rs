#![cfg(feature = "net-tests")]
//! Probes run against the loopback interface.
//!
//! These need a real network stack and, for `ICMP`, either membership of
//! `net.ipv4.ping_group_range` or `CAP_NET_RAW`.

use internetz_core::{
    DownReason, HttpConfig, HttpProbeBuilder, IcmpConfig, IcmpProbeBuilder, LoopConfig, Outcome,
    OutcomeKind, Probe, ProbeBuilder, ProbeEvent, SocketImpl, Supervisor, TcpConfig,
    TcpProbeBuilder, UdpConfig, UdpProbeBuilder,
};
use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::thread::{self, JoinHandle};
use std::sync::Once;
use std::time::{Duration, Instant};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("internetz_core=debug")
            .with_test_writer()
            .init();
    });
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(2)
}

#[test]
fn test_icmp_loopback() -> anyhow::Result<()> {
    init_logging();
    let config = IcmpConfig {
        target: Ipv4Addr::LOCALHOST,
        ..IcmpConfig::default()
    };
    let mut probe = IcmpProbeBuilder::new(config).build()?;
    for _ in 0..3 {
        let outcome = probe.check(deadline())?;
        assert!(matches!(outcome, Outcome::Ok(_)), "{outcome:?}");
    }
    Ok(())
}

#[test]
fn test_tcp_loopback() -> anyhow::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let target = listener.local_addr()?;
    let mut probe = TcpProbeBuilder::<SocketImpl>::new(TcpConfig { target }).build()?;
    let outcome = probe.check(deadline())?;
    assert!(matches!(outcome, Outcome::Ok(_)), "{outcome:?}");
    Ok(())
}

#[test]
fn test_tcp_loopback_refused() -> anyhow::Result<()> {
    init_logging();
    let target = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let mut probe = TcpProbeBuilder::<SocketImpl>::new(TcpConfig { target }).build()?;
    let outcome = probe.check(deadline())?;
    assert!(
        matches!(outcome, Outcome::Down(DownReason::Refused)),
        "{outcome:?}"
    );
    Ok(())
}

/// Answer one request with the given status line and return the request line.
fn serve_once(listener: TcpListener, status: &'static str) -> JoinHandle<String> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request = String::new();
        reader.read_line(&mut request).unwrap();
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 2 {
            line.clear();
        }
        let mut stream = stream;
        write!(stream, "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .unwrap();
        request
    })
}

fn http_probe(target: SocketAddr) -> anyhow::Result<impl Probe> {
    let url = format!("http://{target}/robots.txt");
    Ok(HttpProbeBuilder::new(HttpConfig { url }).build()?)
}

#[test]
fn test_http_loopback() -> anyhow::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let mut probe = http_probe(listener.local_addr()?)?;
    let server = serve_once(listener, "200 OK");
    let outcome = probe.check(deadline())?;
    assert!(matches!(outcome, Outcome::Ok(_)), "{outcome:?}");
    assert_eq!("HEAD /robots.txt HTTP/1.1\r\n", server.join().unwrap());
    Ok(())
}

#[test]
fn test_http_loopback_not_found() -> anyhow::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let mut probe = http_probe(listener.local_addr()?)?;
    let server = serve_once(listener, "404 Not Found");
    let outcome = probe.check(deadline())?;
    assert!(
        matches!(outcome, Outcome::Down(DownReason::Status(404))),
        "{outcome:?}"
    );
    server.join().unwrap();
    Ok(())
}

#[test]
fn test_http_loopback_refused() -> anyhow::Result<()> {
    init_logging();
    let target = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let mut probe = http_probe(target)?;
    let outcome = probe.check(deadline())?;
    assert!(
        matches!(outcome, Outcome::Down(DownReason::Refused)),
        "{outcome:?}"
    );
    Ok(())
}

#[test]
fn test_http_loopback_timeout() -> anyhow::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let mut probe = http_probe(listener.local_addr()?)?;
    let outcome = probe.check(Instant::now() + Duration::from_millis(200))?;
    assert!(
        matches!(outcome, Outcome::Down(DownReason::Timeout)),
        "{outcome:?}"
    );
    drop(listener);
    Ok(())
}

#[test]
fn test_udp_loopback() -> anyhow::Result<()> {
    init_logging();
    let server = UdpSocket::bind("127.0.0.1:0")?;
    let config = UdpConfig {
        target: server.local_addr()?,
        payload: b"hello".to_vec(),
    };
    let mut probe = UdpProbeBuilder::<SocketImpl>::new(config).build()?;
    let outcome = probe.check(deadline())?;
    assert!(matches!(outcome, Outcome::Ok(_)), "{outcome:?}");
    let mut buf = [0_u8; 16];
    server.set_read_timeout(Some(Duration::from_secs(1)))?;
    let (len, _) = server.recv_from(&mut buf)?;
    assert_eq!(b"hello", &buf[..len]);
    Ok(())
}

#[test]
fn test_supervisor_loopback() -> anyhow::Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let target: SocketAddr = listener.local_addr()?;
    let mut supervisor = Supervisor::new(LoopConfig {
        period: Duration::from_millis(100),
        timeout: Duration::from_secs(1),
    });
    supervisor.spawn(IcmpProbeBuilder::new(IcmpConfig {
        target: Ipv4Addr::LOCALHOST,
        ..IcmpConfig::default()
    }))?;
    supervisor.spawn(TcpProbeBuilder::<SocketImpl>::new(TcpConfig { target }))?;
    let kinds = supervisor
        .events()
        .iter()
        .take(6)
        .map(|event| match event {
            ProbeEvent::Checked(check) => check.outcome.kind(),
            ProbeEvent::Failed(failed) => panic!("{} failed to start: {}", failed.probe, failed.error),
        })
        .collect::<Vec<_>>();
    assert!(supervisor.shutdown().is_empty());
    assert!(kinds.iter().all(|kind| *kind == OutcomeKind::Ok), "{kinds:?}");
    Ok(())
}
