//! Watchdog reconciliation against a scripted host, including the live
//! liveness-probe path over a local listener.

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;

use common::{healthy_host, test_ctx};
use stackpilot::config::ServiceProbe;
use stackpilot::exec::{CmdOutput, FakeRunner};
use stackpilot::watchdog::reconcile_once;

/// One-shot HTTP server answering a fixed status line.
fn serve_once(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .as_bytes(),
            );
        }
    });
    format!("http://{addr}/health")
}

#[test]
fn inactive_swarm_is_reinitialized() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let runner = FakeRunner::new();
    runner.always(
        "docker info --format {{.Swarm.LocalNodeState}}",
        CmdOutput::ok("inactive\n"),
    );
    healthy_host(&runner);

    let report = reconcile_once(&ctx, &runner);
    assert!(report.issues >= 1);
    assert!(!runner.calls_matching("docker swarm init").is_empty());
}

#[test]
fn unhealthy_service_gets_a_container_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = test_ctx(dir.path());
    ctx.probes.push(ServiceProbe {
        name: "api".into(),
        url: serve_once("HTTP/1.1 503 Service Unavailable"),
    });

    let runner = FakeRunner::new();
    healthy_host(&runner);

    let report = reconcile_once(&ctx, &runner);
    assert_eq!(report.issues, 1);
    assert_eq!(report.fixes, 1);
    assert_eq!(runner.calls_matching("docker restart api").len(), 1);
}

#[test]
fn healthy_service_probe_causes_no_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = test_ctx(dir.path());
    ctx.probes.push(ServiceProbe {
        name: "api".into(),
        url: serve_once("HTTP/1.1 200 OK"),
    });

    let runner = FakeRunner::new();
    healthy_host(&runner);

    let report = reconcile_once(&ctx, &runner);
    assert_eq!((report.issues, report.fixes), (0, 0));
    assert!(runner.calls_matching("docker restart").is_empty());
}

#[test]
fn missing_nameserver_restarts_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    std::fs::write(&ctx.watchdog.resolv_conf, "# empty\n").unwrap();

    let runner = FakeRunner::new();
    healthy_host(&runner);

    let report = reconcile_once(&ctx, &runner);
    assert_eq!(report.issues, 1);
    assert_eq!(
        runner.calls_matching("systemctl restart systemd-resolved").len(),
        1
    );
}
