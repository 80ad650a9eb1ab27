//! Integration tests for governd
//!
//! These exercise the governance core end-to-end with real OS processes
//! and a live control channel.

use govern_config::{parse_config, ApplicationConfig, StartConfig};
use govern_core::{
    Activator, Governor, GovernorBinding, HostedApplication, ProcessActivator,
    TerminalContext, TerminalRegistry,
};
use govern_ipc::{BindingUri, ServerEvent, SipcClient, SipcServer, CMD_STOP};
use govern_util::AppName;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn test_binding() -> GovernorBinding {
    GovernorBinding {
        scheme: "sipc".into(),
        host: "127.0.0.1".into(),
        port: 4410,
    }
}

fn make_app(
    name: &str,
    pairs: &[(&str, &str)],
    stop_timeout: Duration,
) -> HostedApplication {
    HostedApplication::new(ApplicationConfig {
        name: AppName::new(name),
        stop_timeout,
        start: StartConfig::from_pairs(pairs.iter().copied()),
    })
}

#[tokio::test]
async fn prompt_exit_needs_no_kill() {
    let activator = ProcessActivator::new(test_binding());
    let mut app = make_app(
        "echoer",
        &[("executable", "true")],
        Duration::from_secs(2),
    );

    let start = activator.start(&mut app).await;
    assert!(start.started);
    assert!(start.warning.is_none());
    assert!(app.is_running());

    let stop = activator.stop(&mut app).await;
    assert!(stop.stopped);
    assert!(!stop.forced, "prompt exit must not escalate to kill");
    assert!(!app.is_running());
}

#[tokio::test]
async fn hung_process_is_killed_after_timeout() {
    let activator = ProcessActivator::new(test_binding());
    let mut app = make_app(
        "hog",
        &[("executable", "sleep"), ("args", "60")],
        Duration::from_secs(1),
    );

    let start = activator.start(&mut app).await;
    assert!(start.started);

    let waiting_since = Instant::now();
    let stop = activator.stop(&mut app).await;
    let waited = waiting_since.elapsed();

    assert!(stop.stopped);
    assert!(stop.forced, "never-exiting child must be killed");
    assert!(stop.warning.is_none());
    assert!(
        waited >= Duration::from_secs(1),
        "stop must not return before the timeout elapsed, returned after {waited:?}"
    );
    assert!(
        waited < Duration::from_secs(5),
        "kill escalation should end the wait promptly, took {waited:?}"
    );
    assert!(!app.is_running());
}

#[tokio::test]
async fn zero_timeout_kills_immediately() {
    let activator = ProcessActivator::new(test_binding());
    let mut app = make_app(
        "hog",
        &[("executable", "sleep"), ("args", "60")],
        Duration::ZERO,
    );

    assert!(activator.start(&mut app).await.started);

    let waiting_since = Instant::now();
    let stop = activator.stop(&mut app).await;

    assert!(stop.stopped);
    assert!(stop.forced);
    assert!(waiting_since.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn stop_command_travels_the_control_channel() {
    // Governor side: live listener on an OS-assigned port
    let mut server = SipcServer::new("127.0.0.1", 0);
    server.start().await.unwrap();
    let port = server.port();
    let mut events = server.take_event_receiver().await.unwrap();

    let server = Arc::new(server);
    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let config = parse_config(&format!(
        r#"
        config_version = 1

        [governor]
        bind_port = {port}

        [[applications]]
        name = "child"
        stop_timeout_seconds = 1

        [applications.start]
        executable = "sleep"
        args = "60"
        "#
    ))
    .unwrap();

    let activator = Arc::new(ProcessActivator::new(GovernorBinding {
        scheme: "sipc".into(),
        host: "127.0.0.1".into(),
        port,
    }));
    let governor = Arc::new(Governor::new(&config, activator));

    // Child side: dial back and identify, the way a governed process does
    // once pragma substitution hands it the URI
    let uri = BindingUri::new("sipc", "127.0.0.1", port, AppName::new("child"));
    let client = SipcClient::connect(&uri).await.unwrap();

    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(client.run(move |command| {
        let _ = seen_tx.send(command.to_string());
    }));

    // Connection updates land on the record independent of start/stop
    match tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("child should identify")
    {
        Some(ServerEvent::ChildConnected { app, sender }) => {
            governor.attach_connection(&app, sender).await;
        }
        other => panic!("Expected ChildConnected, got {other:?}"),
    }

    let child = AppName::new("child");
    assert!(governor.start(&child).await.unwrap().started);

    let stop = governor.stop(&child).await.unwrap();
    assert!(stop.stopped);
    // The sleep child ignores the advisory message, so escalation fires
    assert!(stop.forced);

    let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .expect("stop command should arrive")
        .expect("dispatch channel closed");
    assert_eq!(seen, CMD_STOP);
}

#[tokio::test]
async fn terminal_drives_the_governor() {
    let config = parse_config(
        r#"
        config_version = 1

        [[applications]]
        name = "billing"
        stop_timeout_seconds = 0

        [applications.start]
        executable = "sleep"
        args = "60"
        "#,
    )
    .unwrap();

    let governor = Governor::new(
        &config,
        Arc::new(ProcessActivator::new(test_binding())),
    );
    let registry = TerminalRegistry::builtin();
    let ctx = TerminalContext::privileged();

    let out = registry
        .execute(&governor, &ctx, "start billing")
        .await
        .unwrap();
    assert_eq!(out, "billing: started");

    let status = registry.execute(&governor, &ctx, "status").await.unwrap();
    assert!(status.contains("billing"));
    assert!(status.contains("running"));

    let out = registry
        .execute(&governor, &ctx, "stop billing")
        .await
        .unwrap();
    assert_eq!(out, "billing: stopped (forced kill)");

    let out = registry
        .execute(&governor, &ctx, "stop billing")
        .await
        .unwrap();
    assert_eq!(out, "billing: already stopped");
}

#[tokio::test]
async fn pragma_round_trip_through_config() {
    let config = parse_config(
        r#"
        config_version = 1

        [[applications]]
        name = "child"

        [applications.start]
        executable = "/usr/bin/child"
        args = "--governed {{gov}} --mirror {{gov}}"
        "#,
    )
    .unwrap();

    let app = &config.applications[0];
    let binding = GovernorBinding {
        scheme: "sipc".into(),
        host: "127.0.0.1".into(),
        port: 4410,
    };
    let uri = binding.uri_for(&app.name).to_string();
    let resolved = app
        .start
        .args()
        .unwrap()
        .replace(app.start.ipc_pragma(), &uri);

    assert!(!resolved.contains("{{gov}}"));
    assert_eq!(resolved.matches(&uri).count(), 2);

    // And the substituted URI parses back to the same coordinates
    let parsed = BindingUri::parse(&uri).unwrap();
    assert_eq!(parsed.port, 4410);
    assert_eq!(parsed.app, AppName::new("child"));
}
