// Integration tests for the SSH transport against an in-process russh server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use russh::keys::PrivateKey;
use russh::keys::ssh_key::private::Ed25519Keypair;
use russh::server::{self, Auth, Msg, Server as _, Session};
use russh::{Channel, ChannelId, CryptoVec};
use tokio::net::TcpListener;

use cfgrab::device::{DeviceDescriptor, DeviceModel};
use cfgrab::error::{ErrorKind, FetchError};
use cfgrab::transport::{HostKeyVerification, ShellClient, ShellOptions, ShellRequest};
use cfgrab::{EngineConfig, Orchestrator};

// ── Test server ─────────────────────────────────────────────────────

const PASSWORD: &str = "s3cret";

/// What the server sends back for one command.
#[derive(Debug, Clone, Default)]
struct Reply {
    stdout: &'static str,
    stderr: &'static str,
    exit_status: u32,
}

impl Reply {
    fn stdout(text: &'static str) -> Self {
        Self {
            stdout: text,
            ..Default::default()
        }
    }

    fn failing(exit_status: u32, stderr: &'static str) -> Self {
        Self {
            stderr,
            exit_status,
            ..Default::default()
        }
    }
}

/// Connection and command bookkeeping shared with the tests.
#[derive(Default)]
struct Activity {
    opened: AtomicUsize,
    closed: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl Activity {
    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Wait until every accepted connection has ended.
    async fn wait_all_closed(&self) {
        for _ in 0..100 {
            let opened = self.opened.load(Ordering::SeqCst);
            if opened > 0 && self.closed.load(Ordering::SeqCst) == opened {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "{} of {} connection(s) still open",
            self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst),
            self.opened.load(Ordering::SeqCst)
        );
    }
}

#[derive(Clone)]
struct ScriptedServer {
    script: Arc<HashMap<String, Reply>>,
    activity: Arc<Activity>,
}

impl server::Server for ScriptedServer {
    type Handler = ScriptedSession;

    fn new_client(&mut self, _: Option<std::net::SocketAddr>) -> ScriptedSession {
        self.activity.opened.fetch_add(1, Ordering::SeqCst);
        ScriptedSession {
            script: self.script.clone(),
            activity: self.activity.clone(),
        }
    }
}

/// One client connection. Dropped when the connection ends.
struct ScriptedSession {
    script: Arc<HashMap<String, Reply>>,
    activity: Arc<Activity>,
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.activity.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl server::Handler for ScriptedSession {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        if password == PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).to_string();
        self.activity.commands.lock().unwrap().push(command.clone());

        let reply = self
            .script
            .get(&command)
            .cloned()
            .unwrap_or_else(|| Reply::failing(127, "sh: command not found"));

        session.channel_success(channel)?;
        if !reply.stdout.is_empty() {
            session.data(channel, CryptoVec::from(reply.stdout))?;
        }
        if !reply.stderr.is_empty() {
            session.extended_data(channel, 1, CryptoVec::from(reply.stderr))?;
        }
        session.exit_status_request(channel, reply.exit_status)?;
        session.eof(channel)?;
        session.close(channel)?;
        Ok(())
    }
}

/// Start a server answering from `script`. Returns its port.
async fn start_server(script: &[(&str, Reply)]) -> (u16, Arc<Activity>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Arc::new(server::Config {
        auth_rejection_time: Duration::ZERO,
        auth_rejection_time_initial: Some(Duration::ZERO),
        keys: vec![PrivateKey::from(Ed25519Keypair::from_seed(&[7; 32]))],
        ..Default::default()
    });

    let activity = Arc::new(Activity::default());
    let mut server = ScriptedServer {
        script: Arc::new(
            script
                .iter()
                .map(|(command, reply)| (command.to_string(), reply.clone()))
                .collect(),
        ),
        activity: activity.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = server.run_on_socket(config, &listener).await;
    });

    (port, activity)
}

fn client() -> ShellClient {
    ShellClient::new(ShellOptions {
        host_key_verification: HostKeyVerification::Disabled,
        ..Default::default()
    })
}

fn device(port: u16, password: &str) -> DeviceDescriptor {
    DeviceDescriptor::builder("127.0.0.1")
        .port(port)
        .username("admin")
        .password(password)
        .build()
        .unwrap()
}

fn request(command: &str) -> ShellRequest {
    ShellRequest::new(command)
}

async fn fetch(port: u16, password: &str, request: &ShellRequest) -> Result<String, FetchError> {
    tokio::time::timeout(
        Duration::from_secs(10),
        client().fetch(&device(port, password), request),
    )
    .await
    .expect("fetch did not finish")
}

// ── Fetch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stdout_is_returned_cleaned() {
    let (port, activity) = start_server(&[(
        "show running-config",
        Reply::stdout("\x1b[1mhostname r1\x1b[0m\r\ninterface Ethernet1\r\n"),
    )])
    .await;

    let config = fetch(port, PASSWORD, &request("show running-config"))
        .await
        .unwrap();

    assert_eq!(config, "hostname r1\ninterface Ethernet1");
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_stderr_is_not_part_of_config() {
    let (port, activity) = start_server(&[(
        "show running-config",
        Reply {
            stdout: "hostname r1\n",
            stderr: "warning: deprecated command\n",
            exit_status: 0,
        },
    )])
    .await;

    let config = fetch(port, PASSWORD, &request("show running-config"))
        .await
        .unwrap();

    assert_eq!(config, "hostname r1");
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_json_output_is_pretty_printed() {
    let (port, _) = start_server(&[(
        "cat /etc/sonic/config_db.json",
        Reply::stdout(r#"{"DEVICE_METADATA":{"localhost":{"hostname":"leaf1"}}}"#),
    )])
    .await;

    let config = fetch(port, PASSWORD, &request("cat /etc/sonic/config_db.json"))
        .await
        .unwrap();

    assert!(config.contains("\n  \"DEVICE_METADATA\""));
    let parsed: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(parsed["DEVICE_METADATA"]["localhost"]["hostname"], "leaf1");
}

#[tokio::test]
async fn test_nonzero_exit_is_protocol_error_with_stderr() {
    let (port, activity) = start_server(&[(
        "show running-config",
        Reply::failing(1, "permission denied: running-config"),
    )])
    .await;

    let err = fetch(port, PASSWORD, &request("show running-config"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    let message = err.to_string();
    assert!(message.contains("exited with status 1"));
    assert!(message.contains("permission denied: running-config"));
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_failure_marker_in_output() {
    let (port, activity) = start_server(&[(
        "show running-config",
        Reply::stdout("% Invalid input detected at '^' marker.\n"),
    )])
    .await;

    let mut req = request("show running-config");
    req.failed_when_contains = vec!["% Invalid input".to_string()];

    let err = fetch(port, PASSWORD, &req).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert!(err.to_string().contains("'% Invalid input'"));
    activity.wait_all_closed().await;
}

// ── Fallback commands ───────────────────────────────────────────────

#[tokio::test]
async fn test_empty_output_runs_fallback() {
    let (port, activity) = start_server(&[
        ("show running-configuration", Reply::default()),
        ("cat /etc/sonic/config_db.json", Reply::stdout(r#"{"PORT":{}}"#)),
    ])
    .await;

    let mut req = request("show running-configuration");
    req.fallback_commands = vec!["cat /etc/sonic/config_db.json".to_string()];

    let config = fetch(port, PASSWORD, &req).await.unwrap();

    assert_eq!(config, "{\n  \"PORT\": {}\n}");
    assert_eq!(
        activity.commands(),
        vec!["show running-configuration", "cat /etc/sonic/config_db.json"]
    );
    // Both commands share one connection.
    activity.wait_all_closed().await;
    assert_eq!(activity.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_primary_command_runs_fallback() {
    let (port, activity) = start_server(&[
        (
            "show running-configuration",
            Reply::failing(2, "Error: No such command \"running-configuration\"."),
        ),
        ("cat /etc/sonic/config_db.json", Reply::stdout(r#"{"PORT":{}}"#)),
    ])
    .await;

    let mut req = request("show running-configuration");
    req.fallback_commands = vec!["cat /etc/sonic/config_db.json".to_string()];
    req.failed_when_contains = vec!["Error: No such command".to_string()];

    let config = fetch(port, PASSWORD, &req).await.unwrap();

    assert_eq!(config, "{\n  \"PORT\": {}\n}");
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_primary_error_kept_when_fallback_prints_nothing() {
    let (port, activity) = start_server(&[
        ("show running-configuration", Reply::failing(2, "Error: No such command")),
        ("cat /etc/sonic/config_db.json", Reply::failing(1, "No such file or directory")),
    ])
    .await;

    let mut req = request("show running-configuration");
    req.fallback_commands = vec!["cat /etc/sonic/config_db.json".to_string()];

    let err = fetch(port, PASSWORD, &req).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert!(err.to_string().contains("'show running-configuration' exited with status 2"));
    assert_eq!(activity.commands().len(), 2);
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_empty_output_everywhere_is_empty_config() {
    let (port, _) = start_server(&[
        ("show running-configuration", Reply::default()),
        ("cat /etc/sonic/config_db.json", Reply::failing(1, "No such file or directory")),
    ])
    .await;

    let mut req = request("show running-configuration");
    req.fallback_commands = vec!["cat /etc/sonic/config_db.json".to_string()];

    assert_eq!(fetch(port, PASSWORD, &req).await.unwrap(), "");
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let (port, activity) = start_server(&[("show running-config", Reply::stdout("x"))]).await;

    let err = fetch(port, "wrong", &request("show running-config"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Auth {
            user: "admin".to_string()
        }
    );
    assert!(activity.commands().is_empty());
    activity.wait_all_closed().await;
}

#[tokio::test]
async fn test_unreadable_key_falls_back_to_password() {
    let (port, _) = start_server(&[("show running-config", Reply::stdout("hostname r1"))]).await;

    let device = DeviceDescriptor::builder("127.0.0.1")
        .port(port)
        .username("admin")
        .private_key("/nonexistent/id_ed25519")
        .password(PASSWORD)
        .build()
        .unwrap();

    let config = client()
        .fetch(&device, &request("show running-config"))
        .await
        .unwrap();
    assert_eq!(config, "hostname r1");
}

// ── Host keys ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_strict_rejects_unknown_host_key() {
    let (port, activity) = start_server(&[("show running-config", Reply::stdout("x"))]).await;
    let dir = tempfile::tempdir().unwrap();
    let known_hosts = dir.path().join("known_hosts");
    std::fs::write(&known_hosts, "").unwrap();

    let client = ShellClient::new(ShellOptions {
        host_key_verification: HostKeyVerification::Strict,
        known_hosts_path: Some(known_hosts),
        ..Default::default()
    });
    let err = client
        .fetch(&device(port, PASSWORD), &request("show running-config"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert!(err.to_string().contains("not in known_hosts"));
    assert!(activity.commands().is_empty());
}

#[tokio::test]
async fn test_accept_new_learns_host_key() {
    let (port, _) = start_server(&[("show running-config", Reply::stdout("hostname r1"))]).await;
    let dir = tempfile::tempdir().unwrap();
    let known_hosts = dir.path().join("known_hosts");

    let client = ShellClient::new(ShellOptions {
        host_key_verification: HostKeyVerification::AcceptNew,
        known_hosts_path: Some(known_hosts.clone()),
        ..Default::default()
    });
    let device = device(port, PASSWORD);

    client.fetch(&device, &request("show running-config")).await.unwrap();
    let learned = std::fs::read_to_string(&known_hosts).unwrap();
    assert!(learned.contains("ssh-ed25519"));

    // Second connection matches the learned key.
    client.fetch(&device, &request("show running-config")).await.unwrap();
}

// ── Probe ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_authenticates_without_commands() {
    let (port, activity) = start_server(&[]).await;

    client().probe(&device(port, PASSWORD)).await.unwrap();
    let err = client().probe(&device(port, "wrong")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthError);
    assert!(activity.commands().is_empty());
    activity.wait_all_closed().await;
    assert_eq!(activity.opened.load(Ordering::SeqCst), 2);
}

// ── Through the orchestrator ────────────────────────────────────────

#[tokio::test]
async fn test_sonic_device_falls_back_to_config_db() {
    let (port, activity) = start_server(&[
        (
            "show running-configuration",
            Reply::failing(2, "Error: No such command \"running-configuration\"."),
        ),
        (
            "cat /etc/sonic/config_db.json",
            Reply::stdout(r#"{"DEVICE_METADATA":{"localhost":{"hostname":"leaf1"}}}"#),
        ),
    ])
    .await;

    let config = EngineConfig::default().with_shell(ShellOptions {
        host_key_verification: HostKeyVerification::Disabled,
        ..Default::default()
    });
    let orchestrator = Orchestrator::from_engine_config(&config).unwrap();
    let sonic = DeviceDescriptor::builder("127.0.0.1")
        .port(port)
        .username("admin")
        .password(PASSWORD)
        .model(DeviceModel::Sonic)
        .build()
        .unwrap();

    let result = orchestrator.retrieve(&[Arc::new(sonic)]).await;

    assert_eq!(result.succeeded(), 1);
    let parsed: serde_json::Value =
        serde_json::from_str(result.outcomes()[0].raw_config().unwrap()).unwrap();
    assert_eq!(parsed["DEVICE_METADATA"]["localhost"]["hostname"], "leaf1");
    assert_eq!(
        activity.commands(),
        vec!["show running-configuration", "cat /etc/sonic/config_db.json"]
    );
}
