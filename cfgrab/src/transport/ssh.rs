//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use russh::ChannelMsg;
use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use secrecy::ExposeSecret;

use super::ShellRequest;
use super::config::{HostKeyVerification, ShellOptions};
use super::output::{OutputBuffer, excerpt, failure_marker, normalize_config};
use crate::device::{AuthMethod, DeviceDescriptor};
use crate::error::FetchError;

/// Shell client: one SSH connection per fetch, one exec channel per command.
#[derive(Debug, Clone, Default)]
pub struct ShellClient {
    options: ShellOptions,
}

impl ShellClient {
    pub fn new(options: ShellOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Run the request's command and return its cleaned output.
    ///
    /// The session is closed before returning, whatever the outcome.
    pub async fn fetch(
        &self,
        device: &DeviceDescriptor,
        request: &ShellRequest,
    ) -> Result<String, FetchError> {
        let session = self.connect(device).await?;
        let result = session.run(request).await;
        session.close().await;
        result
    }

    /// Connect and authenticate, then disconnect.
    pub async fn probe(&self, device: &DeviceDescriptor) -> Result<(), FetchError> {
        let session = self.connect(device).await?;
        session.close().await;
        Ok(())
    }

    async fn connect(&self, device: &DeviceDescriptor) -> Result<ShellSession, FetchError> {
        let port = device.ssh_port();
        let target = format!("{}:{}", device.host(), port);

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(self.options.inactivity_timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: device.host().to_string(),
            port,
            host_key_verification: self.options.host_key_verification.clone(),
            known_hosts_path: self.options.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("Connecting to {target}");
        let handle = client::connect(ssh_config, (device.host(), port), handler)
            .await
            .map_err(|e| {
                // A host key rejection surfaces from russh as a generic
                // error; the handler keeps the real reason.
                let detail = host_key_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                FetchError::connection(&target, detail.unwrap_or_else(|| e.to_string()))
            })?;

        let mut session = ShellSession { handle, target };
        if let Err(e) = authenticate(&mut session.handle, device, &session.target).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }
}

/// Try the private key first, then the password.
async fn authenticate(
    handle: &mut Handle<SshHandler>,
    device: &DeviceDescriptor,
    target: &str,
) -> Result<(), FetchError> {
    let user = device.username();
    let auth = device.auth();

    if let AuthMethod::Key {
        path, passphrase, ..
    } = auth
    {
        match load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret())) {
            Ok(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|e| FetchError::connection(target, e))?
                    .flatten();

                let accepted = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await
                    .map_err(|e| FetchError::connection(target, e))?
                    .success();
                if accepted {
                    return Ok(());
                }
                debug!("{target}: key rejected for {user}");
            }
            Err(e) => warn!("{target}: cannot load key {}: {e}", path.display()),
        }
    }

    if let Some(password) = auth.password() {
        let accepted = handle
            .authenticate_password(user, password.expose_secret())
            .await
            .map_err(|e| FetchError::connection(target, e))?
            .success();
        if accepted {
            return Ok(());
        }
    }

    Err(FetchError::Auth {
        user: user.to_string(),
    })
}

/// Output of one exec channel.
struct CommandOutput {
    stdout: String,
    stderr: String,
    exit_status: Option<u32>,
}

/// An authenticated session.
struct ShellSession {
    handle: Handle<SshHandler>,
    target: String,
}

impl ShellSession {
    /// Run the primary command, then fallbacks while it printed nothing or
    /// failed.
    ///
    /// The first fallback with output wins. Otherwise the primary's own
    /// result stands: its error, or empty output. Fallback errors are
    /// logged and skipped.
    async fn run(&self, request: &ShellRequest) -> Result<String, FetchError> {
        let primary = match self.exec_checked(&request.command, request).await {
            Ok(output) if !output.is_empty() => return Ok(normalize_config(output)),
            Ok(output) => {
                debug!("{}: '{}' printed nothing", self.target, request.command);
                Ok(output)
            }
            Err(e @ FetchError::Protocol { .. }) if !request.fallback_commands.is_empty() => {
                debug!("{}: '{}' failed, trying fallbacks: {e}", self.target, request.command);
                Err(e)
            }
            Err(e) => return Err(e),
        };

        for command in &request.fallback_commands {
            debug!("{}: trying '{command}'", self.target);
            match self.exec_checked(command, request).await {
                Ok(output) if !output.is_empty() => return Ok(normalize_config(output)),
                Ok(_) => {}
                Err(e) => debug!("{}: fallback '{command}' failed: {e}", self.target),
            }
        }

        primary
    }

    async fn exec_checked(&self, command: &str, request: &ShellRequest) -> Result<String, FetchError> {
        let output = self.exec(command).await?;
        check_output(command, output, &request.failed_when_contains)
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput, FetchError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| FetchError::connection(&self.target, e))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| FetchError::connection(&self.target, e))?;

        let mut stdout = OutputBuffer::new();
        let mut stderr = OutputBuffer::new();
        let mut exit_status = None;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                }
                Some(ChannelMsg::Eof) => {}
                Some(ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        Ok(CommandOutput {
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            exit_status,
        })
    }

    /// Disconnect. Failures are logged, never returned.
    async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            warn!("{}: failed to close session: {e}", self.target);
        }
    }
}

/// Turn a non-zero exit or a failure marker into a `ProtocolError`.
fn check_output(
    command: &str,
    output: CommandOutput,
    failed_when_contains: &[String],
) -> Result<String, FetchError> {
    if let Some(code) = output.exit_status.filter(|&code| code != 0) {
        let detail = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        return Err(FetchError::protocol(format!(
            "'{command}' exited with status {code}: {}",
            excerpt(detail)
        )));
    }

    if let Some(marker) = failure_marker(&output.stdout, failed_when_contains)
        .or_else(|| failure_marker(&output.stderr, failed_when_contains))
    {
        return Err(FetchError::protocol(format!(
            "'{command}' failed: output contains '{marker}'"
        )));
    }

    Ok(output.stdout)
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    host_key_error: Arc<Mutex<Option<String>>>,
}

impl SshHandler {
    /// `Ok(true)` if known and matching, `Ok(false)` if unknown, `Err` if
    /// changed or the file cannot be read.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, String> {
        let result = match self.known_hosts_path {
            Some(ref path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(format!(
                "host key for {}:{} changed (known_hosts line {line})",
                self.host, self.port
            )),
            Err(e) => Err(format!("known_hosts error: {e}")),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), russh::keys::Error> {
        match self.known_hosts_path {
            Some(ref path) => russh::keys::known_hosts::learn_known_hosts_path(
                &self.host, self.port, pubkey, path,
            ),
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        }
    }

    fn reject(&self, reason: String) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {e}", self.host);
                    }
                    true
                }
                Err(reason) => self.reject(reason),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(format!(
                    "host key for {}:{} is not in known_hosts",
                    self.host, self.port
                )),
                Err(reason) => self.reject(reason),
            },
        };
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_refused_port_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let device = DeviceDescriptor::builder("127.0.0.1")
            .port(port)
            .username("admin")
            .password("pw")
            .build()
            .unwrap();

        let client = ShellClient::new(ShellOptions {
            host_key_verification: HostKeyVerification::Disabled,
            ..Default::default()
        });
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client.fetch(&device, &ShellRequest::new("show running-config")),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
