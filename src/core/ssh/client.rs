use crate::error::{Error, Result};
use crate::hosts::Target;
use crate::transport::{CommandOutput, Transport};
use std::io::Write;
use std::process::{Command, Stdio};

pub struct SshClient {
    pub label: String,
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host address is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshClient {
    pub fn from_target(target: &Target) -> Result<Self> {
        let identity_file = match &target.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        target.label.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&target.address);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", target.label);
        }

        Ok(Self {
            label: target.label.clone(),
            host: target.address.clone(),
            user: target.user.clone(),
            port: target.port,
            identity_file,
            is_local,
        })
    }

    fn build_ssh_args(&self, command: Option<&str>, interactive: bool) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Non-interactive runs must never block on a prompt or a dead link.
        if !interactive {
            args.extend([
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                "ConnectTimeout=10".to_string(),
                "-o".to_string(),
                "ServerAliveInterval=15".to_string(),
                "-o".to_string(),
                "ServerAliveCountMax=3".to_string(),
            ]);
        }

        args.push(format!("{}@{}", self.user, self.host));

        if let Some(cmd) = command {
            args.push(cmd.to_string());
        }

        args
    }

    fn execute_with_retry(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
        max_attempts: u32,
    ) -> CommandOutput {
        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3

        for attempt in 0..max_attempts {
            let result = self.execute_once(command, stdin);

            if result.success || attempt + 1 >= max_attempts || !is_connection_failure(&result) {
                return result;
            }

            let delay = backoff_secs.get(attempt as usize + 1).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection to {} failed (attempt {}/{}), retrying in {}s...",
                self.label,
                attempt + 1,
                max_attempts,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }

        CommandOutput::failed(-1, "SSH retry exhausted")
    }

    fn execute_once(&self, command: &str, stdin: Option<&[u8]>) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command, stdin);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(Some(command), false));
        capture(cmd, stdin, "SSH error")
    }

    pub fn execute_interactive(&self, command: Option<&str>) -> i32 {
        if self.is_local {
            return execute_local_command_interactive(command.unwrap_or("bash"));
        }

        let args = self.build_ssh_args(command, true);

        let status = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status();

        match status {
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => -1,
        }
    }
}

impl Transport for SshClient {
    fn execute(&self, command: &str, stdin: Option<&[u8]>) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command, stdin);
        }
        self.execute_with_retry(command, stdin, 3)
    }

    fn describe(&self) -> String {
        if self.is_local {
            format!("local:{}", self.label)
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }
}

pub fn execute_local_command(command: &str, stdin: Option<&[u8]>) -> CommandOutput {
    capture(shell_command(command), stdin, "Command error")
}

pub fn execute_local_command_interactive(command: &str) -> i32 {
    let status = shell_command(command)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();

    match status {
        Ok(s) => s.code().unwrap_or(-1),
        Err(_) => -1,
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    let cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd
}

fn capture(mut cmd: Command, stdin: Option<&[u8]>, error_prefix: &str) -> CommandOutput {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutput::failed(-1, format!("{}: {}", error_prefix, e)),
    };

    if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
        if let Err(e) = pipe.write_all(bytes) {
            let _ = child.kill();
            return CommandOutput::failed(-1, format!("Failed to write stdin: {}", e));
        }
        // Dropping the pipe closes stdin so `cat > path` can finish.
    }

    match child.wait_with_output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("{}: {}", error_prefix, e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Only the ssh binary's own connection failure (exit 255) is retried.
/// Remote stderr is never inspected: the command may already have run.
fn is_connection_failure(output: &CommandOutput) -> bool {
    output.exit_code == 255
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(port: u16, identity: Option<&str>) -> SshClient {
        SshClient {
            label: "web1".to_string(),
            host: "10.0.0.5".to_string(),
            user: "deploy".to_string(),
            port,
            identity_file: identity.map(str::to_string),
            is_local: false,
        }
    }

    #[test]
    fn batch_args_include_timeouts() {
        let args = client(2222, Some("/keys/id")).build_ssh_args(Some("uptime"), false);
        assert_eq!(&args[..4], &["-i", "/keys/id", "-p", "2222"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(args[args.len() - 2], "deploy@10.0.0.5");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn interactive_args_skip_batch_options() {
        let args = client(22, None).build_ssh_args(None, true);
        assert_eq!(args, vec!["deploy@10.0.0.5"]);
    }

    #[test]
    fn only_ssh_exit_255_counts_as_connection_failure() {
        assert!(is_connection_failure(&CommandOutput::failed(255, "")));
        assert!(!is_connection_failure(&CommandOutput::failed(
            2,
            "psql: could not connect to server: Connection refused"
        )));
        assert!(!is_connection_failure(&CommandOutput::failed(
            128,
            "ssh: Could not resolve hostname origin"
        )));
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let mut target = Target::new("web1", "10.0.0.5", "deploy");
        target.identity_file = Some("/nonexistent/stagehand/key".to_string());
        let err = SshClient::from_target(&target).err().map(|e| e.code.as_str());
        assert_eq!(err, Some("ssh.identity_file_not_found"));
    }

    #[cfg(unix)]
    #[test]
    fn remote_connection_errors_in_stderr_do_not_rerun_command() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("appended");
        let mut local = client(22, None);
        local.is_local = true;

        let command = format!(
            "echo line >> '{}'; echo 'psql: Connection refused' >&2; exit 2",
            log.display()
        );
        let out = local.execute(&command, None);

        assert_eq!(out.exit_code, 2);
        let lines = std::fs::read_to_string(&log).unwrap();
        assert_eq!(lines.lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn local_execution_feeds_stdin() {
        let out = execute_local_command("cat", Some(b"hello"));
        assert!(out.success);
        assert_eq!(out.stdout, "hello");
    }
}
