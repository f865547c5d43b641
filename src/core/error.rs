use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidFormat,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    HostNotFound,
    TaskNotFound,
    TemplateNotFound,

    SshIdentityFileNotFound,
    SshConnectFailed,

    RemoteCommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidFormat => "config.invalid_format",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::HostNotFound => "host.not_found",
            ErrorCode::TaskNotFound => "task.not_found",
            ErrorCode::TemplateNotFound => "template.not_found",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::SshConnectFailed => "ssh.connect_failed",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidFormatDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Where a remote command ran: host plus the execution context in effect.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub host: String,
    pub identity_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNotFoundDetails {
    pub name: String,
    pub search_root: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn host_not_found(label: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::not_found(ErrorCode::HostNotFound, "Host not found", label, suggestions)
            .with_hint("Run 'stagehand hosts list' to see configured hosts")
    }

    pub fn task_not_found(name: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::not_found(ErrorCode::TaskNotFound, "Task not found", name, suggestions)
            .with_hint("Run 'stagehand tasks list' to see available tasks")
    }

    fn not_found(
        code: ErrorCode,
        message: &str,
        id: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let details = to_details(NotFoundDetails {
            id: id.into(),
            suggestions,
        });
        Self::new(code, message, details)
    }

    pub fn template_not_found(name: impl Into<String>, search_root: impl Into<String>) -> Self {
        let details = to_details(TemplateNotFoundDetails {
            name: name.into(),
            search_root: search_root.into(),
        });

        Self::new(ErrorCode::TemplateNotFound, "Template not found", details)
            .with_hint("Set 'templateDir' in settings or run from the directory holding the templates")
    }

    pub fn ssh_identity_file_not_found(
        host: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        let details = to_details(SshIdentityFileNotFoundDetails {
            host: host.into(),
            identity_file: identity_file.into(),
        });

        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
    }

    pub fn ssh_connect_failed(details: RemoteCommandFailedDetails) -> Self {
        let mut err = Self::new(
            ErrorCode::SshConnectFailed,
            "Could not connect to host",
            to_details(details),
        );
        err.retryable = Some(true);
        err
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::RemoteCommandFailed,
            "Remote command failed",
            to_details(details),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let details = to_details(ConfigMissingKeyDetails {
            key: key.into(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            details,
        )
    }

    pub fn config_invalid_format(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = to_details(ConfigInvalidFormatDetails {
            path: path.into(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidFormat,
            "Invalid settings file",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_command_failed_carries_output_and_target() {
        let err = Error::remote_command_failed(RemoteCommandFailedDetails {
            command: "userdel -r ghost".to_string(),
            exit_code: 6,
            stdout: String::new(),
            stderr: "userdel: user 'ghost' does not exist".to_string(),
            target: TargetDetails {
                host: Some("web1".to_string()),
                user: Some("root".to_string()),
                cwd: None,
            },
        });

        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["exitCode"], 6);
        assert_eq!(err.details["target"]["host"], "web1");
        assert!(err.details["target"].get("cwd").is_none());
    }

    #[test]
    fn not_found_errors_list_suggestions_and_hint() {
        let err = Error::host_not_found("web", vec!["web1".to_string()]);
        assert_eq!(err.code, ErrorCode::HostNotFound);
        assert_eq!(err.details["suggestions"][0], "web1");
        assert_eq!(err.hints.len(), 1);
    }

    #[test]
    fn connect_failures_are_retryable() {
        let err = Error::ssh_connect_failed(RemoteCommandFailedDetails {
            command: "true".to_string(),
            exit_code: 255,
            stdout: String::new(),
            stderr: "Connection refused".to_string(),
            target: TargetDetails::default(),
        });
        assert_eq!(err.retryable, Some(true));
    }
}
