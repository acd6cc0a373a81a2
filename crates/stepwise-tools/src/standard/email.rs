//! # E-mail Tools
//!
//! Mail is exchanged through a Maildir: incoming messages are read from
//! `inbox/new` and `inbox/cur`, outgoing messages are delivered to
//! `outbox/new` (via `outbox/tmp`) for a relay to pick up.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use stepwise_core::{ExecutionResult, FailureReason, Tool};
use tracing::debug;
use uuid::Uuid;

use super::file::sandboxed;
use super::{arg, required_str};
use crate::settings::ToolSettings;

const DEFAULT_READ_LIMIT: usize = 5;
const MAX_BODY_CHARS: usize = 2000;

/// A message as shown to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailSummary {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

/// Split a raw RFC 5322 message into unfolded headers and body.
fn parse_message(raw: &str) -> (Vec<(String, String)>, String) {
    let raw = raw.replace("\r\n", "\n");
    let (head, body) = raw.split_once("\n\n").unwrap_or((raw.as_str(), ""));

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    (headers, body.trim().to_string())
}

fn summarize(raw: &str) -> MailSummary {
    let (headers, body) = parse_message(raw);
    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    };
    MailSummary {
        from: header("from"),
        to: header("to"),
        subject: header("subject"),
        date: header("date"),
        body: body.chars().take(MAX_BODY_CHARS).collect(),
    }
}

fn io_error(context: &str, err: std::io::Error) -> ExecutionResult {
    ExecutionResult::failed(FailureReason::IoError {
        message: format!("{}: {}", context, err),
    })
}

/// Reads the most recent messages of the Maildir inbox.
#[derive(Debug)]
pub struct ReadEmailTool {
    maildir: PathBuf,
}

impl ReadEmailTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            maildir: settings.maildir.clone(),
        }
    }

    fn messages(&self) -> std::io::Result<Vec<(SystemTime, PathBuf)>> {
        let mut found = Vec::new();
        for sub in ["new", "cur"] {
            let dir = self.maildir.join("inbox").join(sub);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if metadata.is_file() {
                    found.push((metadata.modified()?, entry.path()));
                }
            }
        }
        found.sort_by(|a, b| b.cmp(a));
        Ok(found)
    }
}

impl Tool for ReadEmailTool {
    fn name(&self) -> &str {
        "Read Email"
    }

    fn description(&self) -> &str {
        "Read the most recent emails from the inbox"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Number of emails to read, newest first"}
            }
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_READ_LIMIT, |n| n as usize);

        let messages = match self.messages() {
            Ok(messages) => messages,
            Err(e) => return io_error("cannot list inbox", e),
        };
        let mut summaries = Vec::new();
        for (_, path) in messages.into_iter().take(limit) {
            match fs::read(&path) {
                Ok(bytes) => summaries.push(summarize(&String::from_utf8_lossy(&bytes))),
                Err(e) => return io_error(&path.display().to_string(), e),
            }
        }
        if summaries.is_empty() {
            return ExecutionResult::success("There are no emails in the inbox");
        }
        match serde_json::to_string(&summaries) {
            Ok(json) => ExecutionResult::success(json),
            Err(e) => ExecutionResult::failure(e.to_string()),
        }
    }
}

/// An outgoing message before encoding.
struct Outgoing<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    attachment: Option<(String, Vec<u8>)>,
}

impl Outgoing<'_> {
    fn render(&self) -> String {
        let mut out = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMessage-ID: <{}@stepwise>\r\nMIME-Version: 1.0\r\n",
            self.from,
            self.to,
            self.subject,
            chrono::Utc::now().to_rfc2822(),
            Uuid::new_v4().simple()
        );
        match &self.attachment {
            None => {
                out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
                out.push_str(&self.body.replace('\n', "\r\n"));
                out.push_str("\r\n");
            }
            Some((file_name, bytes)) => {
                let boundary = format!("stepwise-{}", Uuid::new_v4().simple());
                out.push_str(&format!(
                    "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
                    boundary
                ));
                out.push_str(&format!(
                    "--{}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
                    boundary,
                    self.body.replace('\n', "\r\n")
                ));
                out.push_str(&format!(
                    "--{}\r\nContent-Type: {}; name=\"{}\"\r\nContent-Disposition: attachment; filename=\"{}\"\r\nContent-Transfer-Encoding: base64\r\n\r\n",
                    boundary,
                    content_type(file_name),
                    file_name,
                    file_name
                ));
                let encoded = BASE64.encode(bytes);
                for line in encoded.as_bytes().chunks(76) {
                    out.push_str(&String::from_utf8_lossy(line));
                    out.push_str("\r\n");
                }
                out.push_str(&format!("--{}--\r\n", boundary));
            }
        }
        out
    }
}

fn content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Deliver a rendered message into `outbox/new` through `outbox/tmp`.
fn deliver(maildir: &Path, message: &str) -> std::io::Result<PathBuf> {
    let outbox = maildir.join("outbox");
    let tmp = outbox.join("tmp");
    let new = outbox.join("new");
    fs::create_dir_all(&tmp)?;
    fs::create_dir_all(&new)?;

    let unique = format!(
        "{}.{}.stepwise",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );
    let staged = tmp.join(&unique);
    fs::write(&staged, message)?;
    let delivered = new.join(&unique);
    fs::rename(&staged, &delivered)?;
    Ok(delivered)
}

fn sender(address: Option<&str>) -> Result<&str, ExecutionResult> {
    address.ok_or_else(|| {
        ExecutionResult::failed(FailureReason::PermissionDenied {
            message: "no sender e-mail address configured".to_string(),
        })
    })
}

fn send(maildir: &Path, outgoing: Outgoing<'_>) -> ExecutionResult {
    match deliver(maildir, &outgoing.render()) {
        Ok(path) => {
            debug!(to = outgoing.to, path = %path.display(), "Queued outgoing e-mail");
            ExecutionResult::success(format!("Email was sent to {}", outgoing.to))
        }
        Err(e) => io_error("cannot write to outbox", e),
    }
}

/// Sends a plain-text e-mail.
#[derive(Debug)]
pub struct SendEmailTool {
    maildir: PathBuf,
    from: Option<String>,
}

impl SendEmailTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            maildir: settings.maildir.clone(),
            from: settings.email_address.clone(),
        }
    }
}

impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "Send Email"
    }

    fn description(&self) -> &str {
        "Send an Email"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Email address of the receiver"},
                "subject": {"type": "string", "description": "Subject of the email"},
                "body": {"type": "string", "description": "Email body"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let from = arg!(sender(self.from.as_deref()));
        let outgoing = Outgoing {
            from,
            to: arg!(required_str(&args, "to")),
            subject: arg!(required_str(&args, "subject")),
            body: arg!(required_str(&args, "body")),
            attachment: None,
        };
        send(&self.maildir, outgoing)
    }
}

/// Sends an e-mail with a file from the resources directory attached.
#[derive(Debug)]
pub struct SendEmailWithAttachmentTool {
    maildir: PathBuf,
    resources_dir: PathBuf,
    from: Option<String>,
}

impl SendEmailWithAttachmentTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            maildir: settings.maildir.clone(),
            resources_dir: settings.resources_dir.clone(),
            from: settings.email_address.clone(),
        }
    }
}

impl Tool for SendEmailWithAttachmentTool {
    fn name(&self) -> &str {
        "Send Email with Attachment"
    }

    fn description(&self) -> &str {
        "Send an Email with a file attached"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Email address of the receiver"},
                "subject": {"type": "string", "description": "Subject of the email"},
                "body": {"type": "string", "description": "Email body"},
                "filename": {"type": "string", "description": "Name of the file to attach"}
            },
            "required": ["to", "subject", "body", "filename"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let from = arg!(sender(self.from.as_deref()));
        let filename = arg!(required_str(&args, "filename"));
        let path = arg!(sandboxed(&self.resources_dir, filename));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ExecutionResult::failed(FailureReason::NotFound {
                    resource: filename.to_string(),
                });
            }
            Err(e) => return io_error(filename, e),
        };
        let attachment_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());

        let outgoing = Outgoing {
            from,
            to: arg!(required_str(&args, "to")),
            subject: arg!(required_str(&args, "subject")),
            body: arg!(required_str(&args, "body")),
            attachment: Some((attachment_name, bytes)),
        };
        send(&self.maildir, outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> ToolSettings {
        ToolSettings::default()
            .with_maildir(dir.path().join("mail"))
            .with_resources_dir(dir.path().join("resources"))
            .with_email_address("agent@example.com")
    }

    fn outbox(dir: &TempDir) -> Vec<String> {
        let new = dir.path().join("mail").join("outbox").join("new");
        fs::read_dir(new)
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect()
    }

    #[test]
    fn parses_folded_headers_and_body() {
        let raw = "From: Ann <ann@example.com>\r\nSubject: Quarterly\r\n report\r\n\r\nNumbers attached.\r\n";
        let summary = summarize(raw);
        assert_eq!(summary.from, "Ann <ann@example.com>");
        assert_eq!(summary.subject, "Quarterly report");
        assert_eq!(summary.body, "Numbers attached.");
    }

    #[test]
    fn reads_newest_messages_first() {
        let dir = TempDir::new().unwrap();
        let new = dir.path().join("mail").join("inbox").join("new");
        fs::create_dir_all(&new).unwrap();
        fs::write(new.join("1"), "Subject: first\n\nbody one").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(new.join("2"), "Subject: second\n\nbody two").unwrap();

        let result = ReadEmailTool::new(&settings(&dir)).execute(json!({"limit": 1}));
        let read: Vec<serde_json::Value> = serde_json::from_str(&result.output()).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0]["subject"], "second");
    }

    #[test]
    fn empty_inbox_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = ReadEmailTool::new(&settings(&dir)).execute(json!({}));
        assert_eq!(result.output(), "There are no emails in the inbox");
    }

    #[test]
    fn send_delivers_to_outbox() {
        let dir = TempDir::new().unwrap();
        let result = SendEmailTool::new(&settings(&dir)).execute(json!({
            "to": "bob@example.com",
            "subject": "Hello",
            "body": "Line one\nLine two"
        }));
        assert!(result.is_success(), "{:?}", result);

        let sent = outbox(&dir);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("From: agent@example.com\r\n"));
        assert!(sent[0].contains("To: bob@example.com\r\n"));
        assert!(sent[0].contains("Line one\r\nLine two"));
        assert!(fs::read_dir(dir.path().join("mail").join("outbox").join("tmp")).unwrap().next().is_none());
    }

    #[test]
    fn send_without_sender_is_denied() {
        let dir = TempDir::new().unwrap();
        let settings = ToolSettings::default().with_maildir(dir.path());
        let result = SendEmailTool::new(&settings).execute(json!({"to": "a@b.c", "subject": "s", "body": "b"}));
        assert!(matches!(
            result,
            ExecutionResult::Failure {
                reason: FailureReason::PermissionDenied { .. }
            }
        ));
    }

    #[test]
    fn attachment_is_base64_encoded() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        fs::create_dir_all(&settings.resources_dir).unwrap();
        fs::write(settings.resources_dir.join("report.csv"), "a,b\n1,2\n").unwrap();

        let result = SendEmailWithAttachmentTool::new(&settings).execute(json!({
            "to": "bob@example.com",
            "subject": "Report",
            "body": "See attached",
            "filename": "report.csv"
        }));
        assert!(result.is_success(), "{:?}", result);

        let sent = outbox(&dir);
        assert!(sent[0].contains("Content-Type: text/csv; name=\"report.csv\""));
        assert!(sent[0].contains(&BASE64.encode("a,b\n1,2\n")));
    }

    #[test]
    fn missing_attachment_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = SendEmailWithAttachmentTool::new(&settings(&dir)).execute(json!({
            "to": "bob@example.com",
            "subject": "Report",
            "body": "See attached",
            "filename": "missing.pdf"
        }));
        assert!(matches!(
            result,
            ExecutionResult::Failure {
                reason: FailureReason::NotFound { .. }
            }
        ));
    }
}
