//! Exchange management shell backend
//!
//! Runs one non-interactive PowerShell process per query and reads the
//! cmdlet output as JSON.

use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::MigrationService;
use crate::config::ServiceConfig;
use crate::error::{ReportError, Result};
use crate::records::{
    MailboxIdentity, MailboxStatistics, MigrationBatch, MigrationConfig, MigrationEndpoint,
    MigrationUser, MigrationUserStatistics, MoveRequest, MoveRequestStatistics, Record,
};

/// Error text the shell emits when an object does not exist
const NOT_FOUND_MARKERS: &[&str] = &["couldn't be found", "managementobjectnotfoundexception"];

/// Management shell client
pub struct ExchangeShell {
    program: String,
    prelude: String,
    json_depth: u32,
}

impl ExchangeShell {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            program: config.program.clone(),
            prelude: config.prelude.clone(),
            json_depth: config.json_depth,
        }
    }

    async fn query<R: Record>(
        &self,
        cmdlet: &str,
        identity: Option<&str>,
        switches: &[&str],
    ) -> Result<Option<R>> {
        let script = build_script(&self.prelude, cmdlet, identity, switches, self.json_depth);
        debug!("{}: {}", self.program, cmdlet);

        let output = Command::new(&self.program)
            .arg("-NoLogo")
            .arg("-NoProfile")
            .arg("-NonInteractive")
            .arg("-Command")
            .arg(&script)
            .output()
            .await
            .map_err(|e| ReportError::Service(format!("Failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(None);
            }

            let detail = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("no error output");
            return Err(ReportError::Service(format!(
                "{} exited with {}: {}",
                cmdlet, output.status, detail
            )));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait::async_trait]
impl MigrationService for ExchangeShell {
    async fn move_request(&self, mailbox: &MailboxIdentity) -> Result<Option<MoveRequest>> {
        self.query("Get-MoveRequest", Some(mailbox.as_str()), &[]).await
    }

    async fn move_request_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MoveRequestStatistics>> {
        self.query(
            "Get-MoveRequestStatistics",
            Some(mailbox.as_str()),
            &["-IncludeReport"],
        )
        .await
    }

    async fn migration_user(&self, mailbox: &MailboxIdentity) -> Result<Option<MigrationUser>> {
        self.query("Get-MigrationUser", Some(mailbox.as_str()), &[]).await
    }

    async fn migration_user_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MigrationUserStatistics>> {
        self.query(
            "Get-MigrationUserStatistics",
            Some(mailbox.as_str()),
            &["-IncludeReport"],
        )
        .await
    }

    async fn migration_batch(&self, batch_name: &str) -> Result<Option<MigrationBatch>> {
        self.query("Get-MigrationBatch", Some(batch_name), &[]).await
    }

    async fn migration_endpoint(&self, endpoint: &str) -> Result<Option<MigrationEndpoint>> {
        self.query("Get-MigrationEndpoint", Some(endpoint), &[]).await
    }

    async fn migration_config(&self) -> Result<Option<MigrationConfig>> {
        self.query("Get-MigrationConfig", None, &[]).await
    }

    async fn mailbox_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MailboxStatistics>> {
        self.query(
            "Get-MailboxStatistics",
            Some(mailbox.as_str()),
            &["-IncludeMoveHistory"],
        )
        .await
    }

    fn name(&self) -> &str {
        "exchange-shell"
    }
}

/// Single-quote a value for PowerShell
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Script run by the shell for one query
pub fn build_script(
    prelude: &str,
    cmdlet: &str,
    identity: Option<&str>,
    switches: &[&str],
    json_depth: u32,
) -> String {
    let mut script = String::from("$ErrorActionPreference = 'Stop'; ");

    if !prelude.trim().is_empty() {
        script.push_str(prelude.trim());
        script.push_str("; ");
    }

    script.push_str(cmdlet);
    if let Some(identity) = identity {
        script.push_str(" -Identity ");
        script.push_str(&quote(identity));
    }
    for switch in switches {
        script.push(' ');
        script.push_str(switch);
    }

    script.push_str(&format!(
        " | ConvertTo-Json -Depth {} -Compress -EnumsAsStrings",
        json_depth
    ));
    script
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    NOT_FOUND_MARKERS.iter().any(|marker| stderr.contains(marker))
}

/// Parse cmdlet JSON output; a list yields its first element
pub fn parse_output<R: Record>(stdout: &str) -> Result<Option<R>> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(stdout)? {
        Value::Null => Ok(None),
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => R::from_value(first).map(Some),
            None => Ok(None),
        },
        value => R::from_value(value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Record;

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote("o'brien@contoso.com"), "'o''brien@contoso.com'");
    }

    #[test]
    fn test_build_script() {
        let script = build_script(
            "Connect-ExchangeOnline -ShowBanner:$false",
            "Get-MoveRequestStatistics",
            Some("alice@contoso.com"),
            &["-IncludeReport"],
            10,
        );

        assert_eq!(
            script,
            "$ErrorActionPreference = 'Stop'; Connect-ExchangeOnline -ShowBanner:$false; \
             Get-MoveRequestStatistics -Identity 'alice@contoso.com' -IncludeReport \
             | ConvertTo-Json -Depth 10 -Compress -EnumsAsStrings"
        );
    }

    #[test]
    fn test_build_script_without_identity_or_prelude() {
        let script = build_script("  ", "Get-MigrationConfig", None, &[], 4);
        assert_eq!(
            script,
            "$ErrorActionPreference = 'Stop'; Get-MigrationConfig | ConvertTo-Json -Depth 4 -Compress -EnumsAsStrings"
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(
            "The operation couldn't be performed because object 'bob' couldn't be found on 'EXCH01'."
        ));
        assert!(is_not_found("ManagementObjectNotFoundException"));
        assert!(!is_not_found("Access denied"));
        assert!(!is_not_found(
            "Import-Module: The specified module 'ExchangeOnlineManagement' was not loaded because no valid module file was found"
        ));
        assert!(!is_not_found("Connect-ExchangeOnline: endpoint not found"));
        assert!(!is_not_found("pwsh: command not found"));
    }

    #[test]
    fn test_parse_output() {
        let empty: Option<MoveRequest> = parse_output("  \n").unwrap();
        assert!(empty.is_none());

        let single: MoveRequest = parse_output(r#"{"Status":"Queued"}"#).unwrap().unwrap();
        assert_eq!(single.property("Status").unwrap(), "Queued");

        let first: MigrationBatch = parse_output(r#"[{"Identity":"W1"},{"Identity":"W2"}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(first.name().as_deref(), Some("W1"));

        assert!(parse_output::<MoveRequest>("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_service_error() {
        let config = ServiceConfig {
            program: "/nonexistent/pwsh".to_string(),
            ..ServiceConfig::default()
        };
        let shell = ExchangeShell::new(&config);

        let result = shell.migration_config().await;
        assert!(matches!(result, Err(ReportError::Service(_))));
    }
}
