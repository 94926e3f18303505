//! Description text and identity headers for a plan comment.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::comment_header::{keys, RequiredHeaders};
use crate::fingerprint::sha256_hex;

const BACKEND_CONFIG_SECRET_WORDS: &[&str] = &[
    "token",
    "password",
    "sas_token",
    "access_key",
    "secret_key",
    "client_secret",
    "access_token",
    "http_auth",
    "secret_id",
    "encryption_key",
    "key_material",
    "security_token",
    "conn_str",
    "sse_customer_key",
    "application_credential_secret",
];

/// Inputs that identify which plan a comment belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanIdentity {
    pub tool_name: String,
    pub label: Option<String>,
    pub path: String,
    pub destroy: bool,
    pub backend_config: String,
}

impl PlanIdentity {
    pub fn description(&self) -> String {
        let mut description = match self.label() {
            Some(label) => format!("{} plan for __{label}__", self.tool_name),
            None => format!("{} plan in __{}__", self.tool_name, self.path),
        };
        if self.destroy {
            description.push_str("\n:bomb: Planning to destroy all resources");
        }
        description
    }

    /// Description written before comments carried headers.
    pub fn legacy_description(&self) -> String {
        if let Some(label) = self.label() {
            return format!("Terraform plan for __{label}__");
        }
        let mut description = format!("Terraform plan in __{}__", self.path);
        let backend_config = mask_backend_config(&self.backend_config);
        if !backend_config.is_empty() {
            description.push_str(&format!("\nWith backend config: `{backend_config}`"));
        }
        description
    }

    /// Headers a matching comment must carry. Without a label the comment
    /// must not have one either.
    pub fn required_headers(&self) -> RequiredHeaders {
        let mut headers = RequiredHeaders::new();
        headers.insert(
            keys::LABEL.to_string(),
            self.label().map(|label| Value::String(label.to_string())),
        );
        if let Some(modifier) = self.plan_modifier_hash() {
            headers.insert(keys::PLAN_MODIFIER.to_string(), Some(Value::String(modifier)));
        }
        headers
    }

    pub fn plan_modifier_hash(&self) -> Option<String> {
        let mut modifier = BTreeMap::new();
        if self.destroy {
            modifier.insert("destroy", "true");
        }
        if modifier.is_empty() {
            return None;
        }
        let canonical = serde_json::to_string(&modifier).ok()?;
        tracing::debug!(%canonical, "plan modifier");
        Some(sha256_hex(canonical.as_bytes()))
    }

    fn label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }
}

/// Drops backend config entries that look like they hold a secret.
pub fn mask_backend_config(backend_config: &str) -> String {
    backend_config
        .split(',')
        .filter(|field| !field.is_empty())
        .filter(|field| {
            !BACKEND_CONFIG_SECRET_WORDS
                .iter()
                .any(|word| field.contains(word))
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Reference to the workflow run that produced a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRef {
    pub workflow: String,
    pub run_number: String,
    pub server_url: String,
    pub repository: String,
    pub run_id: String,
}

impl JobRef {
    fn run_url(&self) -> String {
        format!(
            "{}/{}/actions/runs/{}",
            self.server_url.trim_end_matches('/'),
            self.repository,
            self.run_id
        )
    }

    pub fn workflow_ref(&self) -> String {
        format!(
            "Job {} #{} at {}",
            self.workflow,
            self.run_number,
            self.run_url()
        )
    }

    pub fn markdown_ref(&self) -> String {
        format!("[{} #{}]({})", self.workflow, self.run_number, self.run_url())
    }
}
