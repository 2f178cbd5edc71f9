//! Tenant placeholder tokens (`{{tenant_name}}`, `{{TENANT_NAME}}`, ...).
use crate::config::TenantParams;
use regex::Regex;
use std::sync::OnceLock;

/// A literal token and its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub token: String,
    pub value: String,
}

/// Fixed token set for one tenant, plus the flag values the template engine
/// needs for conditionals.
#[derive(Debug, Clone)]
pub struct PlaceholderSet {
    entries: Vec<Placeholder>,
    enable_departure: bool,
    enable_avscan: bool,
}

impl PlaceholderSet {
    pub fn for_tenant(tenant: &TenantParams) -> Self {
        let flag = |value: bool| value.to_string();
        let pairs = [
            ("tenant_name", tenant.tenant_name.clone()),
            ("name", tenant.tenant_name.clone()),
            ("project_name", tenant.project_name.clone()),
            ("dev_network_range", tenant.dev_network_range.clone()),
            ("stage_network_range", tenant.stage_network_range.clone()),
            ("enable_departure", flag(tenant.enable_departure)),
            ("enable_avscan", flag(tenant.enable_avscan)),
            ("TENANT_NAME", tenant.tenant_name.to_uppercase()),
            ("NAME", tenant.tenant_name.to_uppercase()),
            ("PROJECT_NAME", tenant.project_name.to_uppercase()),
            // Network ranges have no case; the upper spelling is the same value.
            ("DEV_NETWORK_RANGE", tenant.dev_network_range.clone()),
            ("STAGE_NETWORK_RANGE", tenant.stage_network_range.clone()),
            ("ENABLE_DEPARTURE", flag(tenant.enable_departure).to_uppercase()),
            ("ENABLE_AVSCAN", flag(tenant.enable_avscan).to_uppercase()),
        ];
        let entries = pairs
            .into_iter()
            .map(|(name, value)| Placeholder {
                token: format!("{{{{{name}}}}}"),
                value,
            })
            .collect();
        Self {
            entries,
            enable_departure: tenant.enable_departure,
            enable_avscan: tenant.enable_avscan,
        }
    }

    /// Replace every known token literally; unknown tokens stay verbatim.
    pub fn apply(&self, content: &str) -> String {
        let mut out = content.to_string();
        for entry in &self.entries {
            if out.contains(&entry.token) {
                out = out.replace(&entry.token, &entry.value);
            }
        }
        out
    }

    /// Known tokens still present in `content`, in set order.
    pub fn unresolved(&self, content: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| content.contains(&entry.token))
            .map(|entry| entry.token.clone())
            .collect()
    }

    /// Variables for the template engine: string values by token name, with
    /// the lower-case flag names bound to booleans so `{% if %}` works.
    pub fn template_variables(&self) -> Vec<(String, TemplateValue)> {
        self.entries
            .iter()
            .map(|entry| {
                let name = token_name(&entry.token).to_string();
                let value = match name.as_str() {
                    "enable_departure" => TemplateValue::Flag(self.enable_departure),
                    "enable_avscan" => TemplateValue::Flag(self.enable_avscan),
                    _ => TemplateValue::Text(entry.value.clone()),
                };
                (name, value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Text(String),
    Flag(bool),
}

fn token_name(token: &str) -> &str {
    token
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .unwrap_or(token)
}

/// Any `{{identifier}}` token, recognised or not.
pub fn simple_tokens(content: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN
        .get_or_init(|| Regex::new(r"\{\{[A-Za-z_][A-Za-z0-9_]*\}\}").expect("token regex"));
    re.find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}
