//! Two-pass template rendering for tenant files.
//!
//! Pass one runs the jinja-style engine so conditional blocks driven by the
//! tenant flags resolve; pass two replaces the literal placeholder tokens that
//! remain. Unknown `{{name}}` tokens and Actions expressions are shielded from
//! the engine so they survive verbatim. Files the engine cannot render still
//! get pass two.
use crate::placeholders::{PlaceholderSet, TemplateValue};
use regex::{Captures, Regex};
use std::error::Error as StdError;
use std::sync::OnceLock;
use tera::{Context, Tera};

/// Result of rendering one template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    /// Set when pass one failed and only literal replacement was applied.
    pub engine_error: Option<String>,
}

pub fn render_template(source: &str, set: &PlaceholderSet) -> Rendered {
    if !has_engine_syntax(source) {
        return Rendered {
            content: set.apply(source),
            engine_error: None,
        };
    }
    match render_with_engine(source, set) {
        Ok(expanded) => Rendered {
            content: set.apply(&expanded),
            engine_error: None,
        },
        Err(err) => Rendered {
            content: set.apply(source),
            engine_error: Some(err),
        },
    }
}

/// File and directory names only get literal replacement.
pub fn render_file_name(name: &str, set: &PlaceholderSet) -> String {
    set.apply(name)
}

fn has_engine_syntax(source: &str) -> bool {
    source.contains("{{") || source.contains("{%") || source.contains("{#")
}

fn engine_context(variables: &[(String, TemplateValue)]) -> Context {
    let mut context = Context::new();
    for (name, value) in variables {
        match value {
            TemplateValue::Text(text) => context.insert(name.as_str(), text),
            TemplateValue::Flag(flag) => context.insert(name.as_str(), flag),
        }
    }
    context
}

fn render_with_engine(source: &str, set: &PlaceholderSet) -> Result<String, String> {
    let variables = set.template_variables();
    let protected = protect_literal_syntax(source, &variables);
    Tera::one_off(&protected, &engine_context(&variables), false).map_err(|err| error_chain(&err))
}

/// Wrap GitHub Actions `${{ ... }}` expressions and `{{ name }}` tokens the
/// engine has no value for in raw blocks so they reach the output untouched.
fn protect_literal_syntax(source: &str, variables: &[(String, TemplateValue)]) -> String {
    static LITERAL: OnceLock<Regex> = OnceLock::new();
    let re = LITERAL.get_or_init(|| {
        Regex::new(r"\$\{\{.*?\}\}|\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
            .expect("literal syntax regex")
    });
    re.replace_all(source, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let known = caps
            .get(1)
            .is_some_and(|name| variables.iter().any(|(known, _)| known == name.as_str()));
        if known {
            whole.to_string()
        } else {
            format!("{{% raw %}}{whole}{{% endraw %}}")
        }
    })
    .into_owned()
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantParams;

    fn set(departure: bool) -> PlaceholderSet {
        PlaceholderSet::for_tenant(&TenantParams {
            tenant_name: "acme".into(),
            project_name: "web".into(),
            dev_network_range: "10.0.0.0/24".into(),
            stage_network_range: "10.1.0.0/24".into(),
            enable_departure: departure,
            enable_avscan: false,
        })
    }

    const DEPARTURE_TEMPLATE: &str = "tenant: {{tenant_name}}\n{% if enable_departure %}departure:\n  enabled: true\n{% endif %}dev: {{DEV_NETWORK_RANGE}}\n";

    #[test]
    fn departure_block_follows_flag() {
        let on = render_template(DEPARTURE_TEMPLATE, &set(true));
        assert_eq!(on.engine_error, None);
        assert_eq!(
            on.content,
            "tenant: acme\ndeparture:\n  enabled: true\ndev: 10.0.0.0/24\n"
        );

        let off = render_template(DEPARTURE_TEMPLATE, &set(false));
        assert_eq!(off.content, "tenant: acme\ndev: 10.0.0.0/24\n");
        assert!(!off.content.contains("departure"));
    }

    #[test]
    fn actions_expressions_pass_through() {
        let source = "name: deploy-{{name}}\nenv:\n  TOKEN: ${{ secrets.GITHUB_TOKEN }}\n{% if enable_avscan %}scan: on\n{% endif %}";
        let rendered = render_template(source, &set(false));
        assert_eq!(rendered.engine_error, None);
        assert_eq!(
            rendered.content,
            "name: deploy-acme\nenv:\n  TOKEN: ${{ secrets.GITHUB_TOKEN }}\n"
        );
    }

    #[test]
    fn unknown_tokens_survive_alongside_conditionals() {
        let source = "region: {{region}}\n{% if enable_departure %}departure: on\n{% endif %}zone: {{ zone }}\ntenant: {{tenant_name}}\n";
        let off = render_template(source, &set(false));
        assert_eq!(off.engine_error, None);
        assert_eq!(off.content, "region: {{region}}\nzone: {{ zone }}\ntenant: acme\n");

        let on = render_template(source, &set(true));
        assert_eq!(
            on.content,
            "region: {{region}}\ndeparture: on\nzone: {{ zone }}\ntenant: acme\n"
        );
    }

    #[test]
    fn engine_failure_falls_back_to_literal_pass() {
        let source = "region: {{ tenant_name | no_such_filter }}\ntenant: {{tenant_name}}\n";
        let rendered = render_template(source, &set(false));
        assert!(rendered.engine_error.is_some());
        assert_eq!(
            rendered.content,
            "region: {{ tenant_name | no_such_filter }}\ntenant: acme\n"
        );
    }

    #[test]
    fn plain_files_skip_the_engine() {
        let rendered = render_template("no tokens here\n", &set(true));
        assert_eq!(rendered.content, "no tokens here\n");
        assert_eq!(rendered.engine_error, None);
    }

    #[test]
    fn file_names_use_literal_tokens() {
        assert_eq!(
            render_file_name("tenant_{{name}}_deploy.yml", &set(false)),
            "tenant_acme_deploy.yml"
        );
    }
}
