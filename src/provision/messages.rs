//! Human-facing text: input summary, commit message and pull-request body.
use crate::config::TenantParams;

use super::copy::{WorkflowOutcome, TEMPLATE_TENANT_DIR, TEMPLATE_WORKFLOWS_DIR, WORKFLOWS_DIR};

pub fn input_summary(tenant: &TenantParams) -> String {
    format!(
        "=== Tenant Creation Inputs ===\n\
         Tenant Name: {}\n\
         Project Name: {}\n\
         Development Network Range: {}\n\
         Stage Network Range: {}\n\
         Enable Departure: {}\n\
         Enable AVScan: {}\n\
         ===============================",
        tenant.tenant_name,
        tenant.project_name,
        tenant.dev_network_range,
        tenant.stage_network_range,
        tenant.enable_departure,
        tenant.enable_avscan,
    )
}

pub fn pull_request_title(tenant: &TenantParams) -> String {
    format!("Add tenant: {}", tenant.tenant_name)
}

fn workflow_commit_line(outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::Copied { dir, files } => format!(
            "- Copied {} workflow(s) from {TEMPLATE_WORKFLOWS_DIR}/ to {dir}/",
            files.len()
        ),
        WorkflowOutcome::Fallback { dir, files, .. } => format!(
            "- Placed {} workflow(s) in {dir}/ (fallback: move to {WORKFLOWS_DIR}/ manually)",
            files.len()
        ),
        WorkflowOutcome::Skipped { reason } => format!("- Skipped workflow generation: {reason}"),
    }
}

pub fn commit_message(tenant: &TenantParams, outcome: &WorkflowOutcome) -> String {
    format!(
        "Add tenant: {name}\n\
         \n\
         - Tenant Name: {name}\n\
         - Project: {project}\n\
         - Dev Network: {dev}\n\
         - Stage Network: {stage}\n\
         - Departure Enabled: {departure}\n\
         - AVScan Enabled: {avscan}\n\
         - Workflows: {status}\n\
         \n\
         Generated from templates:\n\
         - Copied tenant config from {TEMPLATE_TENANT_DIR}/ to tenant/{name}/\n\
         {workflows}\n\
         - Replaced all placeholder values with actual inputs\n",
        name = tenant.tenant_name,
        project = tenant.project_name,
        dev = tenant.dev_network_range,
        stage = tenant.stage_network_range,
        departure = tenant.enable_departure,
        avscan = tenant.enable_avscan,
        status = outcome.status(),
        workflows = workflow_commit_line(outcome),
    )
}

fn workflow_changes(outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::Copied { files, .. } => files
            .iter()
            .map(|file| format!("- ✅ Generated workflow from template: `{file}`\n"))
            .collect(),
        WorkflowOutcome::Fallback {
            dir,
            files,
            primary_error,
        } => {
            let mut out = format!(
                "- ⚠️ Workflows could not be written to `{WORKFLOWS_DIR}/` ({primary_error}); placed in `{dir}/` instead:\n"
            );
            for file in files {
                out.push_str(&format!("  - `{file}`\n"));
            }
            out.push_str(&format!(
                "  - Move these files to `{WORKFLOWS_DIR}/` before merging so they run\n"
            ));
            out
        }
        WorkflowOutcome::Skipped { reason } => {
            format!("- ⏭️ Workflow generation skipped: {reason}\n")
        }
    }
}

fn demo_onboarding_section(outcome: &WorkflowOutcome) -> String {
    let promotion = match outcome {
        WorkflowOutcome::Fallback { .. } => format!(
            " It currently lives in the tenant directory and has to be moved to `{WORKFLOWS_DIR}/` first."
        ),
        _ => String::new(),
    };
    format!(
        "\n**Demo Onboarding:**\n\
         This PR includes the temporary `{onboarding}` workflow. It drives the first\n\
         multi-step deployment of the tenant and is removed automatically once the\n\
         tenant is live (`tenantops cleanup <branch>`), after which the regular GitOps\n\
         workflow takes over.{promotion}\n",
        onboarding = super::copy::ONBOARDING_WORKFLOW,
    )
}

pub fn pull_request_body(tenant: &TenantParams, outcome: &WorkflowOutcome) -> String {
    let mut body = format!(
        "## New Tenant Creation\n\
         \n\
         **Tenant Details:**\n\
         - **Tenant Name:** {name}\n\
         - **Project Name:** {project}\n\
         - **Development Network Range:** {dev}\n\
         - **Stage Network Range:** {stage}\n\
         - **Enable Departure:** {departure}\n\
         - **Enable AVScan:** {avscan}\n\
         \n\
         **Changes Made:**\n\
         - ✅ Copied tenant configuration from `{TEMPLATE_TENANT_DIR}/` to `tenant/{name}/`\n\
         {workflows}\
         - ✅ Replaced all placeholder values with actual tenant inputs\n",
        name = tenant.tenant_name,
        project = tenant.project_name,
        dev = tenant.dev_network_range,
        stage = tenant.stage_network_range,
        departure = tenant.enable_departure,
        avscan = tenant.enable_avscan,
        workflows = workflow_changes(outcome),
    );
    if outcome.includes_onboarding() {
        body.push_str(&demo_onboarding_section(outcome));
    }
    body.push_str(
        "\n**Next Steps:**\n\
         1. Review the tenant configuration files\n\
         2. Validate network range assignments\n\
         3. Test the workflows\n\
         4. Merge when ready\n\
         \n\
         ---\n\
         *This PR was automatically created by the tenant creation workflow.*\n",
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantParams {
        TenantParams {
            tenant_name: "acme".into(),
            project_name: "web".into(),
            dev_network_range: "10.0.0.0/24".into(),
            stage_network_range: "10.1.0.0/24".into(),
            enable_departure: false,
            enable_avscan: true,
        }
    }

    #[test]
    fn commit_message_reports_fallback() {
        let outcome = WorkflowOutcome::Fallback {
            dir: "tenant/acme/workflows".into(),
            files: vec!["tenant/acme/workflows/tenant_acme.yml".into()],
            primary_error: "permission denied".into(),
        };
        let message = commit_message(&tenant(), &outcome);
        assert!(message.starts_with("Add tenant: acme\n\n"));
        assert!(message.contains("- Workflows: fallback\n"));
        assert!(message.contains("- Placed 1 workflow(s) in tenant/acme/workflows/"));
        assert!(!message.contains("- Workflows: copied"));
    }

    #[test]
    fn body_includes_demo_section_only_with_onboarding_workflow() {
        let with = WorkflowOutcome::Copied {
            dir: ".github/workflows".into(),
            files: vec![".github/workflows/onboarding_workflow.yml".into()],
        };
        assert!(pull_request_body(&tenant(), &with).contains("**Demo Onboarding:**"));

        let without = WorkflowOutcome::Copied {
            dir: ".github/workflows".into(),
            files: vec![".github/workflows/tenant_acme.yml".into()],
        };
        let body = pull_request_body(&tenant(), &without);
        assert!(!body.contains("Demo Onboarding"));
        assert!(body.contains("`.github/workflows/tenant_acme.yml`"));
        assert!(body.contains("- **Enable AVScan:** true"));
    }

    #[test]
    fn body_describes_skipped_workflows() {
        let skipped = WorkflowOutcome::Skipped {
            reason: "SKIP_WORKFLOWS is set".into(),
        };
        let body = pull_request_body(&tenant(), &skipped);
        assert!(body.contains("Workflow generation skipped: SKIP_WORKFLOWS is set"));
        assert!(input_summary(&tenant()).contains("Project Name: web"));
    }
}
