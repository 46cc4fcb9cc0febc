//! Terraform template renderer
//!
//! Fills the fixed vSphere VM template with job attributes and
//! process-level provisioning credentials. The placeholder set is closed:
//! [`TemplateContext`] holds exactly the fields the template may reference,
//! and rendering fails up front when a required reference (cluster, network)
//! is absent, naming the missing field, instead of letting Terraform choke
//! on an empty value later.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or rendering the template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load template {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required job attribute is unset
    #[error("cannot render template: {0} is not set on the job")]
    MissingField(&'static str),

    /// The template references a placeholder outside the known set
    #[error("template references unknown placeholder {{{{{0}}}}}")]
    Unresolved(String),
}

/// The full placeholder set of the vSphere VM template.
///
/// Credentials come from worker configuration, never from the job record.
#[derive(Debug)]
pub struct TemplateContext<'a> {
    pub vsphere_server: &'a str,
    pub vsphere_user: &'a str,
    pub vsphere_password: &'a str,
    pub datacenter: &'a str,
    pub cluster: Option<&'a str>,
    pub network: Option<&'a str>,
    pub datastore: &'a str,
    pub vm_name: &'a str,
    pub cpu: i32,
    pub memory_mb: i32,
    pub vm_count: i32,
}

/// Reads the template source from disk.
pub fn load_template(path: &Path) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|source| TemplateError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders the template by substituting `{{name}}` placeholders.
///
/// Fails if `cluster` or `network` is unset, or if the template references a
/// placeholder that is not part of [`TemplateContext`].
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
    let cluster = ctx.cluster.ok_or(TemplateError::MissingField("cluster"))?;
    let network = ctx.network.ok_or(TemplateError::MissingField("network"))?;

    let cpu = ctx.cpu.to_string();
    let memory_mb = ctx.memory_mb.to_string();
    let vm_count = ctx.vm_count.to_string();

    let substitutions: [(&str, &str); 11] = [
        ("vsphere_server", ctx.vsphere_server),
        ("vsphere_user", ctx.vsphere_user),
        ("vsphere_password", ctx.vsphere_password),
        ("datacenter", ctx.datacenter),
        ("cluster", cluster),
        ("network", network),
        ("datastore", ctx.datastore),
        ("vm_name", ctx.vm_name),
        ("cpu", &cpu),
        ("memory", &memory_mb),
        ("vm_count", &vm_count),
    ];

    let mut rendered = template.to_string();
    for (name, value) in substitutions {
        rendered = rendered.replace(&format!("{{{{{}}}}}", name), value);
    }

    // Anything still in placeholder form is outside the known set
    if let Some(leftover) = find_placeholder(&rendered) {
        return Err(TemplateError::Unresolved(leftover));
    }

    Ok(rendered)
}

/// Finds the first remaining `{{` token, terminated or not.
fn find_placeholder(text: &str) -> Option<String> {
    let start = text.find("{{")?;
    let rest = &text[start + 2..];
    let name = match rest.find("}}") {
        Some(end) => &rest[..end],
        // Unterminated placeholder; report what follows the braces
        None => rest.split_whitespace().next().unwrap_or(""),
    };
    Some(name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> TemplateContext<'static> {
        TemplateContext {
            vsphere_server: "vcenter.example.com",
            vsphere_user: "svc-deploy",
            vsphere_password: "hunter2",
            datacenter: "DC-East",
            cluster: Some("Cluster-A"),
            network: Some("VM Network"),
            datastore: "LocalDS_0",
            vm_name: "web01",
            cpu: 4,
            memory_mb: 4096,
            vm_count: 3,
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let template = "server={{vsphere_server}} dc={{datacenter}} cluster={{cluster}} \
                        net={{network}} ds={{datastore}} vm={{vm_name}} \
                        cpu={{cpu}} mem={{memory}} count={{vm_count}}";

        let rendered = render(template, &test_context()).unwrap();

        assert_eq!(
            rendered,
            "server=vcenter.example.com dc=DC-East cluster=Cluster-A \
             net=VM Network ds=LocalDS_0 vm=web01 cpu=4 mem=4096 count=3"
        );
    }

    #[test]
    fn test_render_fails_without_cluster() {
        let mut ctx = test_context();
        ctx.cluster = None;

        let err = render("cluster={{cluster}}", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::MissingField("cluster")));
    }

    #[test]
    fn test_render_fails_without_network() {
        let mut ctx = test_context();
        ctx.network = None;

        let err = render("net={{network}}", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::MissingField("network")));
    }

    #[test]
    fn test_render_rejects_unknown_placeholder() {
        let err = render("oops={{not_a_field}}", &test_context()).unwrap_err();
        match err {
            TemplateError::Unresolved(name) => assert_eq!(name, "not_a_field"),
            other => panic!("expected Unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_render_rejects_unterminated_placeholder() {
        let err = render("oops={{dangling", &test_context()).unwrap_err();
        match err {
            TemplateError::Unresolved(name) => assert_eq!(name, "dangling"),
            other => panic!("expected Unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_render_credentials_injected() {
        let rendered = render("u={{vsphere_user}} p={{vsphere_password}}", &test_context()).unwrap();
        assert_eq!(rendered, "u=svc-deploy p=hunter2");
    }

    #[test]
    fn test_load_template_missing_file() {
        let err = load_template(Path::new("/nonexistent/vm.tf.tmpl")).unwrap_err();
        assert!(matches!(err, TemplateError::Load { .. }));
    }

    #[test]
    fn test_shipped_template_renders() {
        let template = include_str!("../templates/vsphere_vm.tf.tmpl");
        let rendered = render(template, &test_context()).unwrap();

        assert!(rendered.contains("vcenter.example.com"));
        assert!(rendered.contains("DC-East"));
        assert!(!rendered.contains("{{"));
    }
}
