//! Recipe rendering.
//!
//! Templates see `registry` (`<registry>/` or empty), `alt_image`, `branch`,
//! `organization` and the `install_packages(names=[...])` function, which
//! expands to a complete `RUN` instruction honouring injected tasks.

use std::collections::HashMap;
use tera::{Context, Tera, Value};

use crate::error::{Error, Result};

/// Prefix that makes `apt` act as i586 when the builder is 32-bit.
const LINUX32: &str = r#"$([ "$(rpm --eval %_host_cpu)" = i586 ] && echo linux32)"#;

/// Renders build recipes for one (branch, organization).
pub struct Renderer {
    tera: Tera,
    context: Context,
    branch: String,
}

impl Renderer {
    pub fn new(registry_prefix: &str, branch: &str, organization: &str) -> Self {
        let alt_image = if registry_prefix.is_empty() { "alt" } else { "alt/alt" };
        let mut context = Context::new();
        context.insert("registry", registry_prefix);
        context.insert("alt_image", alt_image);
        context.insert("branch", branch);
        context.insert("organization", organization);

        let mut renderer = Self {
            tera: Tera::default(),
            context,
            branch: branch.to_string(),
        };
        renderer.set_tasks(Vec::new());
        renderer
    }

    /// Task repositories added before package installation.
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.set_tasks(tasks);
        self
    }

    fn set_tasks(&mut self, tasks: Vec<String>) {
        self.tera.register_function(
            "install_packages",
            move |args: &HashMap<String, Value>| -> tera::Result<Value> {
                let names = match args.get("names") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>(),
                    Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
                    _ => return Err("install_packages requires `names`".into()),
                };
                Ok(Value::String(install_packages_command(&names, &tasks)))
            },
        );
    }

    /// Render `template`. Undefined values are errors, naming `what` and the branch.
    pub fn render(&mut self, template: &str, what: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| Error::Render {
                what: format!("{} ({})", what, self.branch),
                reason: error_chain(&e),
            })
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut reason = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        reason.push_str(": ");
        reason.push_str(&s.to_string());
        source = s.source();
    }
    reason
}

/// Build the `RUN` instruction that installs `names`.
pub fn install_packages_command(names: &[String], tasks: &[String]) -> String {
    let mut command = String::from("RUN apt-get update && \\");
    if !tasks.is_empty() {
        command.push_str("\n    apt-get install apt-repo -y && \\");
        for task in tasks {
            command.push_str(&format!("\n    {} apt-repo add {} && \\", LINUX32, task));
        }
        command.push_str("\n    apt-get update && \\");
    }
    command.push_str(&format!(
        "\n    {} apt-get install -y {} && \\",
        LINUX32,
        names.join(" ")
    ));
    command.push_str("\n    rm -f /var/cache/apt/archives/*.rpm \\");
    command.push_str("\n          /var/cache/apt/*.bin \\");
    command.push_str("\n          /var/lib/apt/lists/*.*");
    command
}
