//! Output formatting module for rustible-azure
//!
//! Renders module results as colored human text, JSON or YAML.

use anyhow::Result;
use colored::Colorize;
use serde_json::{json, Value};

use super::OutputFormat;
use crate::error::Error;
use crate::modules::{Diff, ModuleOutput, ModuleStatus};
use crate::resource::{ArgSpec, ArgType, ArgumentSchema};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Selected format
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self { use_color, format }
    }

    fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print a structured value in the machine-readable format
    fn emit(&self, value: &Value) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
            OutputFormat::Human => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "[WARNING]:".yellow().bold(), message);
        } else {
            eprintln!("[WARNING]: {}", message);
        }
    }

    /// Print the outcome of one module invocation
    pub fn module_result(&self, module: &str, output: &ModuleOutput) {
        if !self.is_human() {
            let mut value = output.to_value();
            if let (Some(diff), Value::Object(map)) = (&output.diff, &mut value) {
                map.insert(
                    "diff".to_string(),
                    json!({"before": diff.before, "after": diff.after}),
                );
            }
            if let Err(e) = self.emit(&value) {
                self.error(&format!("Failed to render output: {}", e));
            }
            return;
        }

        for warning in &output.warnings {
            self.warning(warning);
        }

        if let Some(diff) = &output.diff {
            print!("{}", self.render_diff(diff));
        }

        let status = self.status_label(output.status);
        println!("{}: [{}] => {}", status, module, output.msg);

        if !output.data.is_empty() {
            let data: serde_json::Map<String, Value> = output
                .data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            match serde_json::to_string_pretty(&Value::Object(data)) {
                Ok(text) => println!("{}", text),
                Err(e) => self.error(&format!("Failed to render output: {}", e)),
            }
        }
    }

    /// Print a module failure
    pub fn module_error(&self, module: &str, err: &Error) {
        if !self.is_human() {
            let value = json!({"changed": false, "failed": true, "msg": err.to_string()});
            if let Err(e) = self.emit(&value) {
                self.error(&format!("Failed to render output: {}", e));
            }
            return;
        }

        let status = self.status_label(ModuleStatus::Failed);
        eprintln!("{}: [{}] => {}", status, module, err);
    }

    /// Print the registered modules
    pub fn module_list(&self, modules: &[(String, String)]) -> Result<()> {
        if !self.is_human() {
            let value: serde_json::Map<String, Value> = modules
                .iter()
                .map(|(name, description)| (name.clone(), Value::String(description.clone())))
                .collect();
            return self.emit(&Value::Object(value));
        }

        let width = modules.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        for (name, description) in modules {
            let padded = format!("{:<width$}", name, width = width);
            if self.use_color {
                println!("{}  {}", padded.bright_white().bold(), description);
            } else {
                println!("{}  {}", padded, description);
            }
        }
        Ok(())
    }

    /// Print the argument schema of a module
    pub fn module_doc(&self, name: &str, description: &str, schema: &ArgumentSchema) -> Result<()> {
        if !self.is_human() {
            let value = json!({
                "module": name,
                "description": description,
                "options": schema,
            });
            return self.emit(&value);
        }

        if self.use_color {
            println!("{} - {}\n", name.bright_white().bold(), description);
            println!("{}", "OPTIONS".cyan().bold());
        } else {
            println!("{} - {}\n", name, description);
            println!("OPTIONS");
        }
        for spec in schema.specs() {
            self.print_spec(spec, 1);
        }
        Ok(())
    }

    fn print_spec(&self, spec: &ArgSpec, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut line = format!("{}{} ({})", indent, spec.name, spec.arg_type);
        if spec.required {
            line.push_str(" [required]");
        }
        if let Some(default) = &spec.default {
            line.push_str(&format!(" default={}", default));
        }
        if !spec.aliases.is_empty() {
            line.push_str(&format!(" aliases={}", spec.aliases.join(",")));
        }

        if self.use_color && spec.required {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
        if !spec.description.is_empty() {
            println!("{}    {}", indent, spec.description);
        }

        let children = match &spec.arg_type {
            ArgType::Group(children) => Some(children),
            ArgType::List(inner) => match inner.as_ref() {
                ArgType::Group(children) => Some(children),
                _ => None,
            },
            _ => None,
        };
        for child in children.into_iter().flatten() {
            self.print_spec(child, depth + 1);
        }
    }

    fn status_label(&self, status: ModuleStatus) -> String {
        let label = status.to_string();
        if !self.use_color {
            return label;
        }
        match status {
            ModuleStatus::Ok => label.green().to_string(),
            ModuleStatus::Changed => label.yellow().to_string(),
            ModuleStatus::Failed => label.red().bold().to_string(),
        }
    }

    /// Color a unified diff the way `diff --color` does
    pub fn render_diff(&self, diff: &Diff) -> String {
        let Some(details) = &diff.details else {
            return String::new();
        };

        let mut out = String::new();
        for line in details.lines() {
            let rendered = if !self.use_color {
                line.to_string()
            } else if line.starts_with("---") {
                line.red().to_string()
            } else if line.starts_with("+++") {
                line.green().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else {
                line.to_string()
            };
            out.push_str(&rendered);
            out.push('\n');
        }
        out
    }
}
