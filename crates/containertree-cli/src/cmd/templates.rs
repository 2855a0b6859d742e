use anyhow::Result;
use std::io::Write;

use crate::output::{OutputMode, pretty_section, render_mode};
use crate::templates::{DEFAULT_TEMPLATE, TEMPLATES};

/// Execute `ctree templates`.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_templates(output: OutputMode) -> Result<()> {
    render_mode(
        output,
        &TEMPLATES,
        |templates, w| {
            for template in templates {
                writeln!(w, "{}\t{}", template.name, template.description)?;
            }
            Ok(())
        },
        |templates, w| {
            pretty_section(w, "Templates")?;
            for template in templates {
                let marker = if template.name == DEFAULT_TEMPLATE { " (default)" } else { "" };
                writeln!(w, "{:<12} {}{marker}", template.name, template.description)?;
            }
            Ok(())
        },
    )
}
