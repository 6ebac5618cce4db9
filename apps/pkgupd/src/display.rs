//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::Style;
use pkgup_types::Package;
use serde::Serialize;
use std::io;

/// Result of a command, rendered as text or JSON
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Update admitted; content may still be arriving
    Admitted { package: String, merkle: String },
    /// Update fully activated
    Activated { package: String, merkle: String },
    Packages { packages: Vec<Package> },
    Sources { sources: Vec<String> },
    /// Outcome of a source registry change
    SourceChange { url: String, changed: bool },
    Check { updates_available: bool },
    Blob { merkle: String },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    bold: Style,
}

impl OutputRenderer {
    pub fn new(json_output: bool, colors: bool) -> Self {
        Self {
            json_output,
            bold: Style::new().bold().force_styling(colors),
        }
    }

    /// Render a command result on stdout
    pub fn render_result(&self, result: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            CommandOutput::Admitted { package, merkle } => {
                println!("Admitted {} ({merkle})", self.bold.apply_to(package));
            }
            CommandOutput::Activated { package, merkle } => {
                println!("Activated {} ({merkle})", self.bold.apply_to(package));
            }
            CommandOutput::Packages { packages } => self.render_package_list(packages),
            CommandOutput::Sources { sources } => self.render_sources(sources),
            CommandOutput::SourceChange { url, changed } => {
                if *changed {
                    println!("Updated sources: {url}");
                } else {
                    println!("No change: {url}");
                }
            }
            CommandOutput::Check { updates_available } => {
                if *updates_available {
                    println!("Updates are available.");
                } else {
                    println!("Everything is up to date.");
                }
            }
            CommandOutput::Blob { merkle } => println!("Fetched blob {merkle}"),
        }
        Ok(())
    }

    fn render_package_list(&self, packages: &[Package]) {
        if packages.is_empty() {
            println!("No packages activated.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Merkle").add_attribute(Attribute::Bold),
        ]);
        for package in packages {
            table.add_row(vec![
                Cell::new(&package.name),
                Cell::new(if package.version.is_empty() {
                    "-"
                } else {
                    package.version.as_str()
                }),
                Cell::new(&package.merkle),
            ]);
        }
        println!("{table}");
    }

    fn render_sources(&self, sources: &[String]) {
        if sources.is_empty() {
            println!("No sources registered.");
            return;
        }
        for (priority, source) in sources.iter().enumerate() {
            println!("{:>3}  {}", priority + 1, self.bold.apply_to(source));
        }
    }
}
