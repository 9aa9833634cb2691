pub mod config;
pub mod deploy;
pub mod report;

pub use config::{CheckConfig, DeployConfig};
pub use deploy::{CommandRunner, DeployError, DeployPipeline, ShellRunner};

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
 ┌─────────────────────────────────┐
 │  m e n d l i n k        🔗⛓️🔗  │
 └─────────────────────────────────┘
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} v{} - self-healing links for static sites\n",
        "mendlink".bright_white().bold(),
        env!("CARGO_PKG_VERSION")
    );
}
