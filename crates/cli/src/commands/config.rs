use clap::Subcommand;
use taskmill_config::LoadedSettings;
use taskmill_core::Result;
use taskmill_utils::XdgPaths;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings and where each value came from
    Show {
        /// Print only the settings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default config file location
    Path,
}

impl ConfigCommands {
    pub fn execute(self, loaded: &LoadedSettings) -> Result<()> {
        match self {
            ConfigCommands::Show { json } => {
                println!("{}", serde_json::to_string_pretty(&loaded.settings)?);
                if !json {
                    println!();
                    println!("{}", render_sources(loaded));
                }
            }
            ConfigCommands::Path => {
                println!("{}", XdgPaths::config_file().display());
            }
        }
        Ok(())
    }
}

fn render_sources(loaded: &LoadedSettings) -> String {
    let width = loaded.sources.keys().map(String::len).max().unwrap_or(0);
    let mut lines = vec![match &loaded.file {
        Some(path) => format!("Config file: {}", path.display()),
        None => "Config file: none".to_string(),
    }];
    lines.extend(
        loaded
            .sources
            .iter()
            .map(|(key, source)| format!("  {key:<width$}  {source}")),
    );
    lines.join("\n")
}
