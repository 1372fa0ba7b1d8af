//! TOML configuration loading layered on [`flood::config::PipelineConfig::default`].

use std::path::Path;

use flood::config::PipelineConfig;

pub fn load(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
	let config = match path {
		Some(path) => {
			let text = std::fs::read_to_string(path)?;
			toml::from_str(&text)?
		},
		None => PipelineConfig::default(),
	};
	config.validate()?;
	Ok(config)
}
