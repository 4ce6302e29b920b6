#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use clap::{Command, Arg, ArgAction};

mod command;
mod common;
mod config;
mod cors;
mod dashboard;
mod directory;
mod dispatcher;
mod ptz;
mod rest_api;
mod viewer;
mod views;



#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = Command::new("camera-dashboard")
		.version("0.1.0")
		.about("Camera dashboard with live viewing and PTZ control.")
		.arg(
			Arg::new("config")
				.action(ArgAction::Append)	// Allow argument to be specified multiple times
				.short('c')
				.long("config")
				.help("TOML file with dashboard config")
		)
		.get_matches();

	let mut config_manager = config::ConfigManager::new();
	match matches.get_many::<String>("config") {
		Some(filenames) => {
			config_manager.read_config(filenames.map(|v| v.as_str()).collect())?;
		},
		None => {
			config_manager.read_default_config_files()?;
		}
	};
	let dashboard_config = config_manager.dashboard_config()?;
	let dashboard = dashboard::Dashboard::from_config(&dashboard_config)?;

	rocket::build()
		.attach(rest_api::stage(dashboard))
		.attach(cors::Cors::new(&dashboard_config.cors_allow_origin))
		.launch()
		.await?;

	anyhow::Ok(())
}
