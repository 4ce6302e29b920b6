use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rocket::figment::providers::{Env, Format, Serialized, Toml};
use rocket::figment::Figment;

use crate::command::DEFAULT_COMMAND_TIMEOUT;
use crate::directory::{CameraRecord, DEFAULT_PAGE_SIZE};
use crate::dispatcher::{DispatchMode, DispatchSettings, CONTINUOUS_SPEED, REPEAT_INTERVAL};
use crate::viewer::ViewerConfig;


const DEFAULT_CONFIG_FILES: [&str; 2] = [
	"/etc/camera-dashboard/dashboard.toml",
	"dashboard.toml",
];
const ENV_PREFIX: &str = "DASHBOARD_";


#[derive(Clone, Copy, Default)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
	Rpc,
	Streams,
	#[default]
	Static,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
	pub kind: DirectoryKind,
	pub base_url: Option<String>,
	pub master_group_id: String,
	pub page_size: u32,
	pub cameras: Vec<CameraRecord>,
}

impl Default for DirectoryConfig {
	fn default() -> Self {
		Self {
			kind: DirectoryKind::default(),
			base_url: None,
			master_group_id: String::new(),
			page_size: DEFAULT_PAGE_SIZE,
			cameras: Vec::new(),
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
	/// Control service; commands are only logged when unset.
	pub base_url: Option<String>,
	pub mode: DispatchMode,
	pub timeout_ms: u64,
	pub repeat_ms: u64,
	pub speed: f32,
}

impl Default for ControlConfig {
	fn default() -> Self {
		Self {
			base_url: None,
			mode: DispatchMode::default(),
			timeout_ms: DEFAULT_COMMAND_TIMEOUT.as_millis() as u64,
			repeat_ms: REPEAT_INTERVAL.as_millis() as u64,
			speed: CONTINUOUS_SPEED,
		}
	}
}

impl ControlConfig {
	pub fn dispatch_settings(&self) -> DispatchSettings {
		DispatchSettings {
			mode: self.mode,
			repeat_interval: Duration::from_millis(self.repeat_ms),
			speed: self.speed,
			timeout: Duration::from_millis(self.timeout_ms),
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
	pub directory: DirectoryConfig,
	pub control: ControlConfig,
	pub viewer: ViewerConfig,
	/// Send unknown camera ids to the first streaming camera instead of the
	/// not-found view.
	pub redirect_to_streaming: bool,
	/// Origin the dashboard page is served from; `*` allows any.
	pub cors_allow_origin: String,
	pub request_timeout_ms: u64,
	/// How long a page waits for the directory before answering "loading".
	pub view_timeout_ms: u64,
}

impl Default for DashboardConfig {
	fn default() -> Self {
		Self {
			directory: DirectoryConfig::default(),
			control: ControlConfig::default(),
			viewer: ViewerConfig::default(),
			redirect_to_streaming: false,
			cors_allow_origin: "*".to_string(),
			request_timeout_ms: 3000,
			view_timeout_ms: 10_000,
		}
	}
}

impl DashboardConfig {
	pub fn validate(&self) -> Result<()> {
		if self.directory.kind != DirectoryKind::Static && self.directory.base_url.is_none() {
			bail!("directory.base_url is required for a {:?} directory", self.directory.kind);
		}
		if self.cors_allow_origin.trim().is_empty() {
			bail!("cors_allow_origin must not be empty; use \"*\" to allow any origin");
		}
		if self.control.repeat_ms == 0 {
			bail!("control.repeat_ms must be greater than zero");
		}
		if !(0.0..=1.0).contains(&self.control.speed) {
			bail!("control.speed must be within 0..=1, got {}", self.control.speed);
		}
		if self.directory.kind == DirectoryKind::Static && self.directory.cameras.is_empty() {
			warn!("No camera directory configured; the dashboard will be empty");
		}
		Ok(())
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn view_timeout(&self) -> Duration {
		Duration::from_millis(self.view_timeout_ms)
	}
}


/// Layers TOML files and `DASHBOARD_` environment variables over the
/// built-in defaults.
pub struct ConfigManager {
	figment: Figment,
}

impl ConfigManager {
	pub fn new() -> Self {
		Self {
			figment: Figment::from(Serialized::defaults(DashboardConfig::default())),
		}
	}

	pub fn read_config(&mut self, filenames: Vec<&str>) -> Result<()> {
		for filename in filenames {
			if !Path::new(filename).is_file() {
				bail!("config file {} does not exist", filename);
			}
			info!("Reading config file {}", filename);
			self.merge(Toml::file(filename));
		}
		Ok(())
	}

	pub fn read_default_config_files(&mut self) -> Result<()> {
		for filename in DEFAULT_CONFIG_FILES {
			if Path::new(filename).is_file() {
				info!("Reading config file {}", filename);
				self.merge(Toml::file(filename));
			}
		}
		Ok(())
	}

	pub fn dashboard_config(&self) -> Result<DashboardConfig> {
		let config: DashboardConfig = self.figment
			.clone()
			.merge(Env::prefixed(ENV_PREFIX).split("__"))
			.extract()
			.context("invalid dashboard configuration")?;
		config.validate()?;
		Ok(config)
	}

	fn merge<P: rocket::figment::Provider>(&mut self, provider: P) {
		let figment = std::mem::take(&mut self.figment);
		self.figment = figment.merge(provider);
	}
}

impl Default for ConfigManager {
	fn default() -> Self {
		Self::new()
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use crate::directory::RemoteStatus;

	fn from_toml(toml: &str) -> Result<DashboardConfig> {
		let mut manager = ConfigManager::new();
		manager.merge(Toml::string(toml));
		manager.dashboard_config()
	}

	#[test]
	fn defaults_are_valid() {
		let config = from_toml("").unwrap();
		assert_eq!(config.directory.kind, DirectoryKind::Static);
		assert_eq!(config.directory.page_size, 100);
		assert_eq!(config.control.mode, DispatchMode::Continuous);
		assert_eq!(config.control.dispatch_settings().repeat_interval, Duration::from_millis(200));
		assert_eq!(config.control.dispatch_settings().timeout, Duration::from_millis(5000));
		assert_eq!(config.cors_allow_origin, "*");
	}

	#[test]
	fn reads_sections_from_toml() {
		let config = from_toml(r#"
			redirect_to_streaming = true

			[directory]
			kind = "rpc"
			base_url = "http://registry:8080"
			master_group_id = "site-a"

			[control]
			base_url = "http://control:8081"
			mode = "discrete"

			[viewer]
			template = "https://viewer/embed?src={name}"
		"#).unwrap();
		assert_eq!(config.directory.kind, DirectoryKind::Rpc);
		assert_eq!(config.directory.master_group_id, "site-a");
		assert_eq!(config.control.mode, DispatchMode::Discrete);
		assert!(config.redirect_to_streaming);
		assert_eq!(config.viewer.template.as_deref(), Some("https://viewer/embed?src={name}"));
		assert_eq!(config.viewer.base_url, "http://localhost:1984");
	}

	#[test]
	fn static_cameras_come_from_config() {
		let config = from_toml(r#"
			[[directory.cameras]]
			id = "a9f3c27b10"
			name = "camera-1"
			status = "streaming"
			metadata = { type = "Arm" }
		"#).unwrap();
		assert_eq!(config.directory.cameras.len(), 1);
		assert_eq!(config.directory.cameras[0].status, RemoteStatus::Streaming);
		assert_eq!(config.directory.cameras[0].metadata.get("type").map(String::as_str), Some("Arm"));
	}

	#[test]
	fn remote_directory_needs_a_url() {
		let err = from_toml("[directory]\nkind = \"streams\"").unwrap_err();
		assert!(err.to_string().contains("directory.base_url"));
	}

	#[test]
	fn rejects_bad_control_settings() {
		assert!(from_toml("[control]\nrepeat_ms = 0").is_err());
		assert!(from_toml("[control]\nspeed = 1.5").is_err());
		assert!(from_toml("[control]\nmode = \"sideways\"").is_err());
		assert!(from_toml("cors_allow_origin = \"\"").is_err());
	}

	#[test]
	fn missing_file_is_an_error() {
		let mut manager = ConfigManager::new();
		assert!(manager.read_config(vec!["/nonexistent/dashboard.toml"]).is_err());
	}
}
