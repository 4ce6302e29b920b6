use anyhow::{anyhow, Context, Result};
use url::form_urlencoded;
use url::Url;

use crate::common::Camera;


pub const NAME_PLACEHOLDER: &str = "{name}";
const DEFAULT_BASE_URL: &str = "http://localhost:1984";


/// Where the embedded WebRTC player lives.
///
/// A `template` with a `{name}` placeholder wins over `base_url`.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
	pub base_url: String,
	pub template: Option<String>,
}

impl Default for ViewerConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			template: None,
		}
	}
}

/// The connection name the media server knows this camera by.
pub fn stream_name(camera: &Camera) -> &str {
	[
		camera.webrtc_connection_name.as_deref().unwrap_or(""),
		camera.name.as_str(),
		camera.id.as_str(),
	]
		.into_iter()
		.find(|candidate| !candidate.is_empty())
		.unwrap_or("camera")
}

pub fn viewer_url(config: &ViewerConfig, name: &str) -> Result<Url> {
	let encoded: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
	if let Some(template) = config.template.as_deref().filter(|t| t.contains(NAME_PLACEHOLDER)) {
		let resolved = template.replace(NAME_PLACEHOLDER, &encoded);
		return Url::parse(&resolved)
			.with_context(|| format!("viewer template produced an invalid url: {}", resolved));
	}

	let mut url = Url::parse(&config.base_url)
		.with_context(|| format!("invalid viewer base url: {}", config.base_url))?;
	url.path_segments_mut()
		.map_err(|_| anyhow!("viewer base url cannot carry a path: {}", config.base_url))?
		.pop_if_empty()
		.push("webrtc.html");
	url.set_query(Some(&format!("src={}&media=video+audio", encoded)));
	Ok(url)
}

pub fn camera_viewer_url(config: &ViewerConfig, camera: &Camera) -> Result<Url> {
	viewer_url(config, stream_name(camera))
}



#[cfg(test)]
mod tests {
	use super::*;
	use crate::common::{CameraKind, Connection, Mode};

	fn camera(id: &str, name: &str, alias: Option<&str>) -> Camera {
		Camera {
			id: id.to_string(),
			name: name.to_string(),
			kind: CameraKind::Ptz,
			mode: Mode::Autonomous,
			connection: Connection::Reachable,
			webrtc_connection_name: alias.map(str::to_string),
		}
	}

	#[test]
	fn stream_name_prefers_alias_then_name_then_id() {
		assert_eq!(stream_name(&camera("1", "camera-1", Some("cam1-webrtc"))), "cam1-webrtc");
		assert_eq!(stream_name(&camera("1", "camera-1", None)), "camera-1");
		assert_eq!(stream_name(&camera("1", "", None)), "1");
		assert_eq!(stream_name(&camera("", "", None)), "camera");
	}

	#[test]
	fn default_convention_uses_webrtc_html() {
		let config = ViewerConfig {
			base_url: "http://media.local:1984".to_string(),
			template: None,
		};
		let url = viewer_url(&config, "camera-1").unwrap();
		assert_eq!(url.as_str(), "http://media.local:1984/webrtc.html?src=camera-1&media=video+audio");
	}

	#[test]
	fn base_path_is_kept() {
		let config = ViewerConfig {
			base_url: "https://example.com/go2rtc/".to_string(),
			template: None,
		};
		let url = viewer_url(&config, "front door").unwrap();
		assert_eq!(url.as_str(), "https://example.com/go2rtc/webrtc.html?src=front+door&media=video+audio");
	}

	#[test]
	fn template_placeholder_is_substituted() {
		let config = ViewerConfig {
			base_url: DEFAULT_BASE_URL.to_string(),
			template: Some("https://viewer.example/embed?stream={name}&autoplay=1".to_string()),
		};
		let url = viewer_url(&config, "a&b").unwrap();
		assert_eq!(url.as_str(), "https://viewer.example/embed?stream=a%26b&autoplay=1");
	}

	#[test]
	fn template_without_placeholder_falls_back_to_base() {
		let config = ViewerConfig {
			base_url: "http://media.local".to_string(),
			template: Some("https://viewer.example/embed".to_string()),
		};
		let url = viewer_url(&config, "cam").unwrap();
		assert_eq!(url.as_str(), "http://media.local/webrtc.html?src=cam&media=video+audio");
	}

	#[test]
	fn invalid_base_is_an_error() {
		let config = ViewerConfig {
			base_url: "not a url".to_string(),
			template: None,
		};
		assert!(viewer_url(&config, "cam").is_err());
	}
}
