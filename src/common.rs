use std::collections::HashMap;



pub type CameraId = String;
pub type ModeOverrides = HashMap<CameraId, Mode>;

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum CameraKind {
	#[serde(rename = "PTZ")]
	Ptz,
	Arm,
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum Mode {
	Autonomous,
	LightWeight,
}

impl Mode {
	pub fn toggled(self) -> Mode {
		match self {
			Mode::Autonomous => Mode::LightWeight,
			Mode::LightWeight => Mode::Autonomous,
		}
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum Connection {
	Reachable,
	Unreachable,
}

/// A camera as the dashboard displays it.
///
/// Only ever built from a directory record; the UI never edits it apart from
/// the local mode display override.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
	pub id: CameraId,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: CameraKind,
	pub mode: Mode,
	pub connection: Connection,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub webrtc_connection_name: Option<String>,
}

impl Camera {
	/// Route parameters address a camera by either its id or its name.
	pub fn matches(&self, key: &str) -> bool {
		self.id == key || self.name == key
	}
}

pub fn find_camera<'a>(cameras: &'a [Camera], key: &str) -> Option<&'a Camera> {
	cameras.iter().find(|camera| camera.matches(key))
}

pub fn apply_mode_overrides(cameras: &mut [Camera], overrides: &ModeOverrides) {
	for camera in cameras.iter_mut() {
		if let Some(mode) = overrides.get(&camera.id) {
			camera.mode = *mode;
		}
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	fn camera(id: &str, name: &str) -> Camera {
		Camera {
			id: id.to_string(),
			name: name.to_string(),
			kind: CameraKind::Ptz,
			mode: Mode::Autonomous,
			connection: Connection::Reachable,
			webrtc_connection_name: None,
		}
	}

	#[test]
	fn mode_toggles_back_and_forth() {
		assert_eq!(Mode::Autonomous.toggled(), Mode::LightWeight);
		assert_eq!(Mode::LightWeight.toggled(), Mode::Autonomous);
	}

	#[test]
	fn cameras_are_found_by_id_or_name() {
		let cameras = vec![camera("a9f3", "camera-1"), camera("4d82", "camera-2")];
		assert_eq!(find_camera(&cameras, "camera-2").map(|c| c.id.as_str()), Some("4d82"));
		assert_eq!(find_camera(&cameras, "a9f3").map(|c| c.name.as_str()), Some("camera-1"));
		assert!(find_camera(&cameras, "camera-3").is_none());
	}

	#[test]
	fn serializes_with_dashboard_field_names() {
		let json = serde_json::to_value(camera("1", "camera-1")).unwrap();
		assert_eq!(json["type"], "PTZ");
		assert_eq!(json["mode"], "Autonomous");
		assert_eq!(json["connection"], "Reachable");
		assert!(json.get("webrtcConnectionName").is_none());
	}

	#[test]
	fn overrides_only_touch_listed_cameras() {
		let mut cameras = vec![camera("1", "camera-1"), camera("2", "camera-2")];
		let mut overrides = ModeOverrides::new();
		overrides.insert("2".to_string(), Mode::LightWeight);
		apply_mode_overrides(&mut cameras, &overrides);
		assert_eq!(cameras[0].mode, Mode::Autonomous);
		assert_eq!(cameras[1].mode, Mode::LightWeight);
	}
}
