use anyhow::Result;
use log::warn;

use crate::common::{Camera, CameraId, CameraKind, Connection, Mode};
use crate::dispatcher::DispatchMode;
use crate::ptz::{Control, ARM_CONTROLS, PTZ_CONTROLS};
use crate::viewer::{self, ViewerConfig};


pub const NO_CAMERAS_MESSAGE: &str = "No cameras available";
pub const NO_STREAMS_MESSAGE: &str = "No streams available";


/// Loading, error, empty and ready are mutually exclusive, checked in that
/// order.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewState<T> {
	Loading,
	Error { message: String },
	Empty { message: String },
	Ready(T),
}

impl<T> ViewState<T> {
	/// `None` means the fetch has not produced an answer yet.
	pub fn from_fetch<F>(fetch: Option<Result<Vec<Camera>>>, empty_message: &str, build: F) -> Self
	where
		F: FnOnce(Vec<Camera>) -> T,
	{
		match fetch {
			None => ViewState::Loading,
			Some(Err(err)) => ViewState::Error { message: format!("{:#}", err) },
			Some(Ok(cameras)) if cameras.is_empty() => ViewState::Empty { message: empty_message.to_string() },
			Some(Ok(cameras)) => ViewState::Ready(build(cameras)),
		}
	}
}


#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraCard {
	pub id: CameraId,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: CameraKind,
	pub mode: Mode,
	pub connection: Connection,
	/// Where clicking the card navigates.
	pub href: String,
	pub viewer_url: Option<String>,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct DashboardContent {
	pub cards: Vec<CameraCard>,
}

pub fn dashboard_content(cameras: Vec<Camera>, viewer: &ViewerConfig) -> DashboardContent {
	let cards = cameras.into_iter()
		.map(|camera| CameraCard {
			href: format!("/{}", camera.name),
			viewer_url: resolve_viewer_url(viewer, &camera),
			id: camera.id,
			name: camera.name,
			kind: camera.kind,
			mode: camera.mode,
			connection: camera.connection,
		})
		.collect();
	DashboardContent { cards }
}


#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorTile {
	pub name: String,
	pub label: String,
	pub connection: Connection,
	pub viewer_url: Option<String>,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct MonitorContent {
	pub columns: usize,
	pub tiles: Vec<MonitorTile>,
}

/// Grid width for the monitor wall at medium and wider viewports.
pub fn column_count(cameras: usize) -> usize {
	match cameras {
		0..=1 => 1,
		2..=4 => 2,
		5..=9 => 3,
		_ => 4,
	}
}

pub fn monitor_content(cameras: Vec<Camera>, viewer: &ViewerConfig) -> MonitorContent {
	let columns = column_count(cameras.len());
	let tiles = cameras.into_iter()
		.map(|camera| MonitorTile {
			label: format!("Camera {}", camera.name),
			viewer_url: resolve_viewer_url(viewer, &camera),
			connection: camera.connection,
			name: camera.name,
		})
		.collect();
	MonitorContent { columns, tiles }
}


#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPage {
	pub camera: Camera,
	pub stream_name: String,
	pub viewer_url: Option<String>,
	pub dispatch_mode: DispatchMode,
	pub controls: Vec<Control>,
}

pub fn camera_page(camera: Camera, viewer: &ViewerConfig, dispatch_mode: DispatchMode) -> CameraPage {
	let controls = match camera.kind {
		CameraKind::Ptz => PTZ_CONTROLS.to_vec(),
		CameraKind::Arm => ARM_CONTROLS.to_vec(),
	};
	CameraPage {
		stream_name: viewer::stream_name(&camera).to_string(),
		viewer_url: resolve_viewer_url(viewer, &camera),
		dispatch_mode,
		controls,
		camera,
	}
}

/// Rendered in place of the camera page when the id is unknown.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct ErrorView {
	pub status: &'static str,
	pub reason: String,
}

impl ErrorView {
	pub fn new(reason: String) -> Self {
		Self { status: "error", reason }
	}

	pub fn camera_not_found(key: &str) -> Self {
		Self::new(format!("Camera not found: {}", key))
	}
}

fn resolve_viewer_url(viewer: &ViewerConfig, camera: &Camera) -> Option<String> {
	match viewer::camera_viewer_url(viewer, camera) {
		Ok(url) => Some(url.into()),
		Err(err) => {
			warn!("No viewer for camera {}; error was {:#}", camera.name, err);
			None
		}
	}
}
