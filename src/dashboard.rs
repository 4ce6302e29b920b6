use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Client;

use crate::command::{CommandSink, LogSink, RpcCommandSink};
use crate::common::{apply_mode_overrides, find_camera, Camera, CameraId, Mode, ModeOverrides};
use crate::config::{DashboardConfig, DirectoryKind};
use crate::directory::{self, CameraDirectory, DirectoryQuery, RpcDirectory, StaticDirectory, StreamsDirectory};
use crate::dispatcher::{ControlPanel, DispatchSettings};
use crate::views::{self, CameraPage, DashboardContent, ErrorView, MonitorContent, ViewState};
use crate::viewer::ViewerConfig;


/// Outcome of opening a camera page.
#[derive(Debug)]
pub enum CameraLookup {
	Found(CameraPage),
	Redirect(CameraId),
	NotFound(ErrorView),
	Failed(ErrorView),
}

/// Everything the routes need: where cameras come from, where commands go,
/// and how pages are assembled.
pub struct Dashboard {
	directory: Arc<dyn CameraDirectory>,
	sink: Arc<dyn CommandSink>,
	viewer: ViewerConfig,
	dispatch: DispatchSettings,
	master_group_id: String,
	page_size: u32,
	redirect_to_streaming: bool,
	view_timeout: Duration,
}

impl Dashboard {
	pub fn new(directory: Arc<dyn CameraDirectory>, sink: Arc<dyn CommandSink>, config: &DashboardConfig) -> Self {
		Self {
			directory,
			sink,
			viewer: config.viewer.clone(),
			dispatch: config.control.dispatch_settings(),
			master_group_id: config.directory.master_group_id.clone(),
			page_size: config.directory.page_size,
			redirect_to_streaming: config.redirect_to_streaming,
			view_timeout: config.view_timeout(),
		}
	}

	pub fn from_config(config: &DashboardConfig) -> Result<Self> {
		let client = Client::builder()
			.timeout(config.request_timeout())
			.build()
			.context("http client build failed")?;

		let directory = match (config.directory.kind, config.directory.base_url.as_deref()) {
			(DirectoryKind::Rpc, Some(base_url)) => {
				info!("Listing cameras from registry at {}", base_url);
				directory::shared(RpcDirectory::new(client.clone(), base_url))
			},
			(DirectoryKind::Streams, Some(base_url)) => {
				info!("Listing cameras from media server streams at {}", base_url);
				directory::shared(StreamsDirectory::new(client.clone(), base_url))
			},
			_ => {
				info!("Using {} statically configured cameras", config.directory.cameras.len());
				directory::shared(StaticDirectory::new(config.directory.cameras.clone()))
			}
		};

		let sink: Arc<dyn CommandSink> = match config.control.base_url.as_deref() {
			Some(base_url) => {
				info!("Sending control commands to {}", base_url);
				Arc::new(RpcCommandSink::new(client, base_url))
			},
			None => {
				warn!("No control service configured; PTZ commands will only be logged");
				Arc::new(LogSink)
			}
		};

		Ok(Self::new(directory, sink, config))
	}

	fn query(&self) -> DirectoryQuery {
		DirectoryQuery {
			master_group_id: self.master_group_id.clone(),
			page_size: self.page_size,
			..DirectoryQuery::default()
		}
	}

	/// `None` when the directory did not answer within the view timeout.
	async fn fetch_cameras(&self, query: &DirectoryQuery, overrides: &ModeOverrides) -> Option<Result<Vec<Camera>>> {
		let fetch = tokio::time::timeout(self.view_timeout, self.directory.list_cameras(query)).await;
		let Ok(result) = fetch else {
			warn!("Camera directory did not answer within {:?}", self.view_timeout);
			return None;
		};
		Some(result
			.map(|records| {
				let mut cameras = directory::map_cameras(&records);
				apply_mode_overrides(&mut cameras, overrides);
				cameras
			})
			.map_err(|err| {
				warn!("Camera directory fetch failed; error was {:#}", err);
				err
			}))
	}

	pub async fn dashboard(&self, overrides: &ModeOverrides) -> ViewState<DashboardContent> {
		let fetch = self.fetch_cameras(&self.query(), overrides).await;
		ViewState::from_fetch(fetch, views::NO_CAMERAS_MESSAGE, |cameras| views::dashboard_content(cameras, &self.viewer))
	}

	pub async fn monitor(&self, overrides: &ModeOverrides) -> ViewState<MonitorContent> {
		let fetch = self.fetch_cameras(&self.query(), overrides).await;
		ViewState::from_fetch(fetch, views::NO_STREAMS_MESSAGE, |cameras| views::monitor_content(cameras, &self.viewer))
	}

	pub async fn camera(&self, key: &str, overrides: &ModeOverrides) -> CameraLookup {
		let cameras = match self.fetch_cameras(&self.query(), overrides).await {
			Some(Ok(cameras)) => cameras,
			Some(Err(err)) => return CameraLookup::Failed(ErrorView::new(format!("{:#}", err))),
			None => return CameraLookup::Failed(ErrorView::new("Camera directory did not answer in time".to_string())),
		};
		if let Some(camera) = find_camera(&cameras, key) {
			return CameraLookup::Found(views::camera_page(camera.clone(), &self.viewer, self.dispatch.mode));
		}

		if self.redirect_to_streaming {
			if let Some(Ok(streaming)) = self.fetch_cameras(&self.query().streaming(), overrides).await {
				if let Some(first) = streaming.first() {
					info!("Camera {} is unknown; redirecting to streaming camera {}", key, first.id);
					return CameraLookup::Redirect(first.id.clone());
				}
			}
		}
		CameraLookup::NotFound(ErrorView::camera_not_found(key))
	}

	/// Current mode as shown for a camera, for the local toggle.
	pub async fn displayed_mode(&self, key: &str, overrides: &ModeOverrides) -> Result<Option<(CameraId, Mode)>> {
		let cameras = match self.fetch_cameras(&self.query(), overrides).await {
			Some(result) => result?,
			None => anyhow::bail!("Camera directory did not answer in time"),
		};
		Ok(find_camera(&cameras, key).map(|camera| (camera.id.clone(), camera.mode)))
	}

	pub fn new_panel(&self, camera_id: &str) -> ControlPanel {
		ControlPanel::new(camera_id, self.dispatch.clone(), Arc::clone(&self.sink))
	}
}




#[cfg(test)]
mod tests {
	use super::testing::{FailingDirectory, StalledDirectory};
	use super::*;
	use crate::command::testing::RecordingSink;
	use crate::directory::{CameraRecord, RemoteStatus};

	fn record(id: &str, name: &str, status: RemoteStatus) -> CameraRecord {
		CameraRecord {
			id: id.to_string(),
			name: name.to_string(),
			status,
			..CameraRecord::default()
		}
	}

	fn dashboard_with(directory: Arc<dyn CameraDirectory>, config: DashboardConfig) -> Dashboard {
		Dashboard::new(directory, Arc::new(RecordingSink::default()), &config)
	}

	fn sample_directory() -> Arc<dyn CameraDirectory> {
		directory::shared(StaticDirectory::new(vec![
			record("c1", "camera-1", RemoteStatus::Online),
			record("c2", "camera-2", RemoteStatus::Streaming),
		]))
	}

	#[tokio::test]
	async fn unknown_camera_gets_the_not_found_view() {
		let dashboard = dashboard_with(sample_directory(), DashboardConfig::default());
		match dashboard.camera("camera-9", &ModeOverrides::new()).await {
			CameraLookup::NotFound(view) => assert_eq!(view.reason, "Camera not found: camera-9"),
			other => panic!("unexpected lookup {other:?}"),
		}
	}

	#[tokio::test]
	async fn unknown_camera_redirects_to_streaming_when_enabled() {
		let config = DashboardConfig { redirect_to_streaming: true, ..DashboardConfig::default() };
		let dashboard = dashboard_with(sample_directory(), config);
		match dashboard.camera("camera-9", &ModeOverrides::new()).await {
			CameraLookup::Redirect(id) => assert_eq!(id, "c2"),
			other => panic!("unexpected lookup {other:?}"),
		}
	}

	#[tokio::test]
	async fn overrides_show_on_the_camera_page() {
		let dashboard = dashboard_with(sample_directory(), DashboardConfig::default());
		let mut overrides = ModeOverrides::new();
		overrides.insert("c1".to_string(), Mode::LightWeight);
		match dashboard.camera("camera-1", &overrides).await {
			CameraLookup::Found(page) => assert_eq!(page.camera.mode, Mode::LightWeight),
			other => panic!("unexpected lookup {other:?}"),
		}
	}

	#[tokio::test]
	async fn directory_failure_is_not_a_not_found() {
		let dashboard = dashboard_with(Arc::new(FailingDirectory("registry offline")), DashboardConfig::default());
		match dashboard.camera("camera-1", &ModeOverrides::new()).await {
			CameraLookup::Failed(view) => assert_eq!(view.reason, "registry offline"),
			other => panic!("unexpected lookup {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn slow_directory_reports_loading() {
		let dashboard = dashboard_with(Arc::new(StalledDirectory), DashboardConfig::default());
		assert_eq!(dashboard.monitor(&ModeOverrides::new()).await, ViewState::Loading);
	}
}
