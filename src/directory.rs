use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::common::{Camera, CameraKind, Connection, Mode};


pub const DEFAULT_PAGE_SIZE: u32 = 100;

const LIST_ALL_CAMERAS_PATH: &str = "proto.v1.CRService/ListAllCameras";
const STREAMS_PATH: &str = "api/streams";


#[derive(Clone, Copy, Default)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum RemoteMode {
	#[serde(rename = "CAMERA_MODE_AUTONOMOUS", alias = "autonomous")]
	Autonomous,
	#[serde(rename = "CAMERA_MODE_LIGHTWEIGHT", alias = "lightweight")]
	Lightweight,
	#[default]
	#[serde(rename = "CAMERA_MODE_UNSPECIFIED", other)]
	Unspecified,
}

#[derive(Clone, Copy, Default)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum RemoteStatus {
	#[serde(rename = "CAMERA_STATUS_OFFLINE", alias = "offline")]
	Offline,
	#[serde(rename = "CAMERA_STATUS_ONLINE", alias = "online")]
	Online,
	#[serde(rename = "CAMERA_STATUS_STREAMING", alias = "streaming")]
	Streaming,
	#[serde(rename = "CAMERA_STATUS_ERROR", alias = "error")]
	Error,
	#[default]
	#[serde(rename = "CAMERA_STATUS_UNSPECIFIED", other)]
	Unspecified,
}

/// One camera as the remote directory reports it.
#[derive(Clone, Default)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraRecord {
	pub id: String,
	pub name: String,
	pub mode: RemoteMode,
	pub status: RemoteStatus,
	pub webrtc_connection_name: String,
	pub metadata: HashMap<String, String>,
}

impl CameraRecord {
	pub fn to_camera(&self) -> Camera {
		let mode = match self.mode {
			RemoteMode::Lightweight => Mode::LightWeight,
			_ => Mode::Autonomous,
		};
		let connection = match self.status {
			RemoteStatus::Online | RemoteStatus::Streaming => Connection::Reachable,
			_ => Connection::Unreachable,
		};
		let kind = match self.metadata.get("type").map(String::as_str) {
			Some("Arm") => CameraKind::Arm,
			_ => CameraKind::Ptz,
		};
		let webrtc_connection_name = Some(self.webrtc_connection_name.trim())
			.filter(|alias| !alias.is_empty())
			.map(str::to_string);

		Camera {
			id: self.id.clone(),
			name: self.name.clone(),
			kind,
			mode,
			connection,
			webrtc_connection_name,
		}
	}
}

pub fn map_cameras(records: &[CameraRecord]) -> Vec<Camera> {
	records.iter().map(CameraRecord::to_camera).collect()
}

/// Filters for a directory listing. Empty filters match everything.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryQuery {
	#[serde(rename = "masterMfId")]
	pub master_group_id: String,
	pub mode_filter: Vec<RemoteMode>,
	pub status_filter: Vec<RemoteStatus>,
	pub page_size: u32,
	pub page_token: String,
}

impl Default for DirectoryQuery {
	fn default() -> Self {
		Self {
			master_group_id: String::new(),
			mode_filter: Vec::new(),
			status_filter: Vec::new(),
			page_size: DEFAULT_PAGE_SIZE,
			page_token: String::new(),
		}
	}
}

impl DirectoryQuery {
	pub fn streaming(mut self) -> Self {
		self.status_filter = vec![RemoteStatus::Streaming];
		self
	}

	fn admits(&self, record: &CameraRecord) -> bool {
		(self.mode_filter.is_empty() || self.mode_filter.contains(&record.mode))
			&& (self.status_filter.is_empty() || self.status_filter.contains(&record.status))
	}

	fn apply(&self, records: impl IntoIterator<Item = CameraRecord>) -> Vec<CameraRecord> {
		let admitted = records.into_iter().filter(|record| self.admits(record));
		if self.page_size == 0 {
			admitted.collect()
		} else {
			admitted.take(self.page_size as usize).collect()
		}
	}
}

#[async_trait]
pub trait CameraDirectory: Send + Sync {
	async fn list_cameras(&self, query: &DirectoryQuery) -> Result<Vec<CameraRecord>>;
}


#[derive(Default)]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListAllCamerasResponse {
	cameras: Vec<CameraRecord>,
}

/// Directory backed by the camera registry RPC service (Connect JSON).
pub struct RpcDirectory {
	client: Client,
	endpoint: String,
}

impl RpcDirectory {
	pub fn new(client: Client, base_url: &str) -> Self {
		Self {
			client,
			endpoint: join_endpoint(base_url, LIST_ALL_CAMERAS_PATH),
		}
	}
}

#[async_trait]
impl CameraDirectory for RpcDirectory {
	async fn list_cameras(&self, query: &DirectoryQuery) -> Result<Vec<CameraRecord>> {
		let response = self.client
			.post(&self.endpoint)
			.json(query)
			.send()
			.await
			.with_context(|| format!("camera directory request failed for {}", self.endpoint))?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			bail!("camera directory returned HTTP {}: {}", status.as_u16(), body);
		}
		let listing: ListAllCamerasResponse = response
			.json()
			.await
			.context("camera directory response was not valid JSON")?;
		debug!("Camera directory listed {} cameras", listing.cameras.len());
		Ok(listing.cameras)
	}
}

/// Directory derived from the stream list of a WebRTC media server.
///
/// Every published stream is reported as a reachable PTZ camera named after
/// the stream.
pub struct StreamsDirectory {
	client: Client,
	endpoint: String,
}

impl StreamsDirectory {
	pub fn new(client: Client, base_url: &str) -> Self {
		Self {
			client,
			endpoint: join_endpoint(base_url, STREAMS_PATH),
		}
	}
}

#[async_trait]
impl CameraDirectory for StreamsDirectory {
	async fn list_cameras(&self, query: &DirectoryQuery) -> Result<Vec<CameraRecord>> {
		let response = self.client
			.get(&self.endpoint)
			.send()
			.await
			.with_context(|| format!("stream list request failed for {}", self.endpoint))?;
		let status = response.status();
		if !status.is_success() {
			bail!("Failed to fetch streams: {} {}", status.as_u16(), status.canonical_reason().unwrap_or(""));
		}
		let streams: Option<Map<String, Value>> = response
			.json()
			.await
			.context("stream list response was not valid JSON")?;
		let records = records_from_streams(streams)?;
		Ok(query.apply(records))
	}
}

fn records_from_streams(streams: Option<Map<String, Value>>) -> Result<Vec<CameraRecord>> {
	let streams = streams.filter(|streams| !streams.is_empty())
		.ok_or_else(|| anyhow!("No streams available"))?;
	Ok(streams.keys()
		.map(|name| CameraRecord {
			id: name.clone(),
			name: name.clone(),
			mode: RemoteMode::Autonomous,
			status: RemoteStatus::Streaming,
			..CameraRecord::default()
		})
		.collect())
}

/// Directory with a fixed camera list, taken from configuration.
pub struct StaticDirectory {
	cameras: Vec<CameraRecord>,
}

impl StaticDirectory {
	pub fn new(cameras: Vec<CameraRecord>) -> Self {
		Self { cameras }
	}
}

#[async_trait]
impl CameraDirectory for StaticDirectory {
	async fn list_cameras(&self, query: &DirectoryQuery) -> Result<Vec<CameraRecord>> {
		Ok(query.apply(self.cameras.iter().cloned()))
	}
}

pub fn shared<D: CameraDirectory + 'static>(directory: D) -> Arc<dyn CameraDirectory> {
	Arc::new(directory)
}

fn join_endpoint(base_url: &str, path: &str) -> String {
	format!("{}/{}", base_url.trim_end_matches('/'), path)
}
