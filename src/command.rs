use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::CameraId;


pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

const STREAM_CONTROL_COMMANDS_PATH: &str = "proto.v1.FDService/StreamControlCommands";


#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum CommandType {
	#[serde(rename = "PTZ_ABSOLUTE")]
	PtzAbsolute,
	#[serde(rename = "PTZ_CONTINUOUS")]
	PtzContinuous,
	#[serde(rename = "PTZ_STOP")]
	PtzStop,
}

/// Positions for absolute moves, signed speeds for continuous moves.
#[derive(Clone, Copy, Default)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtzParameters {
	pub pan: f32,
	pub tilt: f32,
	pub zoom: f32,
	pub pan_speed: f32,
	pub tilt_speed: f32,
	pub zoom_speed: f32,
}

/// Envelope accepted by the control-command stream.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommand {
	pub command_id: String,
	pub camera_id: CameraId,
	#[serde(rename = "type")]
	pub kind: CommandType,
	pub ptz_parameters: PtzParameters,
	pub preset_number: u32,
	pub focus_value: f32,
	pub timeout_ms: u64,
}

impl ControlCommand {
	/// Every command gets a fresh identifier.
	pub fn new(camera_id: &str, kind: CommandType, ptz_parameters: PtzParameters, timeout: Duration) -> Self {
		Self {
			command_id: Uuid::new_v4().to_string(),
			camera_id: camera_id.to_string(),
			kind,
			ptz_parameters,
			preset_number: 0,
			focus_value: 0.0,
			timeout_ms: timeout.as_millis() as u64,
		}
	}
}

#[async_trait]
pub trait CommandSink: Send + Sync {
	async fn send(&self, command: &ControlCommand) -> Result<()>;
}


#[derive(Serialize)]
struct StreamControlCommandsRequest<'a> {
	command: &'a ControlCommand,
}

/// Sends commands to the remote control service (Connect JSON).
pub struct RpcCommandSink {
	client: Client,
	endpoint: String,
}

impl RpcCommandSink {
	pub fn new(client: Client, base_url: &str) -> Self {
		Self {
			client,
			endpoint: format!("{}/{}", base_url.trim_end_matches('/'), STREAM_CONTROL_COMMANDS_PATH),
		}
	}
}

#[async_trait]
impl CommandSink for RpcCommandSink {
	async fn send(&self, command: &ControlCommand) -> Result<()> {
		let response = self.client
			.post(&self.endpoint)
			.json(&StreamControlCommandsRequest { command })
			.send()
			.await
			.with_context(|| format!("control command request failed for {}", self.endpoint))?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			bail!("control service returned HTTP {}: {}", status.as_u16(), body);
		}
		Ok(())
	}
}

/// Used when no control service is configured: commands are only logged.
pub struct LogSink;

#[async_trait]
impl CommandSink for LogSink {
	async fn send(&self, command: &ControlCommand) -> Result<()> {
		info!(
			"{:?} for camera {} (id {}): {:?}",
			command.kind, command.camera_id, command.command_id, command.ptz_parameters
		);
		Ok(())
	}
}


/// Delivers one camera's commands.
///
/// Sends start in submission order and run side by side, so a slow or hung
/// send never holds back the ones behind it. A failure is only logged.
/// Dropping the worker lets queued and running sends finish before the task
/// ends, so a final stop still reaches the camera.
pub struct CommandWorker {
	tx: mpsc::UnboundedSender<ControlCommand>,
	in_flight: Arc<AtomicUsize>,
}

impl CommandWorker {
	pub fn spawn(sink: Arc<dyn CommandSink>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let in_flight = Arc::new(AtomicUsize::new(0));
		tokio::spawn(run_worker(sink, rx, Arc::clone(&in_flight)));
		Self { tx, in_flight }
	}

	pub fn submit(&self, command: ControlCommand) {
		self.in_flight.fetch_add(1, Ordering::SeqCst);
		if let Err(err) = self.tx.send(command) {
			self.in_flight.fetch_sub(1, Ordering::SeqCst);
			warn!("Command worker is gone; dropped command {}", err.0.command_id);
		}
	}

	/// Commands queued or being sent right now.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}
}

async fn run_worker(
	sink: Arc<dyn CommandSink>,
	mut rx: mpsc::UnboundedReceiver<ControlCommand>,
	in_flight: Arc<AtomicUsize>,
) {
	let mut sends = FuturesUnordered::new();
	loop {
		tokio::select! {
			biased;
			Some(()) = sends.next() => {},
			command = rx.recv() => match command {
				Some(command) => sends.push(deliver(Arc::clone(&sink), command, Arc::clone(&in_flight))),
				None => break,
			},
		}
	}
	while sends.next().await.is_some() {}
}

async fn deliver(sink: Arc<dyn CommandSink>, command: ControlCommand, in_flight: Arc<AtomicUsize>) {
	match sink.send(&command).await {
		Ok(()) => {
			debug!("Sent {:?} command {} to camera {}", command.kind, command.command_id, command.camera_id);
		},
		Err(err) => {
			warn!(
				"Failed to send {:?} command {} to camera {}; error was {:#}",
				command.kind, command.command_id, command.camera_id, err
			);
		}
	}
	in_flight.fetch_sub(1, Ordering::SeqCst);
}




#[cfg(test)]
mod tests {
	use super::testing::RecordingSink;
	use super::*;

	#[test]
	fn envelope_uses_wire_names() {
		let parameters = PtzParameters { pan: 10.0, pan_speed: 0.6, ..PtzParameters::default() };
		let command = ControlCommand::new("cam-1", CommandType::PtzAbsolute, parameters, DEFAULT_COMMAND_TIMEOUT);
		let json = serde_json::to_value(&command).unwrap();
		assert_eq!(json["cameraId"], "cam-1");
		assert_eq!(json["type"], "PTZ_ABSOLUTE");
		assert_eq!(json["ptzParameters"]["pan"], 10.0);
		assert_eq!(json["ptzParameters"]["panSpeed"], 0.6f32 as f64);
		assert_eq!(json["presetNumber"], 0);
		assert_eq!(json["focusValue"], 0.0);
		assert_eq!(json["timeoutMs"], 5000);
		assert!(json["commandId"].as_str().is_some_and(|id| !id.is_empty()));
	}

	#[test]
	fn command_ids_are_unique() {
		let a = ControlCommand::new("cam", CommandType::PtzStop, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT);
		let b = ControlCommand::new("cam", CommandType::PtzStop, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT);
		assert_ne!(a.command_id, b.command_id);
	}

	#[tokio::test]
	async fn worker_sends_in_order_and_survives_failures() {
		let sink = Arc::new(RecordingSink::failing());
		let worker = CommandWorker::spawn(sink.clone());
		worker.submit(ControlCommand::new("cam", CommandType::PtzContinuous, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT));
		worker.submit(ControlCommand::new("cam", CommandType::PtzStop, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT));
		drop(worker);

		for _ in 0..100 {
			if sink.commands().len() == 2 {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert_eq!(sink.kinds(), vec![CommandType::PtzContinuous, CommandType::PtzStop]);
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_send_does_not_hold_back_the_next() {
		let delay = Duration::from_secs(3);
		let sink = Arc::new(RecordingSink::stalled(delay));
		let worker = CommandWorker::spawn(sink.clone());
		let submitted = tokio::time::Instant::now();
		worker.submit(ControlCommand::new("cam", CommandType::PtzContinuous, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT));
		worker.submit(ControlCommand::new("cam", CommandType::PtzStop, PtzParameters::default(), DEFAULT_COMMAND_TIMEOUT));

		tokio::time::sleep(Duration::from_millis(10)).await;
		let started = sink.started();
		assert_eq!(started.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(), vec![CommandType::PtzContinuous, CommandType::PtzStop]);
		assert!(started.iter().all(|(_, at)| at.duration_since(submitted) < Duration::from_millis(10)));
		assert_eq!(worker.in_flight(), 2);

		tokio::time::sleep(delay).await;
		assert_eq!(worker.in_flight(), 0);
	}
}
