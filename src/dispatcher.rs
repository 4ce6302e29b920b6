use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Error};
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::command::{CommandSink, CommandType, CommandWorker, ControlCommand, PtzParameters, DEFAULT_COMMAND_TIMEOUT};
use crate::common::CameraId;
use crate::ptz::{velocity_parameters, Control, PtzTarget};


pub const REPEAT_INTERVAL: Duration = Duration::from_millis(200);
pub const CONTINUOUS_SPEED: f32 = 0.7;


/// How a held control turns into commands. Picked once per deployment.
#[derive(Clone, Copy, Default)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
	/// Step the absolute target immediately, then again on every repeat tick.
	Discrete,
	/// One velocity command on press, one stop on release.
	#[default]
	Continuous,
}

/// Everything that ends a gesture.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
pub enum ReleaseKind {
	PointerUp,
	PointerCancel,
	PointerLeave,
	WindowPointerUp,
	Repress,
	Unmount,
}

impl ReleaseKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ReleaseKind::PointerUp => "pointer-up",
			ReleaseKind::PointerCancel => "pointer-cancel",
			ReleaseKind::PointerLeave => "pointer-leave",
			ReleaseKind::WindowPointerUp => "window-pointer-up",
			ReleaseKind::Repress => "repress",
			ReleaseKind::Unmount => "unmount",
		}
	}
}

impl fmt::Display for ReleaseKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Only the per-control pointer reasons parse. Window pointer-up, repress and
/// unmount are raised by the panel itself, never named by a client.
impl FromStr for ReleaseKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pointer-up" => Ok(ReleaseKind::PointerUp),
			"pointer-cancel" => Ok(ReleaseKind::PointerCancel),
			"pointer-leave" => Ok(ReleaseKind::PointerLeave),
			_ => Err(anyhow!("unknown release reason: {}", s)),
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
pub struct DispatchSettings {
	pub mode: DispatchMode,
	pub repeat_interval: Duration,
	pub speed: f32,
	pub timeout: Duration,
}

impl Default for DispatchSettings {
	fn default() -> Self {
		Self {
			mode: DispatchMode::default(),
			repeat_interval: REPEAT_INTERVAL,
			speed: CONTINUOUS_SPEED,
			timeout: DEFAULT_COMMAND_TIMEOUT,
		}
	}
}


struct PanelShared {
	camera_id: CameraId,
	settings: DispatchSettings,
	target: Mutex<PtzTarget>,
	worker: CommandWorker,
}

impl PanelShared {
	fn send(&self, kind: CommandType, parameters: PtzParameters) {
		let command = ControlCommand::new(&self.camera_id, kind, parameters, self.settings.timeout);
		self.worker.submit(command);
	}

	/// Nudges the local target and sends it while the gesture is still held.
	/// The target keeps its new value whether or not the send succeeds.
	fn step(&self, control: Control, held: &AtomicBool) -> bool {
		let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
		if !held.load(Ordering::SeqCst) {
			return false;
		}
		target.nudge(control.axis(), control.direction());
		self.send(CommandType::PtzAbsolute, target.absolute_parameters(control.axis()));
		true
	}

	/// Once this returns no step of the gesture can be sent, even from a tick
	/// already running on another thread.
	fn end(&self, held: &AtomicBool) {
		let _target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
		held.store(false, Ordering::SeqCst);
	}

	fn target(&self) -> PtzTarget {
		*self.target.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// A held control. Dropping it stops the repeat timer.
struct Gesture {
	held: Arc<AtomicBool>,
	repeat: Option<JoinHandle<()>>,
}

impl Drop for Gesture {
	fn drop(&mut self) {
		if let Some(repeat) = self.repeat.take() {
			repeat.abort();
		}
	}
}

/// `Idle` when `gesture` is `None`, `Pressed` otherwise.
struct ControlDispatcher {
	control: Control,
	gesture: Option<Gesture>,
}

impl ControlDispatcher {
	fn new(control: Control) -> Self {
		Self { control, gesture: None }
	}

	fn press(&mut self, shared: &Arc<PanelShared>) {
		if self.gesture.is_some() {
			self.release(shared, ReleaseKind::Repress);
		}

		let held = Arc::new(AtomicBool::new(true));
		let repeat = match shared.settings.mode {
			DispatchMode::Discrete => {
				shared.step(self.control, &held);
				Some(spawn_repeat(Arc::clone(shared), self.control, Arc::clone(&held)))
			},
			DispatchMode::Continuous => {
				let parameters = velocity_parameters(self.control.axis(), self.control.direction(), shared.settings.speed);
				shared.send(CommandType::PtzContinuous, parameters);
				None
			}
		};
		debug!("{} pressed on camera {}", self.control, shared.camera_id);
		self.gesture = Some(Gesture { held, repeat });
	}

	/// Returns false when there was no gesture to end.
	fn release(&mut self, shared: &PanelShared, kind: ReleaseKind) -> bool {
		let Some(gesture) = self.gesture.take() else {
			return false;
		};
		shared.end(&gesture.held);
		drop(gesture);
		if shared.settings.mode == DispatchMode::Continuous {
			shared.send(CommandType::PtzStop, PtzParameters::default());
		}
		debug!("{} released on camera {} ({})", self.control, shared.camera_id, kind);
		true
	}

	fn is_pressed(&self) -> bool {
		self.gesture.is_some()
	}
}

fn spawn_repeat(shared: Arc<PanelShared>, control: Control, held: Arc<AtomicBool>) -> JoinHandle<()> {
	let period = shared.settings.repeat_interval;
	tokio::spawn(async move {
		let mut ticker = time::interval_at(Instant::now() + period, period);
		loop {
			ticker.tick().await;
			if !shared.step(control, &held) {
				break;
			}
		}
	})
}


#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelStatus {
	pub camera_id: CameraId,
	pub mode: DispatchMode,
	pub pressed: Vec<Control>,
	pub in_flight: usize,
	pub target: PtzTarget,
}

/// The controls of one mounted camera view.
///
/// The PTZ target belongs to the camera; each control owns its own timer.
/// Dropping the panel is the unmount: every held control is released.
pub struct ControlPanel {
	shared: Arc<PanelShared>,
	controls: HashMap<Control, ControlDispatcher>,
}

impl ControlPanel {
	/// Must be called from within a tokio runtime.
	pub fn new(camera_id: &str, settings: DispatchSettings, sink: Arc<dyn CommandSink>) -> Self {
		info!("Mounted {:?} control panel for camera {}", settings.mode, camera_id);
		let shared = PanelShared {
			camera_id: camera_id.to_string(),
			settings,
			target: Mutex::new(PtzTarget::default()),
			worker: CommandWorker::spawn(sink),
		};
		Self {
			shared: Arc::new(shared),
			controls: HashMap::new(),
		}
	}

	pub fn press(&mut self, control: Control) {
		self.controls
			.entry(control)
			.or_insert_with(|| ControlDispatcher::new(control))
			.press(&self.shared);
	}

	pub fn release(&mut self, control: Control, kind: ReleaseKind) -> bool {
		match self.controls.get_mut(&control) {
			Some(dispatcher) => dispatcher.release(&self.shared, kind),
			None => false,
		}
	}

	/// Ends every held gesture; the window-level pointer-up path.
	pub fn release_all(&mut self, kind: ReleaseKind) -> usize {
		let shared = &self.shared;
		self.controls
			.values_mut()
			.map(|dispatcher| dispatcher.release(shared, kind))
			.filter(|released| *released)
			.count()
	}

	pub fn pressed(&self) -> Vec<Control> {
		let mut pressed: Vec<Control> = self.controls
			.values()
			.filter(|dispatcher| dispatcher.is_pressed())
			.map(|dispatcher| dispatcher.control)
			.collect();
		pressed.sort_by_key(|control| control.as_str());
		pressed
	}

	pub fn target(&self) -> PtzTarget {
		self.shared.target()
	}

	pub fn status(&self) -> PanelStatus {
		PanelStatus {
			camera_id: self.shared.camera_id.clone(),
			mode: self.shared.settings.mode,
			pressed: self.pressed(),
			in_flight: self.shared.worker.in_flight(),
			target: self.target(),
		}
	}
}

impl Drop for ControlPanel {
	fn drop(&mut self) {
		let released = self.release_all(ReleaseKind::Unmount);
		info!("Unmounted control panel for camera {} ({} held controls released)", self.shared.camera_id, released);
	}
}
