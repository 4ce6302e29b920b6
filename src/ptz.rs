use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

use crate::command::PtzParameters;


pub const PAN_RANGE: AxisRange = AxisRange { min: -180.0, max: 180.0 };
pub const TILT_RANGE: AxisRange = AxisRange { min: -45.0, max: 45.0 };
pub const ZOOM_RANGE: AxisRange = AxisRange { min: 1.0, max: 5.0 };

pub const PAN_STEP: f32 = 10.0;
pub const TILT_STEP: f32 = 5.0;
pub const ZOOM_STEP: f32 = 0.5;

const DRIVEN_AXIS_SPEED: f32 = 0.6;
const IDLE_AXIS_SPEED: f32 = 0.5;


#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct AxisRange {
	pub min: f32,
	pub max: f32,
}

impl AxisRange {
	pub fn clamp(self, value: f32) -> f32 {
		value.clamp(self.min, self.max)
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Axis {
	Pan,
	Tilt,
	Zoom,
}

impl Axis {
	pub fn range(self) -> AxisRange {
		match self {
			Axis::Pan => PAN_RANGE,
			Axis::Tilt => TILT_RANGE,
			Axis::Zoom => ZOOM_RANGE,
		}
	}

	pub fn step(self) -> f32 {
		match self {
			Axis::Pan => PAN_STEP,
			Axis::Tilt => TILT_STEP,
			Axis::Zoom => ZOOM_STEP,
		}
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Direction {
	Negative,
	Positive,
}

impl Direction {
	pub fn sign(self) -> f32 {
		match self {
			Direction::Negative => -1.0,
			Direction::Positive => 1.0,
		}
	}
}

/// A single press-and-hold button on the camera page.
///
/// Each control drives exactly one axis in one direction. The arm buttons
/// move the tilt axis since the control service has no dedicated arm command.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Control {
	PanLeft,
	PanRight,
	TiltUp,
	TiltDown,
	ZoomIn,
	ZoomOut,
	ArmUp,
	ArmDown,
}

pub const PTZ_CONTROLS: [Control; 6] = [
	Control::PanLeft,
	Control::PanRight,
	Control::TiltUp,
	Control::TiltDown,
	Control::ZoomIn,
	Control::ZoomOut,
];

pub const ARM_CONTROLS: [Control; 2] = [Control::ArmUp, Control::ArmDown];

impl Control {
	pub fn axis(self) -> Axis {
		match self {
			Control::PanLeft | Control::PanRight => Axis::Pan,
			Control::TiltUp | Control::TiltDown | Control::ArmUp | Control::ArmDown => Axis::Tilt,
			Control::ZoomIn | Control::ZoomOut => Axis::Zoom,
		}
	}

	pub fn direction(self) -> Direction {
		match self {
			Control::PanRight | Control::TiltUp | Control::ZoomIn | Control::ArmUp => Direction::Positive,
			Control::PanLeft | Control::TiltDown | Control::ZoomOut | Control::ArmDown => Direction::Negative,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Control::PanLeft => "pan-left",
			Control::PanRight => "pan-right",
			Control::TiltUp => "tilt-up",
			Control::TiltDown => "tilt-down",
			Control::ZoomIn => "zoom-in",
			Control::ZoomOut => "zoom-out",
			Control::ArmUp => "arm-up",
			Control::ArmDown => "arm-down",
		}
	}
}

impl fmt::Display for Control {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Control {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PTZ_CONTROLS.iter()
			.chain(ARM_CONTROLS.iter())
			.copied()
			.find(|control| control.as_str() == s)
			.ok_or_else(|| anyhow!("unknown control: {}", s))
	}
}

/// Absolute framing the dashboard believes the camera is heading to.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct PtzTarget {
	pub pan: f32,
	pub tilt: f32,
	pub zoom: f32,
}

impl Default for PtzTarget {
	fn default() -> Self {
		Self {
			pan: 0.0,
			tilt: 0.0,
			zoom: ZOOM_RANGE.min,
		}
	}
}

impl PtzTarget {
	fn get_mut(&mut self, axis: Axis) -> &mut f32 {
		match axis {
			Axis::Pan => &mut self.pan,
			Axis::Tilt => &mut self.tilt,
			Axis::Zoom => &mut self.zoom,
		}
	}

	/// Moves one axis by its fixed step, clamped to the legal range.
	pub fn nudge(&mut self, axis: Axis, direction: Direction) -> f32 {
		let value = self.get_mut(axis);
		*value = axis.range().clamp(*value + direction.sign() * axis.step());
		*value
	}

	pub fn absolute_parameters(&self, driven: Axis) -> PtzParameters {
		let speed = |axis: Axis| if axis == driven { DRIVEN_AXIS_SPEED } else { IDLE_AXIS_SPEED };
		PtzParameters {
			pan: self.pan,
			tilt: self.tilt,
			zoom: self.zoom,
			pan_speed: speed(Axis::Pan),
			tilt_speed: speed(Axis::Tilt),
			zoom_speed: speed(Axis::Zoom),
		}
	}
}

/// Signed speed on one axis, zero elsewhere. Speeds stay within [-1, 1].
pub fn velocity_parameters(axis: Axis, direction: Direction, speed: f32) -> PtzParameters {
	let signed = direction.sign() * speed.abs().min(1.0);
	let mut parameters = PtzParameters::default();
	match axis {
		Axis::Pan => parameters.pan_speed = signed,
		Axis::Tilt => parameters.tilt_speed = signed,
		Axis::Zoom => parameters.zoom_speed = signed,
	}
	parameters
}
