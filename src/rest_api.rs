use std::collections::HashMap;

use tokio::sync::RwLock;

use rocket::http::Status;
use rocket::request::FromParam;
use rocket::response::Redirect;
use rocket::serde::json::{json, Json, Value};
use rocket::State;

use log::info;

use crate::common::{CameraId, ModeOverrides};
use crate::dashboard::{CameraLookup, Dashboard};
use crate::dispatcher::{ControlPanel, PanelStatus, ReleaseKind};
use crate::ptz::Control;
use crate::views::{CameraPage, DashboardContent, ErrorView, MonitorContent, ViewState};


pub type PanelMap = HashMap<CameraId, ControlPanel>;


impl<'a> FromParam<'a> for Control {
	type Error = &'a str;

	fn from_param(param: &'a str) -> Result<Self, Self::Error> {
		param.parse().map_err(|_| param)
	}
}

#[derive(Responder)]
enum CameraResponse {
	Found(Json<CameraPage>),
	Redirect(Redirect),
	#[response(status = 404)]
	NotFound(Json<ErrorView>),
	#[response(status = 502)]
	Failed(Json<ErrorView>),
}


#[get("/dashboard")]
async fn get_dashboard(dashboard: &State<Dashboard>, modes_state: &State<RwLock<ModeOverrides>>) -> Json<ViewState<DashboardContent>> {
	let overrides = modes_state.read().await.clone();
	Json(dashboard.dashboard(&overrides).await)
}

#[get("/monitor")]
async fn get_monitor(dashboard: &State<Dashboard>, modes_state: &State<RwLock<ModeOverrides>>) -> Json<ViewState<MonitorContent>> {
	let overrides = modes_state.read().await.clone();
	Json(dashboard.monitor(&overrides).await)
}

/// Opening a camera page also mounts its control panel.
#[get("/cameras/<id>")]
async fn get_camera(
	id: &str,
	dashboard: &State<Dashboard>,
	modes_state: &State<RwLock<ModeOverrides>>,
	panels_state: &State<RwLock<PanelMap>>,
) -> CameraResponse {
	let overrides = modes_state.read().await.clone();
	match dashboard.camera(id, &overrides).await {
		CameraLookup::Found(page) => {
			let camera_id = page.camera.id.clone();
			let mut panels = panels_state.write().await;
			panels.entry(camera_id.clone()).or_insert_with(|| dashboard.new_panel(&camera_id));
			CameraResponse::Found(Json(page))
		},
		CameraLookup::Redirect(target) => CameraResponse::Redirect(Redirect::to(format!("/v0/cameras/{}", target))),
		CameraLookup::NotFound(view) => CameraResponse::NotFound(Json(view)),
		CameraLookup::Failed(view) => CameraResponse::Failed(Json(view)),
	}
}

/// Flips the displayed mode. The change is never sent to the camera.
#[post("/cameras/<id>/mode")]
async fn toggle_mode(
	id: &str,
	dashboard: &State<Dashboard>,
	modes_state: &State<RwLock<ModeOverrides>>,
) -> Result<Json<Value>, (Status, Json<ErrorView>)> {
	let overrides = modes_state.read().await.clone();
	match dashboard.displayed_mode(id, &overrides).await {
		Ok(Some((camera_id, mode))) => {
			let next = mode.toggled();
			modes_state.write().await.insert(camera_id.clone(), next);
			info!("Camera {} now displayed as {:?} (local only)", camera_id, next);
			Ok(Json(json!({ "cameraId": camera_id, "mode": next })))
		},
		Ok(None) => Err((Status::NotFound, Json(ErrorView::camera_not_found(id)))),
		Err(err) => Err((Status::BadGateway, Json(ErrorView::new(format!("{:#}", err))))),
	}
}

/// Controls only exist on a panel mounted by opening the camera page, keyed
/// by the camera id the directory reported.
#[post("/cameras/<id>/controls/<control>/press")]
async fn press_control(id: &str, control: Control, panels_state: &State<RwLock<PanelMap>>) -> Result<Json<PanelStatus>, Status> {
	let mut panels = panels_state.write().await;
	let panel = panels.get_mut(id).ok_or(Status::NotFound)?;
	panel.press(control);
	Ok(Json(panel.status()))
}

#[post("/cameras/<id>/controls/<control>/release?<reason>")]
async fn release_control(
	id: &str,
	control: Control,
	reason: Option<&str>,
	panels_state: &State<RwLock<PanelMap>>,
) -> Result<Json<PanelStatus>, Status> {
	let kind: ReleaseKind = match reason {
		Some(reason) => reason.parse().map_err(|_| Status::BadRequest)?,
		None => ReleaseKind::PointerUp,
	};
	let mut panels = panels_state.write().await;
	let panel = panels.get_mut(id).ok_or(Status::NotFound)?;
	panel.release(control, kind);
	Ok(Json(panel.status()))
}

/// Pointer released anywhere in the window.
#[post("/cameras/<id>/release")]
async fn release_all(id: &str, panels_state: &State<RwLock<PanelMap>>) -> Result<Json<PanelStatus>, Status> {
	let mut panels = panels_state.write().await;
	let panel = panels.get_mut(id).ok_or(Status::NotFound)?;
	panel.release_all(ReleaseKind::WindowPointerUp);
	Ok(Json(panel.status()))
}

#[get("/cameras/<id>/panel")]
async fn get_panel(id: &str, panels_state: &State<RwLock<PanelMap>>) -> Option<Json<PanelStatus>> {
	let panels = panels_state.read().await;
	panels.get(id).map(|panel| {
		Json(panel.status())
	})
}

#[delete("/cameras/<id>/panel")]
async fn unmount_panel(id: &str, panels_state: &State<RwLock<PanelMap>>) -> Status {
	let removed = panels_state.write().await.remove(id);
	match removed {
		Some(_) => Status::NoContent,
		None => Status::NotFound,
	}
}

#[catch(404)]
fn not_found() -> Value {
	json!({
		"status": "error",
		"reason": "Resource was not found."
	})
}



pub fn stage(dashboard: Dashboard) -> rocket::fairing::AdHoc {
	// tokio::sync::RwLock so a panel or override can be held across awaits
	// without blocking the executor.
	let panels_lock = RwLock::new(PanelMap::new());
	let modes_lock = RwLock::new(ModeOverrides::new());

	rocket::fairing::AdHoc::on_ignite("Dashboard", move |rocket| async move {
		rocket
			.manage(dashboard)
			.manage(panels_lock)
			.manage(modes_lock)
			.register("/", catchers![not_found])
			.mount("/v0", routes![
				get_dashboard,
				get_monitor,
				get_camera,
				toggle_mode,
				press_control,
				release_control,
				release_all,
				get_panel,
				unmount_panel,
			])
	})
}
