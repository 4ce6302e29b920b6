use std::io::Cursor;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Method, Status};
use rocket::{Request, Response};


const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";


/// Lets the dashboard page, served from another origin, call this service.
///
/// No route handles OPTIONS, so preflight requests are answered here.
pub struct Cors {
	allow_origin: String,
}

impl Cors {
	pub fn new(allow_origin: &str) -> Self {
		Self { allow_origin: allow_origin.to_string() }
	}
}

#[rocket::async_trait]
impl Fairing for Cors {
	fn info(&self) -> Info {
		Info {
			name: "Dashboard CORS",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", self.allow_origin.clone()));
		response.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
		response.set_header(Header::new("Access-Control-Allow-Headers", ALLOWED_HEADERS));
		if self.allow_origin != "*" {
			response.set_header(Header::new("Vary", "Origin"));
		}

		let status = response.status();
		let unrouted = status == Status::NotFound || status == Status::MethodNotAllowed;
		if request.method() == Method::Options && unrouted {
			response.set_status(Status::NoContent);
			response.set_sized_body(0, Cursor::new(""));
		}
	}
}



#[cfg(test)]
mod tests {
	use rocket::local::asynchronous::Client;

	use super::*;

	#[get("/ping")]
	fn ping() -> &'static str {
		"pong"
	}

	async fn client(allow_origin: &str) -> Client {
		let rocket = rocket::build()
			.mount("/", routes![ping])
			.attach(Cors::new(allow_origin));
		Client::tracked(rocket).await.expect("valid rocket instance")
	}

	#[rocket::async_test]
	async fn responses_carry_the_configured_origin() {
		let client = client("http://ui.local:5173").await;
		let response = client.get("/ping").dispatch().await;
		assert_eq!(response.status(), Status::Ok);
		assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("http://ui.local:5173"));
		assert_eq!(response.headers().get_one("Vary"), Some("Origin"));
		assert!(response.headers().get_one("Access-Control-Allow-Methods").is_some_and(|methods| methods.contains("DELETE")));
	}

	#[rocket::async_test]
	async fn preflight_is_answered_without_a_route() {
		let client = client("*").await;
		let response = client.options("/ping").dispatch().await;
		assert_eq!(response.status(), Status::NoContent);
		assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("*"));
		assert!(response.headers().get_one("Vary").is_none());
	}

	#[rocket::async_test]
	async fn unknown_routes_stay_not_found() {
		let client = client("*").await;
		let response = client.get("/nowhere").dispatch().await;
		assert_eq!(response.status(), Status::NotFound);
	}
}
