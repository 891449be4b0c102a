use axum::{
	extract::DefaultBodyLimit,
	routing::{get, post, put},
	Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::{
	admin, auth, file_server, payment_gateway, rentals, state::AppState, terms, users, vehicles, vendors,
};

async fn health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

pub fn app(state: AppState) -> Router {
	let max_upload = state.settings.server.max_upload_bytes;

	let auth = Router::new()
		.route("/register", post(auth::handlers::register))
		.route("/login", post(auth::handlers::login))
		.route("/me", get(auth::handlers::me));

	let users = Router::new()
		.route("/", get(users::handlers::list_users))
		.route("/me", put(users::handlers::update_profile))
		.route("/:id", get(users::handlers::get_user).delete(users::handlers::delete_user))
		.route("/:id/role", put(users::handlers::change_role));

	let vendors = Router::new()
		.route("/", get(vendors::handlers::list_vendors))
		.route("/apply", post(vendors::handlers::apply))
		.route("/me", get(vendors::handlers::my_vendor))
		.route("/:id", get(vendors::handlers::get_vendor))
		.route("/:id/approval", put(vendors::handlers::decide));

	let vehicles = Router::new()
		.route("/", get(vehicles::handlers::list_public).post(vehicles::handlers::create))
		.route("/mine", get(vehicles::handlers::mine))
		.route("/admin", get(vehicles::handlers::admin_list))
		.route("/images/:vehicle_id/:file", get(file_server::vehicle_image))
		.route(
			"/:id",
			get(vehicles::handlers::get_vehicle)
				.put(vehicles::handlers::update)
				.delete(vehicles::handlers::delete),
		)
		.route(
			"/:id/images",
			post(vehicles::handlers::upload_images).layer(DefaultBodyLimit::max(max_upload)),
		)
		.route("/:id/approval", put(vehicles::handlers::decide));

	let rentals = Router::new()
		.route("/", get(rentals::handlers::list_all).post(rentals::handlers::create))
		.route("/availability", get(rentals::handlers::check_availability))
		.route("/mine", get(rentals::handlers::mine))
		.route("/vendor", get(rentals::handlers::for_vendor))
		.route("/:id", get(rentals::handlers::get_rental))
		.route("/:id/status", put(rentals::handlers::update_status));

	let payments = Router::new()
		.route("/", get(payment_gateway::handlers::list_all))
		.route("/mine", get(payment_gateway::handlers::mine))
		.route("/esewa/initiate", post(payment_gateway::handlers::initiate))
		.route("/esewa/success", get(payment_gateway::handlers::success))
		.route("/esewa/failure", get(payment_gateway::handlers::failure))
		.route("/:id/verify", post(payment_gateway::handlers::verify));

	Router::new()
		.route("/health", get(health))
		.nest("/auth", auth)
		.nest("/users", users)
		.nest("/vendors", vendors)
		.nest("/vehicles", vehicles)
		.nest("/rentals", rentals)
		.nest("/payments", payments)
		.route("/terms", get(terms::get_terms).put(terms::update_terms))
		.route("/admin/stats", get(admin::stats))
		.layer(CorsLayer::permissive())
		.with_state(state)
}
