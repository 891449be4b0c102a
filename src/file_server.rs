use std::path::Path as FsPath;

use axum::{
	body::Body,
	extract::{Path, State},
	http::header,
	response::{IntoResponse, Response},
};
use hyper::StatusCode;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
	error::{AppError, AppResult},
	state::AppState,
	vehicles::upload::{safe_segment, vehicle_dir},
};

fn content_type(file: &str) -> &'static str {
	match FsPath::new(file).extension().and_then(|e| e.to_str()) {
		Some("png") => "image/png",
		Some("jpg") | Some("jpeg") => "image/jpeg",
		Some("webp") => "image/webp",
		Some("gif") => "image/gif",
		_ => "application/octet-stream",
	}
}

/// Streams `<upload_dir>/vehicles/<vehicle_id>/<file>`.
pub async fn vehicle_image(
	State(state): State<AppState>,
	Path((vehicle_id, file)): Path<(Uuid, String)>,
) -> AppResult<Response> {
	let file = safe_segment(&file)?;
	let path = vehicle_dir(&state.settings.server.upload_dir, vehicle_id).join(file);

	match read_file_stream(&path).await {
		Some(stream) => {
			Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type(file))], Body::from_stream(stream)).into_response())
		}
		None => Err(AppError::not_found("image")),
	}
}

pub async fn read_file_stream(path: &FsPath) -> Option<ReaderStream<File>> {
	File::open(path).await.map(ReaderStream::new).ok()
}
