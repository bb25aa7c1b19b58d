// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The static site (§6 `GET /*`): an out-of-scope interface boundary per
//! §1 ("static frontend serving"), implemented as a single embedded-asset
//! lookup with an index-HTML fallback so `DISABLE_FRONTEND` is one flag
//! rather than a filesystem watcher.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "ui/dist/"]
struct Assets;

const INDEX: &str = "index.html";

/// Serves `path` from the embedded frontend bundle, falling back to
/// `index.html` for any path that isn't a known asset (client-side
/// routing) and finally to a 404 if even the fallback is missing.
pub fn serve(path: &str) -> Response {
    let path = path.trim_start_matches('/');
    if let Some(file) = Assets::get(path) {
        return asset_response(path, file.data);
    }
    if let Some(file) = Assets::get(INDEX) {
        return asset_response(INDEX, file.data);
    }
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn asset_response(path: &str, data: std::borrow::Cow<'static, [u8]>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    ([(header::CONTENT_TYPE, mime.as_ref().to_string())], data.into_owned()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_the_index_page_for_the_root_path() {
        let response = serve("");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn unknown_paths_fall_back_to_index_html() {
        let response = serve("some/client/route");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
