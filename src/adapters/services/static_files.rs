use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use eyre::WrapErr;
use http::{HeaderValue, header};

use crate::{
    core::{ServiceRequest, ServiceResponse, route_key},
    ports::Service,
};

/// Serves files from `root` for `/<name>/<relative path>`.
pub struct StaticFileService {
    names: Vec<String>,
    root: PathBuf,
    index_file: String,
}

impl StaticFileService {
    pub fn new(names: Vec<String>, root: PathBuf, index_file: String) -> Self {
        Self {
            names,
            root,
            index_file,
        }
    }

    /// Map the part of the request path after the route name onto a file
    /// below `root`. `None` when the path tries to leave `root`.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let key_len = route_key(path).map_or(0, str::len);
        let relative = path.get(1 + key_len..).unwrap_or("").trim_start_matches('/');

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if relative.is_empty() || relative.ends_with('/') || resolved.is_dir() {
            resolved.push(&self.index_file);
        }
        Some(resolved)
    }
}

impl Service for StaticFileService {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn handle(&self, req: &ServiceRequest) -> eyre::Result<ServiceResponse> {
        let Some(file_path) = self.resolve(req.path()) else {
            tracing::warn!(path = %req.path(), "Rejected path outside static root");
            return Ok(ServiceResponse::not_found());
        };

        match std::fs::read(&file_path) {
            Ok(content) => Ok(ServiceResponse::new(content)
                .with_mimetype(mimetype_for(&file_path))
                .with_header(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=3600"),
                )),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(file = %file_path.display(), "Static file not found");
                Ok(ServiceResponse::not_found())
            }
            Err(e) => Err(e)
                .wrap_err_with(|| format!("Failed to read static file {}", file_path.display())),
        }
    }
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn mimetype_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") | Some("geojson") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("webp") => "image/webp",
        Some("kml") => "application/vnd.google-earth.kml+xml",
        Some("pbf") | Some("mvt") => "application/vnd.mapbox-vector-tile",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use http::StatusCode;
    use tempfile::tempdir;

    use super::*;

    fn service(root: &Path) -> StaticFileService {
        StaticFileService::new(
            vec!["files".to_string()],
            root.to_path_buf(),
            "index.html".to_string(),
        )
    }

    fn get(service: &StaticFileService, path: &str) -> ServiceResponse {
        service
            .handle(&ServiceRequest::get(path).unwrap())
            .unwrap()
    }

    #[test]
    fn test_serves_file_below_route_name() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("tiles")).unwrap();
        fs::write(dir.path().join("tiles/0.png"), b"png-bytes").unwrap();

        let resp = get(&service(dir.path()), "/files/tiles/0.png");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.mimetype(), Some("image/png"));
        assert_eq!(resp.body().as_ref(), b"png-bytes");
    }

    #[test]
    fn test_directory_serves_index() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), b"<html/>").unwrap();

        let svc = service(dir.path());
        for path in ["/files", "/files/", "/files/."] {
            let resp = get(&svc, path);
            assert_eq!(resp.body().as_ref(), b"<html/>", "path {path:?}");
            assert_eq!(resp.mimetype(), Some("text/html"));
        }
    }

    #[test]
    fn test_missing_file_is_404() {
        let dir = tempdir().unwrap();
        let resp = get(&service(dir.path()), "/files/nope.txt");
        assert_eq!(resp, ServiceResponse::not_found());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let resp = get(&service(&root), "/files/../secret.txt");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = get(&service(&root), "/files/%2E%2E/secret.txt");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_mimetype_for() {
        assert_eq!(mimetype_for(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mimetype_for(Path::new("doc.kml")), "application/vnd.google-earth.kml+xml");
        assert_eq!(mimetype_for(Path::new("noext")), "application/octet-stream");
    }
}
