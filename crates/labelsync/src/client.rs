// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    AnnotationClass, DatasetIdentifier, DatasetItem, Error, ImportReport, PushReport,
    RemoteDataset, Settings,
    api::{
        ClassListResult, CreateClassParams, CreateDatasetParams, DatasetRef, ImportParams,
        ItemID, ItemListResult, RegisterItem, RegisterParams, RegisterResult, SignUploadResult,
        TokenInfo,
    },
    format::ParseFn,
    remote::{DatasetService, RemoteSession},
    retry::create_retry_policy,
};
use log::{Level, debug, error, info, log_enabled, trace, warn};
use reqwest::{
    Body, RequestBuilder,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs::File, sync::mpsc::Sender};
use tokio_util::codec::{BytesCodec, FramedRead};

/// Maximum number of filenames per item lookup request.
const ITEM_LOOKUP_CHUNK: usize = 100;

/// Progress information for long-running operations.
///
/// ```rust
/// use labelsync::Progress;
///
/// let progress = Progress {
///     current: 25,
///     total: 100,
/// };
/// let percentage = (progress.current as f64 / progress.total as f64) * 100.0;
/// println!("Progress: {:.1}% ({}/{})", percentage, progress.current, progress.total);
/// ```
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current number of completed items.
    pub current: usize,
    /// Total number of items to process.
    pub total: usize,
}

/// HTTP client for the remote dataset service.
///
/// A fresh client is unauthenticated; [`with_api_key`][Self::with_api_key]
/// (or [`DatasetService::authenticate`]) returns an authenticated copy bound
/// to the key's team. Clones share the underlying connection pool.
///
/// # Examples
///
/// ```no_run
/// use labelsync::{Client, DatasetIdentifier, RemoteSession};
///
/// # async fn example() -> Result<(), labelsync::Error> {
/// let client = Client::new()?.with_api_key("my-api-key").await?;
/// println!("Team: {}", client.team());
///
/// let identifier = DatasetIdentifier::new(client.team(), "cats");
/// let dataset = client.get_remote_dataset(&identifier).await?;
/// println!("{} has {} images", dataset.name(), dataset.num_images());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    server: String,
    api_key: String,
    team: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.server)
            .field("team", &self.team)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl Client {
    /// Create an unauthenticated client configured from [`Settings::load`].
    pub fn new() -> Result<Self, Error> {
        Self::with_settings(&Settings::load()?)
    }

    /// Create an unauthenticated client from explicit settings.
    pub fn with_settings(settings: &Settings) -> Result<Self, Error> {
        debug!(
            "Client configuration - server={}, max_retries={}, timeout={}s",
            settings.server, settings.max_retries, settings.timeout
        );

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.timeout))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .retry(create_retry_policy(&settings.server, settings.max_retries))
            .build()?;

        Ok(Client {
            http,
            server: settings.server.clone(),
            api_key: String::new(),
            team: String::new(),
        })
    }

    /// Returns a new unauthenticated client talking to `server`.
    ///
    /// Any API key is dropped since keys are issued per server.
    pub fn with_server(&self, server: &str) -> Result<Self, Error> {
        let mut settings = Settings::load()?;
        settings.server = server.trim_end_matches('/').to_string();
        Self::with_settings(&settings)
    }

    /// Returns a new client authenticated with `api_key`.
    ///
    /// The key is checked against the server, which also reports the team
    /// it belongs to.
    pub async fn with_api_key(&self, api_key: &str) -> Result<Self, Error> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::EmptyApiKey);
        }

        let client = Client {
            api_key: api_key.to_owned(),
            team: String::new(),
            ..self.clone()
        };

        let info: TokenInfo = client.get("users/token_info").await?;
        debug!("Authenticated for team {}", info.selected_team.slug);

        Ok(Client {
            team: info.selected_team.slug,
            ..client
        })
    }

    /// Base URL of the server, without the `/api` suffix.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Team slug of the authenticated key, empty before authentication.
    pub fn team(&self) -> &str {
        &self.team
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.server, path.trim_start_matches('/'))
    }

    /// Lists the datasets visible to the authenticated team.
    pub async fn datasets(&self) -> Result<Vec<RemoteDataset>, Error> {
        self.get("datasets").await
    }

    /// Looks up dataset items by filename.
    ///
    /// Filenames without a matching item are simply absent from the result.
    pub async fn dataset_items(
        &self,
        dataset: &RemoteDataset,
        filenames: &[String],
    ) -> Result<Vec<DatasetItem>, Error> {
        let path = format!("datasets/{}/items", dataset.id());
        let mut items = Vec::with_capacity(filenames.len());

        for chunk in filenames.chunks(ITEM_LOOKUP_CHUNK) {
            let result: ItemListResult = self.send(self.items_request(&path, chunk)).await?;
            items.extend(result.items);
        }

        Ok(items)
    }

    /// One `filenames` query pair per name, so names containing commas are
    /// matched as written.
    fn items_request(&self, path: &str, filenames: &[String]) -> RequestBuilder {
        let query = filenames
            .iter()
            .map(|filename| ("filenames", filename.as_str()))
            .collect::<Vec<_>>();
        self.http.get(self.url(path)).query(&query)
    }

    /// Lists the annotation classes of the authenticated team.
    pub async fn annotation_classes(&self) -> Result<Vec<AnnotationClass>, Error> {
        let result: ClassListResult = self
            .get(&format!("teams/{}/annotation_classes", self.team))
            .await?;
        Ok(result.annotation_classes)
    }

    /// Creates a team annotation class of type `kind` and attaches it to
    /// `dataset`.
    pub async fn create_annotation_class(
        &self,
        dataset: &RemoteDataset,
        name: &str,
        kind: &str,
    ) -> Result<AnnotationClass, Error> {
        let params = CreateClassParams {
            name,
            annotation_types: vec![kind],
            datasets: vec![DatasetRef { id: dataset.id() }],
            team_slug: &self.team,
        };
        let class: AnnotationClass = self.post("annotation_classes", &params).await?;
        info!("Created annotation class '{}' ({})", name, kind);
        Ok(class)
    }

    pub(crate) async fn import_item(&self, item: ItemID, params: &ImportParams) -> Result<(), Error> {
        let req = self
            .http
            .post(self.url(&format!("dataset_items/{}/import", item)))
            .json(params);
        self.send_raw(req).await?;
        Ok(())
    }

    /// Registers `images` in `dataset` under the folder `path` and uploads
    /// each of them.
    ///
    /// Uploads run one after another. Entries that are not regular files are
    /// skipped with a warning.
    pub async fn push_images(
        &self,
        dataset: &RemoteDataset,
        images: &[PathBuf],
        path: &str,
    ) -> Result<PushReport, Error> {
        let mut report = PushReport::default();
        let mut by_name: HashMap<String, &PathBuf> = HashMap::new();

        for image in images {
            if !image.is_file() {
                warn!("Skipping {:?}: not a regular file", image);
                continue;
            }
            let filename = image
                .file_name()
                .ok_or_else(|| Error::InvalidArgument(format!("{:?} has no file name", image)))?
                .to_string_lossy()
                .into_owned();
            by_name.insert(filename, image);
        }

        if by_name.is_empty() {
            return Ok(report);
        }

        let params = RegisterParams {
            items: by_name
                .keys()
                .map(|filename| RegisterItem {
                    kind: "image",
                    filename: filename.clone(),
                    path,
                })
                .collect(),
        };
        let registered: RegisterResult = self
            .put(&format!("datasets/{}/data", dataset.id()), &params)
            .await?;

        for blocked in registered.blocked_items {
            warn!("Image {} was blocked: {}", blocked.filename, blocked.reason);
            report.blocked.push((blocked.filename, blocked.reason));
        }

        for item in registered.items {
            let local = by_name
                .get(&item.filename)
                .ok_or(Error::InvalidResponse)?;

            let sign: SignUploadResult = self
                .get(&format!("dataset_images/{}/sign_upload", item.dataset_item_id))
                .await?;
            upload_file(&self.http, &sign.upload_url, local).await?;

            let req = self.http.put(self.url(&format!(
                "dataset_images/{}/confirm_upload",
                item.dataset_item_id
            )));
            self.send_raw(req).await?;

            debug!("Uploaded {:?} as item {}", local, item.dataset_item_id);
            report.uploaded += 1;
        }

        Ok(report)
    }

    async fn get<RpcResult>(&self, path: &str) -> Result<RpcResult, Error>
    where
        RpcResult: DeserializeOwned,
    {
        let req = self.http.get(self.url(path));
        self.send(req).await
    }

    async fn post<Params, RpcResult>(&self, path: &str, params: &Params) -> Result<RpcResult, Error>
    where
        Params: Serialize,
        RpcResult: DeserializeOwned,
    {
        if log_enabled!(Level::Trace) {
            trace!(
                "POST {}: {}",
                path,
                serde_json::ser::to_string_pretty(params)?
            );
        }
        let req = self.http.post(self.url(path)).json(params);
        self.send(req).await
    }

    async fn put<Params, RpcResult>(&self, path: &str, params: &Params) -> Result<RpcResult, Error>
    where
        Params: Serialize,
        RpcResult: DeserializeOwned,
    {
        if log_enabled!(Level::Trace) {
            trace!("PUT {}: {}", path, serde_json::ser::to_string_pretty(params)?);
        }
        let req = self.http.put(self.url(path)).json(params);
        self.send(req).await
    }

    async fn send<RpcResult>(&self, req: RequestBuilder) -> Result<RpcResult, Error>
    where
        RpcResult: DeserializeOwned,
    {
        let body = self.send_raw(req).await?;
        match serde_json::from_slice(&body) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!("Invalid JSON Response: {}", String::from_utf8_lossy(&body));
                Err(err.into())
            }
        }
    }

    /// Sends an authenticated request and returns the body of a successful
    /// response.
    async fn send_raw(&self, req: RequestBuilder) -> Result<Vec<u8>, Error> {
        let res = req
            .header("Accept", "application/json")
            .header("User-Agent", "labelsync")
            .header("Authorization", format!("ApiKey {}", self.api_key))
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;

        if log_enabled!(Level::Trace) {
            trace!("Response [{}]: {}", status, String::from_utf8_lossy(&body));
        }

        check_status(status.as_u16(), &body)?;
        Ok(body.to_vec())
    }
}

/// Maps a response status to the crate error, `Ok` for any 2xx.
fn check_status(status: u16, body: &[u8]) -> Result<(), Error> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(Error::Unauthorized),
        code => Err(Error::StatusError(
            code,
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

/// Streams a file to a presigned URL with HTTP PUT.
async fn upload_file(http: &reqwest::Client, url: &str, path: &Path) -> Result<(), Error> {
    let mime = infer::get_from_path(path)?
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");

    let file = File::open(path).await?;
    let size = file.metadata().await?.len();
    let body = Body::wrap_stream(FramedRead::new(file, BytesCodec::new()));

    let resp = http
        .put(url)
        .header(CONTENT_LENGTH, size)
        .header(CONTENT_TYPE, mime)
        .body(body)
        .send()
        .await?;

    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(Error::StatusError(status, text))
    }
}

impl DatasetService for Client {
    type Session = Client;

    async fn authenticate(&self, api_key: &str) -> Result<Client, Error> {
        self.with_api_key(api_key).await
    }
}

impl RemoteSession for Client {
    fn default_team(&self) -> &str {
        &self.team
    }

    async fn create_dataset(&self, name: &str) -> Result<RemoteDataset, Error> {
        self.post("datasets", &CreateDatasetParams { name }).await
    }

    async fn get_remote_dataset(
        &self,
        identifier: &DatasetIdentifier,
    ) -> Result<RemoteDataset, Error> {
        self.datasets()
            .await?
            .into_iter()
            .find(|dataset| dataset.matches(identifier))
            .ok_or_else(|| Error::DatasetNotFound(identifier.to_string()))
    }

    async fn push(
        &self,
        dataset: &RemoteDataset,
        images: &[PathBuf],
        path: &str,
    ) -> Result<PushReport, Error> {
        self.push_images(dataset, images, path).await
    }

    async fn import_annotations(
        &self,
        dataset: &RemoteDataset,
        parser: ParseFn,
        files: &[PathBuf],
        append: bool,
        progress: Option<Sender<crate::Progress>>,
    ) -> Result<ImportReport, Error> {
        self.import_files(dataset, parser, files, append, progress)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &str) -> Client {
        let settings = Settings {
            server: server.to_string(),
            ..Settings::default()
        };
        Client::with_settings(&settings).unwrap()
    }

    #[test]
    fn test_url() {
        let client = client("http://localhost:8080");
        assert_eq!(
            client.url("datasets/3/items"),
            "http://localhost:8080/api/datasets/3/items"
        );
        assert_eq!(
            client.url("/users/token_info"),
            "http://localhost:8080/api/users/token_info"
        );
        assert_eq!(client.team(), "");
    }

    #[test]
    fn test_items_request_repeats_filenames() {
        let client = client("http://localhost:8080");
        let filenames = vec!["a,b.jpg".to_string(), "c.jpg".to_string()];
        let req = client
            .items_request("datasets/3/items", &filenames)
            .build()
            .unwrap();

        let pairs = req.url().query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("filenames".to_string(), "a,b.jpg".to_string()),
                ("filenames".to_string(), "c.jpg".to_string()),
            ]
        );
        assert_eq!(req.url().path(), "/api/datasets/3/items");
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200, b"{}").is_ok());
        assert!(check_status(204, b"").is_ok());
        assert!(matches!(check_status(401, b""), Err(Error::Unauthorized)));
        assert!(matches!(check_status(403, b""), Err(Error::Unauthorized)));

        let err = check_status(422, br#"{"errors":{"name":["has already been taken"]}}"#)
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("already been taken"));

        assert!(matches!(
            check_status(500, b"oops"),
            Err(Error::StatusError(500, ref body)) if body == "oops"
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = Client {
            api_key: "secret".to_string(),
            ..client("http://localhost:8080")
        };
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("has_api_key: true"));
    }

    #[tokio::test]
    async fn test_empty_api_key() {
        let client = client("http://localhost:8080");
        assert!(matches!(
            client.with_api_key("  ").await,
            Err(Error::EmptyApiKey)
        ));
        assert!(matches!(
            client.authenticate("").await,
            Err(Error::EmptyApiKey)
        ));
    }
}
