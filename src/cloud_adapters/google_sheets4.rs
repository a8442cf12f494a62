use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Method;
use hyper::Request;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tracing::{debug, info};
use url::Url;
use yup_oauth2::hyper_rustls::HttpsConnectorBuilder;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

/// OAuth scope needed for reading and writing spreadsheet values.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Asynchronous token retrieval interface used by the adapter.
pub trait TokenProvider: Send + Sync + 'static {
    fn token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, SpreadsheetError>> + Send + 'a>>;
}

impl TokenProvider for yup_oauth2::authenticator::DefaultAuthenticator {
    fn token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, SpreadsheetError>> + Send + 'a>> {
        Box::pin(async move {
            self.token(scopes)
                .await
                .map_err(|e| SpreadsheetError::Transient(e.to_string()))?
                .token()
                .map(|t| t.to_string())
                .ok_or_else(|| SpreadsheetError::Transient("missing token".into()))
        })
    }
}

/// Builds an installed-flow authenticator whose tokens are cached in
/// `token_cache`. The browser consent step only runs when no usable token is
/// cached.
pub async fn installed_flow_authenticator(
    credentials_path: &Path,
    token_cache: &Path,
) -> Result<yup_oauth2::authenticator::DefaultAuthenticator, SpreadsheetError> {
    if !credentials_path.exists() {
        return Err(SpreadsheetError::Permanent(format!(
            "credentials file {} was not found",
            credentials_path.display()
        )));
    }
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
    InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(token_cache)
        .build()
        .await
        .map_err(|e| SpreadsheetError::Permanent(e.to_string()))
}

/// Runs the consent flow once and stores the resulting token.
pub async fn initial_oauth_login(
    credentials_path: &Path,
    token_cache: &Path,
) -> Result<(), SpreadsheetError> {
    let auth = installed_flow_authenticator(credentials_path, token_cache).await?;
    TokenProvider::token(&auth, &[SPREADSHEETS_SCOPE]).await?;
    info!(cache = %token_cache.display(), "Stored OAuth token");
    Ok(())
}

/// Adapter backed by the Google Sheets REST API.
///
/// One adapter is bound to one spreadsheet; sheet names passed to the
/// [`CloudSpreadsheetService`] methods are the tabs of that spreadsheet.
pub struct GoogleSheets4Adapter {
    client: Client<yup_oauth2::hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>,
    auth: Box<dyn TokenProvider>,
    rt: Option<tokio::runtime::Runtime>,
    sheets_base_url: String,
    spreadsheet_id: String,
}

impl GoogleSheets4Adapter {
    /// Create a new adapter using the default API endpoint.
    pub fn new<A: TokenProvider>(
        auth: A,
        spreadsheet_id: impl Into<String>,
    ) -> Result<Self, SpreadsheetError> {
        Self::with_base_url(auth, "https://sheets.googleapis.com/v4/", spreadsheet_id)
    }

    /// Create an adapter with a custom Sheets base URL.
    pub fn with_base_url<A: TokenProvider>(
        auth: A,
        sheets_base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Result<Self, SpreadsheetError> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SpreadsheetError::Permanent(format!("tokio runtime: {e}")))?;
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| SpreadsheetError::Permanent(format!("native roots: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        Ok(Self {
            client,
            auth: Box::new(auth),
            rt: Some(rt),
            sheets_base_url: sheets_base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
        })
    }

    fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, SpreadsheetError>>,
    ) -> Result<T, SpreadsheetError> {
        match &self.rt {
            Some(rt) => rt.block_on(fut),
            None => Err(SpreadsheetError::Permanent(
                "adapter runtime was shut down".into(),
            )),
        }
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SpreadsheetError> {
        self.build_url(&self.spreadsheet_id, segments, query)
    }

    /// Builds `{base}spreadsheets/{id}/{segments...}` with each segment
    /// percent-encoded.
    fn build_url(
        &self,
        id_segment: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, SpreadsheetError> {
        let mut url = Url::parse(&self.sheets_base_url)
            .map_err(|e| SpreadsheetError::Permanent(format!("invalid base url: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SpreadsheetError::Permanent("base url cannot be a base".into()))?;
            path.pop_if_empty().push("spreadsheets").push(id_segment);
            for segment in segments {
                path.push(segment);
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, SpreadsheetError> {
        let token = self.auth.token(&[SPREADSHEETS_SCOPE]).await?;
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let payload = match body {
            Some(json) => {
                debug!(%method, url = %url, body = %json, "Sheets request");
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Full::from(Bytes::from(json.to_string()))
            }
            None => {
                debug!(%method, url = %url, "Sheets request");
                Full::new(Bytes::new())
            }
        };
        let req = builder
            .body(payload)
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?
            .to_bytes();
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes[..]).map_err(|e| SpreadsheetError::Transient(e.to_string()))
    }

    /// Looks up the numeric sheet id of the tab called `title`.
    async fn sheet_gid(&self, title: &str) -> Result<Option<i64>, SpreadsheetError> {
        let url = self.url(&[], &[("fields", "sheets.properties")])?;
        let body = self.send(Method::GET, url, None).await?;
        Ok(body["sheets"].as_array().and_then(|sheets| {
            sheets
                .iter()
                .find(|s| s["properties"]["title"].as_str() == Some(title))
                .and_then(|s| s["properties"]["sheetId"].as_i64())
        }))
    }

    async fn existing_gid(&self, title: &str) -> Result<i64, SpreadsheetError> {
        self.sheet_gid(title)
            .await?
            .ok_or(SpreadsheetError::SheetNotFound)
    }

    async fn batch_update(&self, requests: Value) -> Result<(), SpreadsheetError> {
        let id_segment = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.build_url(&id_segment, &[], &[])?;
        self.send(Method::POST, url, Some(json!({ "requests": requests })))
            .await
            .map(|_| ())
    }

    async fn values(&self, range: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        let url = self.url(&["values", range], &[])?;
        let body = self.send(Method::GET, url, None).await?;
        let rows = body["values"].as_array().cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(cell_text).collect())
                    .unwrap_or_default()
            })
            .collect())
    }
}

impl Drop for GoogleSheets4Adapter {
    fn drop(&mut self) {
        // The adapter may be dropped from inside another runtime, where a
        // blocking shutdown would panic.
        if let Some(rt) = self.rt.take() {
            rt.shutdown_background();
        }
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> SpreadsheetError {
    let detail = String::from_utf8_lossy(body);
    if status == StatusCode::BAD_REQUEST && detail.contains("Unable to parse range") {
        return SpreadsheetError::SheetNotFound;
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SpreadsheetError::Transient(format!("status {status}"))
    } else {
        SpreadsheetError::Permanent(format!("status {status}"))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn rows_json(rows: Vec<Vec<String>>) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|r| r.into_iter().map(Value::String).collect())
        .collect()
}

impl CloudSpreadsheetService for GoogleSheets4Adapter {
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError> {
        self.run(async {
            if self.sheet_gid(title).await?.is_some() {
                return Ok(());
            }
            info!(title, "Creating sheet");
            self.batch_update(json!([{ "addSheet": { "properties": { "title": title } } }]))
                .await
        })
    }

    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError> {
        self.append_rows(sheet, vec![values])
    }

    fn append_rows(&mut self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SpreadsheetError> {
        self.run(async {
            let range = format!("{sheet}:append");
            let url = self.url(
                &["values", &range],
                &[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
            )?;
            let body = json!({ "majorDimension": "ROWS", "values": rows_json(rows) });
            self.send(Method::POST, url, Some(body)).await.map(|_| ())
        })
    }

    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        self.run(self.values(sheet))
    }

    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError> {
        self.run(async {
            let gid = self.existing_gid(sheet).await?;
            let len = self.values(sheet).await?.len();
            if index >= len {
                return Err(SpreadsheetError::RowNotFound);
            }
            info!(sheet, index, "Deleting row");
            self.batch_update(json!([{
                "deleteDimension": {
                    "range": {
                        "sheetId": gid,
                        "dimension": "ROWS",
                        "startIndex": index,
                        "endIndex": index + 1,
                    }
                }
            }]))
            .await
        })
    }

    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError> {
        self.run(async {
            let first = start + 1;
            let clear = format!("{sheet}!A{first}:ZZ:clear");
            let url = self.url(&["values", &clear], &[])?;
            self.send(Method::POST, url, Some(json!({}))).await?;
            if rows.is_empty() {
                return Ok(());
            }
            let range = format!("{sheet}!A{first}");
            let url = self.url(&["values", &range], &[("valueInputOption", "RAW")])?;
            let body = json!({ "range": range, "majorDimension": "ROWS", "values": rows_json(rows) });
            self.send(Method::PUT, url, Some(body)).await.map(|_| ())
        })
    }
}
