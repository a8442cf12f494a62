//! Request gateway: maps parameter-encoded requests onto the record store and
//! answers with a JSON envelope `{status, message?, data?}`.
//!
//! Failures never escape as transport errors. Every outcome, including an
//! unexpected store fault, is rendered as an envelope; internal fault text is
//! logged but replaced with a generic message in the response.

pub mod server;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{error, info_span, warn};
use uuid::Uuid;

use crate::cloud_adapters::CloudSpreadsheetService;
use crate::core::{LedgerError, Record, RecordStore, Table, auth};

/// Flat request parameters, query string and form body merged.
pub type Params = HashMap<String, String>;

/// Headers attached to every response, preflight included.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, DELETE, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Accept"),
    ("access-control-max-age", "86400"),
];

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const JSONP_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
const MAX_CALLBACK_LEN: usize = 128;

/// Transport method a request arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Delete,
}

impl RequestMethod {
    /// Action implied by the method when no `action` parameter is given.
    fn default_action(self) -> Option<&'static str> {
        match self {
            RequestMethod::Get => None,
            RequestMethod::Post => Some("add"),
            RequestMethod::Delete => Some("delete"),
        }
    }
}

/// Per-request state handed to the gateway. Nothing survives between
/// requests except what the store holds.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub method: RequestMethod,
}

impl RequestContext {
    pub fn new(method: RequestMethod) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Response body shared by every action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn ok(message: Option<&str>, data: Option<Value>) -> Self {
        Self {
            status: Status::Ok,
            message: message.map(str::to_string),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// A rendered response. `content_type` is `None` for preflight answers,
/// which carry an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl Response {
    pub fn preflight() -> Self {
        Self {
            content_type: None,
            body: String::new(),
        }
    }
}

/// Serializes `envelope`, wrapped as `callback(json)` when a JSONP callback
/// is requested. Callback names must look like a JavaScript identifier path;
/// anything else is refused with a plain JSON error.
pub fn render(envelope: &Envelope, callback: Option<&str>) -> Response {
    let callback = callback.map(str::trim).filter(|c| !c.is_empty());
    let json = |envelope: &Envelope| {
        serde_json::to_string(envelope).unwrap_or_else(|e| {
            error!(error = %e, "Failed to serialize envelope");
            r#"{"status":"error","message":"Internal server error"}"#.to_string()
        })
    };
    match callback {
        Some(name) if is_valid_callback(name) => Response {
            content_type: Some(JSONP_CONTENT_TYPE),
            body: format!("{name}({})", json(envelope)),
        },
        Some(_) => Response {
            content_type: Some(JSON_CONTENT_TYPE),
            body: json(&Envelope::error("Invalid callback")),
        },
        None => Response {
            content_type: Some(JSON_CONTENT_TYPE),
            body: json(envelope),
        },
    }
}

fn is_valid_callback(name: &str) -> bool {
    name.len() <= MAX_CALLBACK_LEN
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Login,
    All,
    Get,
    Add,
    Delete,
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Action::Login),
            "all" => Ok(Action::All),
            "get" => Ok(Action::Get),
            "add" => Ok(Action::Add),
            "delete" => Ok(Action::Delete),
            _ => Err(()),
        }
    }
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn require<'a>(params: &'a Params, name: &'static str) -> Result<&'a str, LedgerError> {
    param(params, name).ok_or(LedgerError::MissingParameter(name))
}

fn records_json(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(|r| json!(r)).collect())
}

/// Dispatches requests to the record store, one at a time.
pub struct Gateway<S> {
    store: Mutex<RecordStore<S>>,
}

impl<S: CloudSpreadsheetService> Gateway<S> {
    pub fn new(store: RecordStore<S>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Runs the request and renders its envelope, honouring `callback`.
    /// A malformed callback is refused before the store is touched.
    pub fn handle(&self, ctx: &RequestContext, params: &Params) -> Response {
        let callback = params.get("callback").map(String::as_str);
        if callback
            .map(str::trim)
            .is_some_and(|c| !c.is_empty() && !is_valid_callback(c))
        {
            warn!(request_id = %ctx.request_id, "Invalid callback");
            return render(&Envelope::error("Invalid callback"), None);
        }
        let envelope = self.dispatch(ctx, params);
        render(&envelope, callback)
    }

    /// Runs the request and returns the envelope unrendered.
    pub fn dispatch(&self, ctx: &RequestContext, params: &Params) -> Envelope {
        let action_name = param(params, "action")
            .map(str::trim)
            .or(ctx.method.default_action())
            .unwrap_or_default();
        let _span = info_span!("request", id = %ctx.request_id, action = action_name).entered();
        let Ok(action) = action_name.parse::<Action>() else {
            warn!("Invalid action");
            return Envelope::error("Invalid action");
        };
        let result = match action {
            Action::Login => self.login(params),
            Action::All => self.all(),
            Action::Get => self.get(params),
            Action::Add => self.add(params),
            Action::Delete => self.delete(params),
        };
        result.unwrap_or_else(|e| {
            match &e {
                LedgerError::Internal(msg) => error!(error = %msg, "Request failed"),
                other => warn!(error = %other, "Request rejected"),
            }
            Envelope::error(e.public_message())
        })
    }

    fn store(&self) -> Result<std::sync::MutexGuard<'_, RecordStore<S>>, LedgerError> {
        self.store
            .lock()
            .map_err(|_| LedgerError::Internal("store mutex poisoned".into()))
    }

    fn login(&self, params: &Params) -> Result<Envelope, LedgerError> {
        let (Some(phone), Some(password)) = (param(params, "phone"), param(params, "password"))
        else {
            return Ok(Envelope::error("Phone and password are required"));
        };
        if auth::login(&*self.store()?, phone, password) {
            Ok(Envelope::ok(Some("Login successful"), None))
        } else {
            Err(LedgerError::AuthFailed)
        }
    }

    fn all(&self) -> Result<Envelope, LedgerError> {
        let tables = self.store()?.read_all()?;
        let mut data = Map::new();
        for (table, records) in tables {
            data.insert(table.sheet_name().to_string(), records_json(records));
        }
        Ok(Envelope::ok(None, Some(Value::Object(data))))
    }

    fn get(&self, params: &Params) -> Result<Envelope, LedgerError> {
        let table: Table = require(params, "sheet")?.parse()?;
        if table == Table::Users {
            return Err(LedgerError::Forbidden(table));
        }
        let records = self.store()?.read(table)?;
        Ok(Envelope::ok(None, Some(records_json(records))))
    }

    fn add(&self, params: &Params) -> Result<Envelope, LedgerError> {
        let sheet = require(params, "sheet")?;
        let data = require(params, "data")?;
        let table: Table = sheet.parse()?;
        let record = Record::from_json(data)?;
        let row = self.store()?.append(table, &record)?;
        Ok(Envelope::ok(Some("Row added successfully"), Some(json!(row))))
    }

    fn delete(&self, params: &Params) -> Result<Envelope, LedgerError> {
        let table: Table = require(params, "sheet")?.parse()?;
        if !table.is_transactional() {
            return Err(LedgerError::Forbidden(table));
        }
        let raw_row = require(params, "row")?;
        let index: i64 = raw_row
            .trim()
            .parse()
            .map_err(|_| LedgerError::InvalidFormat(format!("invalid row index '{raw_row}'")))?;
        self.store()?.delete_at(table, index)?;
        Ok(Envelope::ok(Some("Row deleted successfully"), None))
    }
}
