//! Request wrapper
//!
//! A read-only view over the inbound request. Body bytes and text, query
//! pairs, form pairs, multipart uploads and cookies are computed on first
//! access and memoised for the rest of the request.

use crate::cookie::{Cookie, CookieJar};
use crate::pool::Reusable;
use crate::{Error, Result};
use bytes::{Buf, Bytes};
use http::header::{HeaderMap, CONTENT_TYPE, COOKIE};
use http::Uri;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

/// MIME type of url-encoded form bodies
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// MIME type of multipart form bodies
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

type BodySource = Box<dyn Read + Send>;

/// A file uploaded in a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    /// Form field the file was sent under
    pub field_name: String,
    /// File name supplied by the client
    pub file_name: String,
    /// Content type of the part, if the client sent one
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Parsed multipart body: text fields and files, in arrival order
#[derive(Debug, Default)]
struct MultipartForm {
    fields: Vec<(String, String)>,
    files: Vec<FormFile>,
}

/// Inbound request wrapper
///
/// Handlers only ever see `&Request`. The body stream is read at most
/// once; concurrent first readers block until that read finishes and then
/// observe the same bytes.
#[derive(Default)]
pub struct Request {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    source: Mutex<Option<BodySource>>,
    raw_body: OnceLock<Bytes>,
    body: OnceLock<String>,
    query: OnceLock<Vec<(String, String)>>,
    form: OnceLock<Vec<(String, String)>>,
    multipart: OnceLock<std::result::Result<MultipartForm, String>>,
    cookies: OnceLock<CookieJar>,
}

impl Request {
    /// Bind to a request whose body is already buffered
    pub fn bind(&mut self, req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) {
        let (parts, body) = req.into_parts();
        self.bind_reader(parts, body.reader(), remote_addr);
    }

    /// Bind to a request whose body is read lazily from `body`
    pub fn bind_reader(
        &mut self,
        parts: http::request::Parts,
        body: impl Read + Send + 'static,
        remote_addr: Option<SocketAddr>,
    ) {
        self.method = parts.method;
        self.uri = parts.uri;
        self.headers = parts.headers;
        self.remote_addr = remote_addr;
        *self.source.get_mut() = Some(Box::new(body));
    }

    /// Request method, e.g. `GET`
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string without the leading `?`
    pub fn raw_query(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a header, in arrival order
    pub fn multi_values_header(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get content-type header
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Address of the connected peer
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Client IP: the first `X-Forwarded-For` hop, else the peer address
    pub fn ip(&self) -> Option<IpAddr> {
        self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| self.remote_addr.map(|addr| addr.ip()))
    }

    /// First query parameter with this name
    pub fn query(&self, key: &str) -> Option<&str> {
        first(self.query_pairs(), key)
    }

    /// Every query parameter with this name
    pub fn multi_values_query(&self, key: &str) -> Vec<&str> {
        all(self.query_pairs(), key)
    }

    /// Decoded query pairs in order
    pub fn query_pairs(&self) -> &[(String, String)] {
        self.query.get_or_init(|| parse_pairs(self.raw_query()))
    }

    /// First form field with this name
    pub fn post_form(&self, key: &str) -> Option<&str> {
        first(self.form_pairs(), key)
    }

    /// Every form field with this name
    pub fn multi_values_post_form(&self, key: &str) -> Vec<&str> {
        all(self.form_pairs(), key)
    }

    /// Decoded form pairs
    ///
    /// Filled from url-encoded bodies and from the text fields of
    /// multipart bodies; empty for any other content type or for a
    /// multipart body that fails to parse.
    pub fn form_pairs(&self) -> &[(String, String)] {
        self.form.get_or_init(|| {
            if self.has_content_type(FORM_URLENCODED) {
                parse_pairs(self.body())
            } else if self.has_content_type(MULTIPART_FORM_DATA) {
                self.multipart_form()
                    .map(|form| form.fields.clone())
                    .unwrap_or_default()
            } else {
                Vec::new()
            }
        })
    }

    /// First file uploaded under `name` in a multipart body
    ///
    /// Returns `Ok(None)` when the body is not `multipart/form-data` or no
    /// file was sent under that name.
    pub fn file(&self, name: &str) -> Result<Option<&FormFile>> {
        Ok(self.files(name)?.into_iter().next())
    }

    /// Every file uploaded under `name`, in arrival order
    pub fn files(&self, name: &str) -> Result<Vec<&FormFile>> {
        if !self.has_content_type(MULTIPART_FORM_DATA) {
            return Ok(Vec::new());
        }
        let form = self
            .multipart_form()
            .map_err(|e| Error::Multipart(e.to_string()))?;
        Ok(form.files.iter().filter(|f| f.field_name == name).collect())
    }

    fn multipart_form(&self) -> std::result::Result<&MultipartForm, &str> {
        self.multipart
            .get_or_init(|| {
                let boundary = multer::parse_boundary(self.content_type().unwrap_or_default())
                    .map_err(|e| e.to_string())?;
                futures::executor::block_on(read_multipart(self.raw_body().clone(), boundary))
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(String::as_str)
    }

    fn has_content_type(&self, mime: &str) -> bool {
        self.content_type()
            .map(|ct| ct.trim_start().starts_with(mime))
            .unwrap_or(false)
    }

    /// Request cookie by name
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies().get(name)
    }

    /// All request cookies
    pub fn cookies(&self) -> &CookieJar {
        self.cookies.get_or_init(|| {
            CookieJar::parse(
                self.headers
                    .get_all(COOKIE)
                    .iter()
                    .filter_map(|v| v.to_str().ok()),
            )
        })
    }

    /// Body bytes, read from the stream on first call
    ///
    /// A failed read keeps whatever bytes arrived before the failure.
    pub fn raw_body(&self) -> &Bytes {
        self.raw_body.get_or_init(|| {
            let mut buf = Vec::new();
            if let Some(mut source) = self.source.lock().take() {
                let _ = source.read_to_end(&mut buf);
            }
            Bytes::from(buf)
        })
    }

    /// Body as text; invalid UTF-8 is replaced
    pub fn body(&self) -> &str {
        self.body
            .get_or_init(|| String::from_utf8_lossy(self.raw_body()).into_owned())
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(self.body())?)
    }
}

impl Reusable for Request {
    fn reset(&mut self) {
        self.method = http::Method::GET;
        self.uri = Uri::default();
        self.headers.clear();
        self.remote_addr = None;
        *self.source.get_mut() = None;
        self.raw_body.take();
        self.body.take();
        self.query.take();
        self.form.take();
        self.multipart.take();
        self.cookies.take();
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("remote_addr", &self.remote_addr)
            .field("body", &self.body.get())
            .finish()
    }
}

fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn all<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

/// Parse `a=1&b=2` into decoded pairs; a bare key gets an empty value
fn parse_pairs(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Split a buffered multipart body into text fields and files
async fn read_multipart(body: Bytes, boundary: String) -> multer::Result<MultipartForm> {
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?;
                form.files.push(FormFile {
                    field_name: name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field.text().await?;
                form.fields.push((name, value));
            }
        }
    }

    Ok(form)
}

/// Decode one form or query component: `+` is a space, then `%XX`
///
/// Only `%` followed by two hex digits is decoded; anything else is kept
/// literally.
fn decode_component(s: &str) -> String {
    if !s.contains(['%', '+']) {
        return s.to_string();
    }
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
