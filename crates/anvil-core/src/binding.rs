//! Request body binding: `bindJson`, `bindForm`, `bindQuery`, `bindMultipart`,
//! `bindXml`.
//!
//! Each function decodes the body into a caller-chosen type and then runs
//! [`Validate::validate`] on it. Bound types must implement `Validate`;
//! types with no constraints can use `impl Validate for MyType {}` to accept
//! the default no-op, while types with declared constraints override
//! `validate` to return field-level `ValidationError`s.

use std::collections::HashMap;

use anvil_http::Request;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result, ValidationError};

/// Implemented by types bound from a request body that carry their own
/// field-level constraints.
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

fn finish<T: Validate>(value: T) -> Result<T> {
    value.validate().map_err(Error::Validation)?;
    Ok(value)
}

/// Decode a JSON request body into `T`.
pub fn bind_json<T: DeserializeOwned + Validate>(req: &Request) -> Result<T> {
    let value: T =
        serde_json::from_slice(req.body.as_ref()).map_err(|e| Error::Binding(e.to_string()))?;
    finish(value)
}

/// Decode an `application/x-www-form-urlencoded` request body into `T`.
pub fn bind_form<T: DeserializeOwned + Validate>(req: &Request) -> Result<T> {
    let value: T = serde_urlencoded::from_bytes(req.body.as_ref())
        .map_err(|e| Error::Binding(e.to_string()))?;
    finish(value)
}

/// Decode the request's query string into `T`.
pub fn bind_query<T: DeserializeOwned + Validate>(req: &Request) -> Result<T> {
    let value: T =
        serde_urlencoded::from_str(req.query_string()).map_err(|e| Error::Binding(e.to_string()))?;
    finish(value)
}

/// A single uploaded file from a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A parsed `multipart/form-data` body: plain text fields plus any file
/// parts, keyed by their form field name.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, MultipartFile>,
}

/// Parse a `multipart/form-data` body into its fields and files.
///
/// This is the low-level parse step; `bind_multipart` layers `T: Deserialize`
/// decoding of the text fields on top of it for handlers that just want a
/// struct of plain form values (file parts are dropped from that path — bind
/// multipart manually via this function when the handler needs the bytes).
pub async fn parse_multipart(req: &Request) -> Result<MultipartForm> {
    let content_type = req
        .content_type()
        .ok_or_else(|| Error::Binding("multipart body missing Content-Type".into()))?
        .to_string();
    let boundary = multer::parse_boundary(&content_type)
        .map_err(|e| Error::Binding(format!("invalid multipart boundary: {e}")))?;

    let stream = futures_util::stream::once(async move {
        Ok::<_, std::io::Error>(req.body.clone())
    });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = MultipartForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Binding(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };
        let filename = field.file_name().map(|f| f.to_string());
        let content_type = field.content_type().map(|m| m.to_string());
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| Error::Binding(format!("malformed multipart body: {e}")))?
        {
            bytes.extend_from_slice(&chunk);
        }
        if filename.is_some() {
            form.files.insert(name, MultipartFile { filename, content_type, bytes });
        } else {
            form.fields
                .insert(name, String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    Ok(form)
}

/// Decode a `multipart/form-data` body's text fields into `T`.
pub async fn bind_multipart<T: DeserializeOwned + Validate>(req: &Request) -> Result<T> {
    let form = parse_multipart(req).await?;
    let map: serde_json::Map<String, serde_json::Value> = form
        .fields
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();
    let value: T = serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| Error::Binding(e.to_string()))?;
    finish(value)
}

/// Decode an XML request body into `T`.
pub fn bind_xml<T: DeserializeOwned + Validate>(req: &Request) -> Result<T> {
    let text = std::str::from_utf8(req.body.as_ref())
        .map_err(|e| Error::Binding(format!("body is not valid UTF-8: {e}")))?;
    let value: T = quick_xml::de::from_str(text).map_err(|e| Error::Binding(e.to_string()))?;
    finish(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_http::Request;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        username: String,
        password: String,
    }

    impl Validate for Login {
        fn validate(&self) -> std::result::Result<(), ValidationError> {
            let mut err = ValidationError::new();
            if self.username.is_empty() {
                err.add("username", "must not be empty");
            }
            if self.password.len() < 8 {
                err.add("password", "must be at least 8 characters");
            }
            err.into_result().map_err(|e| match e {
                Error::Validation(v) => v,
                _ => unreachable!(),
            })
        }
    }

    #[test]
    fn bind_json_runs_validation() {
        let req = Request::builder()
            .body(r#"{"username":"a","password":"short"}"#)
            .build();
        let err = bind_json::<Login>(&req).unwrap_err();
        match err {
            Error::Validation(v) => assert!(v.fields.contains_key("password")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bind_json_success() {
        let req = Request::builder()
            .body(r#"{"username":"alice","password":"supersecret"}"#)
            .build();
        let login = bind_json::<Login>(&req).unwrap();
        assert_eq!(login.username, "alice");
    }

    #[test]
    fn bind_query_decodes_pairs() {
        #[derive(Debug, Deserialize)]
        struct Paging {
            page: u32,
            per_page: u32,
        }
        impl Validate for Paging {}
        let req = Request::builder().uri("/items?page=2&per_page=50").build();
        let paging = bind_query::<Paging>(&req).unwrap();
        assert_eq!(paging.page, 2);
        assert_eq!(paging.per_page, 50);
    }
}
