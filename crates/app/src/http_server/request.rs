use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::Form;
use bytes::Bytes;
use http::header::CONTENT_TYPE;

use super::error::ApiError;

/// Multipart part name carrying uploaded files
pub const FILE_FIELD: &str = "file";

/// Arguments of a service call, from an urlencoded form or a multipart body
#[derive(Debug, Default, Clone)]
pub struct ServiceArgs {
    fields: HashMap<String, String>,
    files: Vec<(String, Bytes)>,
}

impl ServiceArgs {
    pub async fn from_request<S>(request: Request, state: &S) -> Result<Self, ApiError>
    where
        S: Send + Sync,
    {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        // A call without a body, e.g. Logout
        if content_type.is_empty() {
            return Ok(Self::default());
        }

        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self {
            fields,
            files: Vec::new(),
        })
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut args = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                args.files.push((file_name, data));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                args.fields.insert(name, value);
            }
        }
        Ok(args)
    }

    /// Whether `key` was sent, even empty. Uploaded files count as `file`.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key) || (key == FILE_FIELD && !self.files.is_empty())
    }

    /// Trimmed value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.trim())
    }

    /// Trimmed value of `key`, empty when absent
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn take_files(&mut self) -> Vec<(String, Bytes)> {
        std::mem::take(&mut self.files)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ServiceArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: Vec::new(),
        }
    }
}
