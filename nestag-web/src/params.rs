//! Coleta e validação dos parâmetros de requisição.
//!
//! O protocolo aceita os parâmetros tanto na query string quanto no corpo
//! (`application/x-www-form-urlencoded` ou `multipart/form-data`), com o
//! corpo sobrepondo a query. Os erros de validação são respostas 4xx em
//! texto puro, com as mensagens fixas do protocolo.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use unicode_normalization::UnicodeNormalization;

/// Erro de API: status + corpo em texto puro.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }

    pub fn payload_too_large() -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "The payload size is too large.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

/// Parâmetros crus da requisição, já com a precedência corpo-sobre-query
/// aplicada.
#[derive(Debug, Default)]
pub struct RawParams {
    map: HashMap<String, String>,
}

impl RawParams {
    /// Junta query string e corpo. O corpo é lido por inteiro aqui, limitado
    /// a `max_size` bytes.
    pub async fn gather(req: Request, max_size: usize) -> Result<Self, ApiError> {
        let mut map: HashMap<String, String> = HashMap::new();

        if let Some(query) = req.uri().query() {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
                .map_err(|_| ApiError::bad_request("Cannot parse request URL."))?;
            map.extend(pairs);
        }

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        // só requisições POST carregam parâmetros no corpo
        if req.method() != Method::POST {
            return Ok(Self { map });
        }

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, &())
                .await
                .map_err(|_| ApiError::bad_request("Cannot parse the multipart/form-data payload."))?;
            loop {
                match multipart.next_field().await {
                    Ok(Some(field)) => {
                        let name = match field.name() {
                            Some(name) => name.to_string(),
                            None => continue,
                        };
                        // só o estouro de tamanho vira 413; qualquer outra
                        // falha de leitura é um corpo imparseável
                        let value = field.text().await.map_err(|e| {
                            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                                ApiError::payload_too_large()
                            } else {
                                ApiError::bad_request(
                                    "Cannot parse the multipart/form-data payload.",
                                )
                            }
                        })?;
                        map.insert(name, value);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        return Err(ApiError::bad_request("Cannot parse the multipart/form-data payload."))
                    }
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let bytes = read_body(req.into_body(), max_size).await?;
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes).map_err(
                |_| ApiError::bad_request("Cannot parse the application/x-www-form-urlencoded payload."),
            )?;
            map.extend(pairs);
        } else {
            let shown = if content_type.is_empty() { "<none>" } else { &content_type };
            return Err(ApiError::bad_request(format!(
                "Unsupported payload Content-Type '{}'.",
                shown
            )));
        }

        Ok(Self { map })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Parâmetro `data`, obrigatório, normalizado para NFC.
    pub fn data(&self) -> Result<String, ApiError> {
        let raw = self
            .get("data")
            .ok_or_else(|| ApiError::bad_request("The parameter 'data' is required."))?;
        Ok(raw.nfc().collect())
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Lê o corpo com limite explícito de tamanho.
pub async fn read_body(body: Body, max_size: usize) -> Result<axum::body::Bytes, ApiError> {
    axum::body::to_bytes(body, max_size)
        .await
        .map_err(|_| ApiError::payload_too_large())
}
