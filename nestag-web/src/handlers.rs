//! Rotas HTTP e o envelope de streaming.
//!
//! As rotas de processamento (`/recognize`, `/tokenize`) respondem JSON com o
//! campo `result` transmitido em streaming: o primeiro lote é processado
//! **antes** de montar a resposta, para que erros iniciais ainda virem 4xx/5xx
//! limpos; a partir do primeiro chunk a resposta está comprometida e uma falha
//! só pode ser sinalizada in-band, com o marcador de corrupção (o JSON fica
//! deliberadamente inválido).
//!
//! A rota `/weblicht/recognize` é a mesma máquina sem envelope: corpo cru
//! CoNLL-U na entrada, `application/conllu` na saída.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};
use unicode_normalization::UnicodeNormalization;

use nestag_core::stream::Task;
use nestag_core::tokenizer::tokenize;
use nestag_core::{BatchStreamer, InputMode, ModelRegistry, OutputFormat};

use crate::config::ServerConfig;
use crate::params::{read_body, ApiError, RawParams};

/// Estado compartilhado da aplicação.
pub struct AppState {
    pub registry: ModelRegistry,
    pub config: ServerConfig,
}

/// Monta o roteador completo do serviço.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let max_request_size = state.config.max_request_size;

    Router::new()
        .route("/models", get(models_handler).post(models_handler))
        .route("/recognize", get(recognize_handler).post(recognize_handler))
        .route("/tokenize", get(tokenize_handler).post(tokenize_handler))
        .route("/weblicht/recognize", post(weblicht_handler))
        .route("/weblicht/recognize/:model", post(weblicht_handler))
        .fallback(fallback_handler)
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(cors)
        .with_state(state)
}

/// Cabeçalho de billing: caracteres da entrada após normalização NFC.
const BILLING_HEADER: &str = "x-billing-input-nfc-len";

/// Marcador in-band de falha pós-commit no envelope JSON. Fecha a string
/// `result` e anexa um literal solto, sem fechar o objeto: o JSON resultante
/// é inválido de propósito.
const JSON_CORRUPTION_MARKER: &str =
    "\",\n\"An internal error occurred during processing, producing incorrect JSON!\"";

/// Marcador equivalente da saída CoNLL-U crua do WebLicht.
const CONLLU_CORRUPTION_MARKER: &str =
    "\n\nAn internal error occurred during processing, producing incorrect CoNLL-U!";

#[derive(Serialize)]
struct ResponseEnvelope<'a> {
    model: &'a str,
    acknowledgements: &'a [&'a str],
    result: &'a str,
}

/// Prefixo do envelope JSON, terminando dentro da string `result` — os
/// chunks escapados são concatenados diretamente a ele.
fn envelope_prefix(model: &str, acknowledgements: &[&str]) -> String {
    let envelope = ResponseEnvelope { model, acknowledgements, result: "" };
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if envelope.serialize(&mut ser).is_err() {
        return String::new();
    }
    // descarta `"` + quebra + `}` finais, deixando `… "result": "`
    buf.truncate(buf.len().saturating_sub(3));
    String::from_utf8(buf).unwrap_or_default()
}

/// Escapa um chunk para dentro da string JSON `result` (sem as aspas).
fn escape_chunk(chunk: &str) -> String {
    let quoted = serde_json::to_string(chunk).unwrap_or_else(|_| "\"\"".to_string());
    quoted[1..quoted.len() - 1].to_string()
}

/// `GET`/`POST /models`: listagem dos modelos e suas capacidades.
pub async fn models_handler(State(state): State<Arc<AppState>>) -> Response {
    let models: serde_json::Map<String, serde_json::Value> = state
        .registry
        .models()
        .map(|m| (m.name().to_string(), serde_json::json!(m.capabilities())))
        .collect();
    Json(serde_json::json!({
        "models": models,
        "default_model": state.registry.default_model(),
    }))
    .into_response()
}

pub async fn recognize_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match process(state, req, Task::Recognize).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

pub async fn tokenize_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match process(state, req, Task::Tokenize).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Rota de qualquer URL desconhecida.
pub async fn fallback_handler(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("No handler for the given URL '{}'", uri.path()),
    )
        .into_response()
}

/// Caminho comum de `/recognize` e `/tokenize`.
async fn process(
    state: Arc<AppState>,
    req: Request,
    task: Task,
) -> Result<Response, ApiError> {
    let started = std::time::Instant::now();
    let params = RawParams::gather(req, state.config.max_request_size).await?;
    let data = params.data()?;

    let model_param = params.get("model").unwrap_or("");
    let model = state.registry.get(model_param).map_err(|_| {
        ApiError::bad_request(format!("The requested model '{}' does not exist.", model_param))
    })?;

    // a rota de tokenização sempre parte de texto corrido
    let input = match task {
        Task::Tokenize => InputMode::Untokenized,
        Task::Recognize => {
            let raw = params.get("input").unwrap_or("untokenized");
            InputMode::from_param(raw).ok_or_else(|| {
                ApiError::bad_request(format!("The requested input '{}' does not exist.", raw))
            })?
        }
    };

    let raw_output = params.get("output").unwrap_or("xml");
    let output = OutputFormat::from_param(raw_output)
        .filter(|o| match task {
            Task::Tokenize => matches!(o, OutputFormat::Xml | OutputFormat::Vertical),
            Task::Recognize => true,
        })
        .ok_or_else(|| {
            ApiError::bad_request(format!("The requested output '{}' does not exist.", raw_output))
        })?;
    if output == OutputFormat::ConlluNe && input != InputMode::Conllu {
        return Err(ApiError::bad_request(
            "The output 'conllu-ne' requires the input 'conllu'.",
        ));
    }

    let sentences = tokenize(&data, input).map_err(|_| {
        ApiError::bad_request(format!("Cannot parse the input in the '{}' format.", input.name()))
    })?;
    let nfc_len = billed_length(&sentences);

    info!(
        model = model.name(),
        input = input.name(),
        output = output.name(),
        sentences = sentences.len(),
        "processing request"
    );

    let streamer = match task {
        Task::Recognize => BatchStreamer::recognize(
            sentences,
            model.tagger(),
            output,
            state.config.batch_size,
            state.config.max_labels_per_token,
        ),
        Task::Tokenize => {
            BatchStreamer::tokenize(sentences, output, state.config.batch_size)
        }
    };

    let prefix = envelope_prefix(model.name(), &[model.acknowledgements()]);
    let (first, streamer) = first_chunk(streamer).await?;
    let body = json_stream_body(prefix, first, streamer, started);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), "application/json".to_string()),
            (BILLING_HEADER, nfc_len.to_string()),
        ],
        body,
    )
        .into_response())
}

/// `POST /weblicht/recognize{/model}`: corpo cru CoNLL-U, resposta CoNLL-U.
pub async fn weblicht_handler(
    State(state): State<Arc<AppState>>,
    model: Option<Path<String>>,
    req: Request,
) -> Response {
    match weblicht(state, model.map(|Path(m)| m), req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn weblicht(
    state: Arc<AppState>,
    model: Option<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let model_param = model.unwrap_or_default();
    let model = state.registry.get(&model_param).map_err(|_| {
        ApiError::bad_request(format!("The requested model '{}' does not exist.", model_param))
    })?;

    let bytes = read_body(req.into_body(), state.config.max_request_size).await?;
    let raw = String::from_utf8(bytes.to_vec())
        .map_err(|_| ApiError::bad_request("The request body is not valid UTF-8."))?;
    let data: String = raw.nfc().collect();

    let sentences = tokenize(&data, InputMode::Conllu)
        .map_err(|_| ApiError::bad_request("Cannot parse the input in the 'conllu' format."))?;
    let nfc_len = billed_length(&sentences);

    let streamer = BatchStreamer::recognize(
        sentences,
        model.tagger(),
        OutputFormat::ConlluNe,
        state.config.batch_size,
        state.config.max_labels_per_token,
    );
    let (first, streamer) = first_chunk(streamer).await?;
    let body = raw_stream_body(first, streamer);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), "application/conllu".to_string()),
            (BILLING_HEADER, nfc_len.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Processa o primeiro lote fora do runtime; um erro aqui ainda vira uma
/// resposta HTTP limpa.
async fn first_chunk(
    mut streamer: BatchStreamer,
) -> Result<(String, BatchStreamer), ApiError> {
    let (first, streamer) = tokio::task::spawn_blocking(move || {
        let first = streamer.next();
        (first, streamer)
    })
    .await
    .map_err(|e| ApiError::internal(format!("an internal error occurred: {}", e)))?;

    match first {
        Some(Ok(chunk)) => Ok((chunk, streamer)),
        Some(Err(e)) if e.is_bad_request() => Err(ApiError::bad_request(e.to_string())),
        Some(Err(e)) => Err(ApiError::internal(e.to_string())),
        // a entrada vazia produz um chunk vazio, então None não ocorre aqui
        None => Ok((String::new(), streamer)),
    }
}

/// Soma dos comprimentos das formas tokenizadas, para o cabeçalho de
/// billing. Na entrada CoNLL-U conta as palavras sintáticas, não os tokens
/// de superfície — um token multipalavra fatura cada palavra que contém.
fn billed_length(sentences: &[nestag_core::Sentence]) -> usize {
    sentences
        .iter()
        .map(|s| match &s.conllu {
            Some(conllu) => conllu.words.iter().map(|w| w.form.chars().count()).sum::<usize>(),
            None => s.tokens.iter().map(|t| t.form.chars().count()).sum::<usize>(),
        })
        .sum()
}

/// Corpo em streaming com o envelope JSON. Os lotes restantes rodam numa
/// thread de bloqueio; desconexão do cliente aborta o processamento.
fn json_stream_body(
    prefix: String,
    first: String,
    mut streamer: BatchStreamer,
    started: std::time::Instant,
) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(8);
    tokio::task::spawn_blocking(move || {
        if tx.blocking_send(Ok(Bytes::from(prefix))).is_err() {
            return;
        }
        if tx.blocking_send(Ok(Bytes::from(escape_chunk(&first)))).is_err() {
            return;
        }
        for item in streamer.by_ref() {
            match item {
                Ok(chunk) => {
                    if tx.blocking_send(Ok(Bytes::from(escape_chunk(&chunk)))).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!(error = %e, "batch failed after response commit");
                    let _ = tx.blocking_send(Ok(Bytes::from(JSON_CORRUPTION_MARKER)));
                    return;
                }
            }
        }
        let _ = tx.blocking_send(Ok(Bytes::from("\"\n}\n")));
        info!("Request {:.2}ms", started.elapsed().as_secs_f64() * 1000.0);
    });
    Body::from_stream(ReceiverStream::new(rx))
}

/// Corpo em streaming sem envelope, para a rota WebLicht.
fn raw_stream_body(first: String, mut streamer: BatchStreamer) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(8);
    tokio::task::spawn_blocking(move || {
        if tx.blocking_send(Ok(Bytes::from(first))).is_err() {
            return;
        }
        for item in streamer.by_ref() {
            match item {
                Ok(chunk) => {
                    if tx.blocking_send(Ok(Bytes::from(chunk))).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!(error = %e, "batch failed after response commit");
                    let _ = tx.blocking_send(Ok(Bytes::from(CONLLU_CORRUPTION_MARKER)));
                    return;
                }
            }
        }
    });
    Body::from_stream(ReceiverStream::new(rx))
}
