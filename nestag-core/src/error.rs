//! # Taxonomia de erros
//!
//! Três classes, com destinos distintos no protocolo:
//!
//! - [`Error::InvalidInput`] / [`Error::UnknownModel`]: culpa do cliente,
//!   viram 400 em texto puro — sempre antes do commit da resposta.
//! - [`Error::Processing`]: falha interna durante um lote. Antes do commit
//!   vira uma resposta de erro limpa; depois do commit só resta o marcador
//!   de corrupção in-band, porque cabeçalhos HTTP não podem ser desfeitos.
//!
//! Saída malformada do tagger (um `O` no meio de uma pilha, decodificação
//! desgovernada) **não** aparece aqui: é recuperada localmente pelo
//! reconstrutor e nunca chega ao cliente.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A entrada não parseia no formato pedido.
    #[error("cannot parse the input in the '{format}' format: {message}")]
    InvalidInput { format: String, message: String },

    /// O modelo pedido não está registrado.
    #[error("the requested model '{0}' does not exist")]
    UnknownModel(String),

    /// Falha interna de processamento (tagger, backend).
    #[error("an internal error occurred during processing: {0}")]
    Processing(String),
}

impl Error {
    /// Verdadeiro para erros causados pelo cliente (mapeados para 4xx).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::InvalidInput { .. } | Error::UnknownModel(_))
    }
}
