//! # nestag-core — Reconhecimento de Entidades Nomeadas Aninhadas
//!
//! Núcleo do serviço de anotação: recebe texto (corrido, vertical ou
//! CoNLL-U), tokeniza, prediz pilhas de rótulos BIO por token, reconstrói um
//! conjunto **bem aninhado** de entidades e o codifica em um dos formatos do
//! protocolo (XML inline, vertical, tabular ou CoNLL-U com `NE=` em MISC).
//!
//! ## Pipeline
//!
//! ```text
//! texto ──tokenizer──▶ Sentence ──tagger──▶ pilhas cruas
//!       ──label::normalize_stack──▶ pilhas parseadas
//!       ──reconstruct──▶ TaggedSentence (entidades + pilhas normalizadas)
//!       ──conll/xml/vertical/conllu──▶ chunk de saída
//! ```
//!
//! A orquestração em lotes, com os contadores globais da sessão e a máquina
//! de estados de commit, vive em [`stream`]; a camada HTTP (crate
//! `nestag-web`) só consome o iterador de chunks.
//!
//! ## Garantias centrais
//!
//! - **Aninhamento**: as entidades de uma sentença são duas a duas disjuntas
//!   ou estritamente aninhadas, qualquer que seja a saída do tagger
//!   ([`reconstruct`]).
//! - **Preservação de bytes**: remover as tags da saída XML devolve a entrada
//!   exatamente ([`xml`], apoiado no espaçamento guardado em [`token`]).
//! - **Ids de sessão**: os contadores do formato vertical e do `conllu-ne`
//!   são estritamente crescentes através dos lotes ([`stream`]).

pub mod conll;
pub mod conllu;
pub mod error;
pub mod label;
pub mod model;
pub mod reconstruct;
pub mod stream;
pub mod tagger;
pub mod token;
pub mod tokenizer;
pub mod vertical;
pub mod xml;

pub use error::Error;
pub use label::{Label, LabelStack};
pub use model::{Model, ModelRegistry};
pub use reconstruct::{Entity, TaggedSentence};
pub use stream::{BatchStreamer, OutputFormat, SessionState, Task};
pub use tagger::{LexiconTagger, Tagger};
pub use token::{Sentence, Token};
pub use tokenizer::InputMode;
