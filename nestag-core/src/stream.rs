//! # Sessão de processamento em lotes
//!
//! O documento inteiro é tokenizado antecipadamente, mas taggeado e
//! codificado **lote a lote**: a resposta começa a fluir assim que o primeiro
//! lote fica pronto, sem esperar o documento todo.
//!
//! A sessão é uma máquina de estados:
//!
//! ```text
//! Accumulating ──primeiro chunk──▶ Committed ──chunks──▶ Streaming ──▶ Done
//!       │                              │                     │
//!       └────────── erro ─────────────┴─────────────────────┴──▶ Failed
//! ```
//!
//! O ponto de **commit** é o primeiro chunk produzido: antes dele um erro
//! ainda pode virar uma resposta HTTP limpa; depois dele os cabeçalhos já
//! foram enviados e só resta o marcador de corrupção in-band. Por isso a
//! camada HTTP consome o primeiro chunk antes de construir a resposta, e o
//! estado [`SessionState::Committed`] marca essa fronteira.
//!
//! Os contadores globais da sessão (ids de token do formato vertical, ids de
//! entidade do `conllu-ne`) vivem aqui e atravessam os lotes.

use std::sync::Arc;

use crate::conll::to_conll;
use crate::conllu::{merge_entities, write_conllu, ConlluSentence};
use crate::error::Error;
use crate::label::{normalize_stack, LabelStack};
use crate::reconstruct::TaggedSentence;
use crate::tagger::Tagger;
use crate::token::Sentence;
use crate::vertical::{to_vertical, to_vertical_forms};
use crate::xml::to_xml;

/// Estado da sessão de streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nenhum chunk produzido ainda; erros ainda podem virar resposta limpa.
    Accumulating,
    /// O primeiro chunk foi produzido: a resposta está comprometida.
    Committed,
    /// Chunks subsequentes em andamento.
    Streaming,
    /// Entrada esgotada com sucesso.
    Done,
    /// Um lote falhou; nenhum chunk adicional será produzido.
    Failed,
}

/// Operação pedida pela requisição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Só tokenizar, sem reconhecimento.
    Tokenize,
    /// Tokenizar (se preciso) e reconhecer entidades.
    Recognize,
}

/// Formato de saída do protocolo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xml,
    Vertical,
    Conll,
    ConlluNe,
}

impl OutputFormat {
    /// Parseia o valor do parâmetro `output` do protocolo.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "xml" => Some(OutputFormat::Xml),
            "vertical" => Some(OutputFormat::Vertical),
            "conll" => Some(OutputFormat::Conll),
            "conllu-ne" => Some(OutputFormat::ConlluNe),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Vertical => "vertical",
            OutputFormat::Conll => "conll",
            OutputFormat::ConlluNe => "conllu-ne",
        }
    }
}

/// Iterador de chunks de uma sessão: cada item é o texto codificado de um
/// lote de sentenças, ou o erro que encerrou a sessão.
pub struct BatchStreamer {
    sentences: std::vec::IntoIter<Sentence>,
    task: Task,
    tagger: Option<Arc<dyn Tagger>>,
    output: OutputFormat,
    batch_size: usize,
    max_labels: usize,
    state: SessionState,
    /// Contador de ids de token do formato vertical (último id consumido).
    token_counter: u64,
    /// Próximo id de entidade do `conllu-ne`.
    ne_counter: u64,
}

impl BatchStreamer {
    /// Sessão de reconhecimento.
    pub fn recognize(
        sentences: Vec<Sentence>,
        tagger: Arc<dyn Tagger>,
        output: OutputFormat,
        batch_size: usize,
        max_labels: usize,
    ) -> Self {
        Self::new(sentences, Task::Recognize, Some(tagger), output, batch_size, max_labels)
    }

    /// Sessão de tokenização pura: as pilhas são todas `O` e nenhum tagger é
    /// consultado.
    pub fn tokenize(sentences: Vec<Sentence>, output: OutputFormat, batch_size: usize) -> Self {
        Self::new(sentences, Task::Tokenize, None, output, batch_size, 1)
    }

    fn new(
        sentences: Vec<Sentence>,
        task: Task,
        tagger: Option<Arc<dyn Tagger>>,
        output: OutputFormat,
        batch_size: usize,
        max_labels: usize,
    ) -> Self {
        Self {
            sentences: sentences.into_iter(),
            task,
            tagger,
            output,
            batch_size: batch_size.max(1),
            max_labels: max_labels.max(1),
            state: SessionState::Accumulating,
            token_counter: 0,
            ne_counter: 1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Verdadeiro depois que o primeiro chunk saiu — um erro a partir daqui
    /// não pode mais virar uma resposta HTTP limpa.
    pub fn committed(&self) -> bool {
        !matches!(self.state, SessionState::Accumulating)
    }

    fn tag_sentence(&self, sentence: Sentence) -> Result<TaggedSentence, Error> {
        match (self.task, &self.tagger) {
            (Task::Recognize, Some(tagger)) => {
                let raw = tagger.predict(&sentence.tokens)?;
                if raw.len() != sentence.tokens.len() {
                    return Err(Error::Processing(format!(
                        "model returned {} label stacks for {} tokens",
                        raw.len(),
                        sentence.tokens.len()
                    )));
                }
                let stacks: Vec<LabelStack> = raw
                    .iter()
                    .map(|stack| normalize_stack(stack, self.max_labels))
                    .collect();
                Ok(TaggedSentence::reconstruct(sentence, &stacks))
            }
            _ => Ok(TaggedSentence::untagged(sentence)),
        }
    }

    fn encode_batch(&mut self, mut batch: Vec<TaggedSentence>) -> Result<String, Error> {
        match self.output {
            OutputFormat::Conll => Ok(to_conll(&batch)),
            OutputFormat::Xml => Ok(to_xml(&batch)),
            OutputFormat::Vertical => {
                if self.task == Task::Tokenize {
                    return Ok(to_vertical_forms(&batch));
                }
                let (out, counter) = to_vertical(&batch, self.token_counter);
                self.token_counter = counter;
                Ok(out)
            }
            OutputFormat::ConlluNe => {
                let stacks: Vec<Vec<LabelStack>> =
                    batch.iter().map(|s| s.stacks.clone()).collect();
                let mut conllu: Vec<ConlluSentence> = Vec::with_capacity(batch.len());
                for sentence in &mut batch {
                    conllu.push(sentence.conllu.take().ok_or_else(|| {
                        Error::Processing(
                            "conllu-ne output requires conllu input".to_string(),
                        )
                    })?);
                }
                self.ne_counter = merge_entities(&mut conllu, &stacks, self.ne_counter);
                Ok(conllu.iter().map(write_conllu).collect())
            }
        }
    }

    fn advance_state(&mut self) {
        self.state = match self.state {
            SessionState::Accumulating => SessionState::Committed,
            _ => SessionState::Streaming,
        };
    }
}

impl Iterator for BatchStreamer {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, SessionState::Done | SessionState::Failed) {
            return None;
        }

        let batch: Vec<Sentence> = self.sentences.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            // entrada vazia ainda comete um chunk vazio, para que a resposta
            // tenha o envelope completo
            let first = self.state == SessionState::Accumulating;
            self.state = SessionState::Done;
            return if first { Some(Ok(String::new())) } else { None };
        }

        let mut tagged = Vec::with_capacity(batch.len());
        for sentence in batch {
            match self.tag_sentence(sentence) {
                Ok(t) => tagged.push(t),
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Some(Err(e));
                }
            }
        }
        match self.encode_batch(tagged) {
            Ok(chunk) => {
                self.advance_state();
                Some(Ok(chunk))
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::testing::FailingTagger;
    use crate::tagger::LexiconTagger;
    use crate::tokenizer::{tokenize, InputMode};

    fn lexicon() -> Arc<dyn Tagger> {
        Arc::new(LexiconTagger::builtin())
    }

    fn vertical_input(doc: &str) -> Vec<Sentence> {
        tokenize(doc, InputMode::Vertical).unwrap()
    }

    #[test]
    fn test_empty_input_commits_one_empty_chunk() {
        let mut s = BatchStreamer::recognize(Vec::new(), lexicon(), OutputFormat::Conll, 32, 5);
        assert_eq!(s.state(), SessionState::Accumulating);
        assert_eq!(s.next().unwrap().unwrap(), "");
        assert_eq!(s.state(), SessionState::Done);
        assert!(s.next().is_none());
    }

    #[test]
    fn test_batches_split_by_batch_size() {
        let sentences = vertical_input("a\n\nb\n\nc\n\n");
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::Conll, 2, 5);
        let first = s.next().unwrap().unwrap();
        assert_eq!(first, "a\tO\n\nb\tO\n\n");
        assert_eq!(s.state(), SessionState::Committed);
        let second = s.next().unwrap().unwrap();
        assert_eq!(second, "c\tO\n\n");
        assert_eq!(s.state(), SessionState::Streaming);
        assert!(s.next().is_none());
        assert_eq!(s.state(), SessionState::Done);
    }

    #[test]
    fn test_recognized_entities_in_conll() {
        let sentences = vertical_input("Machado\nAssis\n\n");
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::Conll, 32, 5);
        let chunk = s.next().unwrap().unwrap();
        assert_eq!(chunk, "Machado\tB-P|B-pf\nAssis\tI-P|B-ps\n\n");
    }

    #[test]
    fn test_failure_before_commit() {
        let sentences = vertical_input("a\n\n");
        let tagger: Arc<dyn Tagger> = Arc::new(FailingTagger::new(1));
        let mut s = BatchStreamer::recognize(sentences, tagger, OutputFormat::Conll, 32, 5);
        assert!(!s.committed());
        assert!(s.next().unwrap().is_err());
        assert_eq!(s.state(), SessionState::Failed);
        assert!(s.next().is_none());
    }

    #[test]
    fn test_failure_after_commit() {
        let sentences = vertical_input("a\n\nb\n\n");
        let tagger: Arc<dyn Tagger> = Arc::new(FailingTagger::new(2));
        let mut s = BatchStreamer::recognize(sentences, tagger, OutputFormat::Conll, 1, 5);
        assert!(s.next().unwrap().is_ok());
        assert!(s.committed());
        assert!(s.next().unwrap().is_err());
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn test_vertical_ids_continue_across_batches() {
        let sentences = vertical_input("Praga\n\nPraga\n\n");
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::Vertical, 1, 5);
        assert_eq!(s.next().unwrap().unwrap(), "1\tgu\tPraga\n");
        // o contador atravessou o lote: token 1 + fronteira = próximo id 3
        assert_eq!(s.next().unwrap().unwrap(), "3\tgu\tPraga\n");
    }

    #[test]
    fn test_conllu_ne_ids_continue_across_batches() {
        let doc = "1\tPraga\t_\t_\t_\t_\t0\t_\t_\t_\n\n1\tPraga\t_\t_\t_\t_\t0\t_\t_\t_\n\n";
        let sentences = tokenize(doc, InputMode::Conllu).unwrap();
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::ConlluNe, 1, 5);
        let first = s.next().unwrap().unwrap();
        let second = s.next().unwrap().unwrap();
        assert!(first.contains("NE=gu_1"), "{}", first);
        assert!(second.contains("NE=gu_2"), "{}", second);
    }

    #[test]
    fn test_conllu_ne_ids_survive_entity_free_batches() {
        // o primeiro lote não tem entidades; o segundo ainda começa em 1 e
        // os ids seguem estritamente crescentes
        let doc = "1\tnada\t_\t_\t_\t_\t0\t_\t_\t_\n\n1\tPraga\t_\t_\t_\t_\t0\t_\t_\t_\n\n";
        let sentences = tokenize(doc, InputMode::Conllu).unwrap();
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::ConlluNe, 1, 5);
        let first = s.next().unwrap().unwrap();
        let second = s.next().unwrap().unwrap();
        assert!(!first.contains("NE="), "{}", first);
        assert!(second.contains("NE=gu_1"), "{}", second);
    }

    #[test]
    fn test_conllu_ne_without_conllu_input_fails() {
        let sentences = vertical_input("a\n\n");
        let mut s = BatchStreamer::recognize(sentences, lexicon(), OutputFormat::ConlluNe, 32, 5);
        assert!(s.next().unwrap().is_err());
    }

    #[test]
    fn test_tokenize_task_emits_forms() {
        let sentences = tokenize("Olá mundo.", InputMode::Untokenized).unwrap();
        let mut s = BatchStreamer::tokenize(sentences, OutputFormat::Vertical, 32);
        assert_eq!(s.next().unwrap().unwrap(), "Olá\nmundo\n.\n\n");
    }

    #[test]
    fn test_output_format_params() {
        assert_eq!(OutputFormat::from_param("conllu-ne"), Some(OutputFormat::ConlluNe));
        assert_eq!(OutputFormat::from_param("json"), None);
    }
}
