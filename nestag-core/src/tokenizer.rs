//! # Tokenização e leitores de entrada
//!
//! Três modos de entrada, como no protocolo:
//!
//! - **`untokenized`**: texto corrido. Segmentação embutida por fronteiras de
//!   palavra Unicode, com sentenças terminando em pontuação final. É um
//!   substituto simples para um tokenizador linguístico externo — o resto do
//!   pipeline só depende do contrato de [`Token`], não de quem tokenizou.
//! - **`vertical`**: uma forma por linha, linha em branco termina a sentença.
//! - **`conllu`**: documento CoNLL-U; tokens multipalavra viram um único
//!   token de superfície e a sentença original é retida para a saída
//!   `conllu-ne`.
//!
//! Em todos os modos, o espaçamento original é capturado nos tokens
//! (`spaces_before`/`spaces_after`), de modo que concatenar
//! `spaces_before + form + spaces_after` reproduz a entrada byte a byte.
//!
//! A tokenização é **estrita e antecipada**: o documento inteiro é lido antes
//! do primeiro lote, para que erros de formato virem um 400 limpo em vez de
//! corromperem uma resposta já iniciada.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::conllu::{parse_conllu, surface_tokens};
use crate::error::Error;
use crate::token::{Sentence, Token};

/// Modo de leitura da entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Texto corrido, a ser segmentado aqui.
    Untokenized,
    /// Uma forma por linha, linha em branco separa sentenças.
    Vertical,
    /// Documento CoNLL-U.
    Conllu,
}

impl InputMode {
    /// Parseia o valor do parâmetro `input` do protocolo.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "untokenized" => Some(InputMode::Untokenized),
            "vertical" => Some(InputMode::Vertical),
            "conllu" => Some(InputMode::Conllu),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputMode::Untokenized => "untokenized",
            InputMode::Vertical => "vertical",
            InputMode::Conllu => "conllu",
        }
    }
}

/// Tokeniza um documento no modo pedido.
pub fn tokenize(text: &str, mode: InputMode) -> Result<Vec<Sentence>, Error> {
    match mode {
        InputMode::Untokenized => Ok(tokenize_untokenized(text)),
        InputMode::Vertical => Ok(tokenize_vertical(text)),
        InputMode::Conllu => {
            let sentences = parse_conllu(text)?;
            Ok(sentences
                .into_iter()
                .map(|s| {
                    let tokens = surface_tokens(&s);
                    Sentence { tokens, conllu: Some(s) }
                })
                .collect())
        }
    }
}

/// Pontuação que encerra uma sentença no modo `untokenized`.
fn is_sentence_terminal(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| matches!(c, '.' | '!' | '?' | '…'))
}

fn tokenize_untokenized(text: &str) -> Vec<Sentence> {
    let mut sentences: Vec<Sentence> = Vec::new();
    let mut tokens: Vec<Token> = Vec::new();
    let mut pending = String::new();
    let mut sentence_done = false;

    fn flush(tokens: &mut Vec<Token>, sentences: &mut Vec<Sentence>) {
        if !tokens.is_empty() {
            sentences.push(Sentence::new(std::mem::take(tokens)));
        }
    }

    for segment in text.split_word_bounds() {
        if segment.chars().all(char::is_whitespace) {
            pending.push_str(segment);
            continue;
        }

        // o espaço acumulado pertence ao token anterior; só o início do
        // texto o recebe como spaces_before
        let spaces_before = match tokens.last_mut() {
            Some(last) => {
                last.spaces_after.push_str(&std::mem::take(&mut pending));
                String::new()
            }
            None => std::mem::take(&mut pending),
        };

        if sentence_done {
            flush(&mut tokens, &mut sentences);
            sentence_done = false;
        }

        sentence_done = is_sentence_terminal(segment);
        tokens.push(Token {
            form: segment.to_string(),
            spaces_before,
            spaces_after: String::new(),
            index: tokens.len(),
        });
    }

    if let Some(last) = tokens.last_mut() {
        last.spaces_after.push_str(&pending);
    }
    flush(&mut tokens, &mut sentences);
    sentences
}

fn tokenize_vertical(text: &str) -> Vec<Sentence> {
    let mut sentences: Vec<Sentence> = Vec::new();
    let mut tokens: Vec<Token> = Vec::new();

    for line in text.split_inclusive('\n') {
        let terminator_len = if line.ends_with("\r\n") {
            2
        } else if line.ends_with('\n') {
            1
        } else {
            0
        };
        let (form, terminator) = line.split_at(line.len() - terminator_len);

        if form.is_empty() {
            // linha em branco: fim de sentença; a quebra fica com o último
            // token, para preservar os bytes da entrada
            if let Some(last) = tokens.last_mut() {
                last.spaces_after.push_str(terminator);
            }
            if !tokens.is_empty() {
                sentences.push(Sentence::new(std::mem::take(&mut tokens)));
            }
            continue;
        }

        tokens.push(Token {
            form: form.to_string(),
            spaces_before: String::new(),
            spaces_after: terminator.to_string(),
            index: tokens.len(),
        });
    }

    if !tokens.is_empty() {
        sentences.push(Sentence::new(tokens));
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(sentences: &[Sentence]) -> String {
        let mut out = String::new();
        for s in sentences {
            for t in &s.tokens {
                out.push_str(&t.spaces_before);
                out.push_str(&t.form);
                out.push_str(&t.spaces_after);
            }
        }
        out
    }

    #[test]
    fn test_untokenized_preserves_bytes() {
        let texts = [
            "Jmenuji se Jan Novák.",
            "  espaço inicial\te tabs.\nOutra sentença!  ",
            "Sem pontuação final",
            "",
        ];
        for text in texts {
            let sentences = tokenize(text, InputMode::Untokenized).unwrap();
            assert_eq!(reassemble(&sentences), text, "bytes alterados em {:?}", text);
        }
    }

    #[test]
    fn test_untokenized_splits_sentences() {
        let sentences =
            tokenize("Uma frase. Outra frase? Terceira…", InputMode::Untokenized).unwrap();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].tokens.last().unwrap().form, ".");
        // o espaço entre sentenças fica com o último token da anterior
        assert_eq!(sentences[0].tokens.last().unwrap().spaces_after, " ");
        assert_eq!(sentences[1].tokens[0].form, "Outra");
    }

    #[test]
    fn test_untokenized_token_indices_restart_per_sentence() {
        let sentences = tokenize("Um dois. Três.", InputMode::Untokenized).unwrap();
        assert_eq!(sentences[1].tokens[0].index, 0);
    }

    #[test]
    fn test_vertical_mode() {
        let sentences = tokenize("Jan\nNovák\n\n.\n", InputMode::Vertical).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].tokens[0].form, "Jan");
        assert_eq!(reassemble(&sentences), "Jan\nNovák\n\n.\n");
    }

    #[test]
    fn test_vertical_without_trailing_newline() {
        let sentences = tokenize("a\nb", InputMode::Vertical).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].tokens[1].form, "b");
        assert_eq!(reassemble(&sentences), "a\nb");
    }

    #[test]
    fn test_conllu_mode() {
        let doc = "1\tJan\t_\t_\t_\t_\t0\t_\t_\t_\n2\tNovák\t_\t_\t_\t_\t1\t_\t_\t_\n\n";
        let sentences = tokenize(doc, InputMode::Conllu).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].tokens.len(), 2);
        assert!(sentences[0].conllu.is_some());
    }

    #[test]
    fn test_conllu_mode_rejects_garbage() {
        assert!(tokenize("isto não é conllu", InputMode::Conllu).is_err());
    }

    #[test]
    fn test_input_mode_params() {
        assert_eq!(InputMode::from_param("vertical"), Some(InputMode::Vertical));
        assert_eq!(InputMode::from_param("weird"), None);
    }
}
