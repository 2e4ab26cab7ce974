//! # Formato tabular (CoNLL)
//!
//! O formato de intercâmbio canônico entre tagger, reconstrutor e cliente:
//! uma linha por token, `forma<TAB>pilha-de-rótulos`, com as pilhas unidas
//! por `|` (`B-P|B-pf`) ou `O`; linha em branco encerra cada sentença.
//!
//! É ao mesmo tempo formato de saída (`output=conll`) e a representação que
//! o reconstrutor consome nos testes de ida e volta.

use crate::label::{format_stack, parse_stack, LabelStack};
use crate::reconstruct::TaggedSentence;

pub const SEP: char = '\t';

/// Codifica um lote de sentenças anotadas no formato tabular.
///
/// Cada sentença termina com uma linha em branco, inclusive a última — o
/// lote seguinte continua o texto sem separador adicional.
pub fn to_conll(sentences: &[TaggedSentence]) -> String {
    let mut out = String::new();
    for sentence in sentences {
        for (token, stack) in sentence.tokens.iter().zip(&sentence.stacks) {
            out.push_str(&token.form);
            out.push(SEP);
            out.push_str(&format_stack(stack));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Decodifica texto tabular em pares (forma, pilha) por sentença.
///
/// Linhas sem a coluna de rótulos são lidas como `O` (entrada apenas
/// tokenizada). Usado pelos testes de ida e volta pelo reconstrutor.
pub fn parse_conll(text: &str, max_depth: usize) -> Vec<Vec<(String, LabelStack)>> {
    let mut sentences = Vec::new();
    let mut current: Vec<(String, LabelStack)> = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        let (form, stack) = match line.split_once(SEP) {
            Some((form, raw)) => (form.to_string(), parse_stack(raw, max_depth)),
            None => (line.to_string(), parse_stack("O", max_depth)),
        };
        current.push((form, stack));
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}
