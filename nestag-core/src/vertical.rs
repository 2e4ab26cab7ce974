//! # Codificador vertical
//!
//! Uma linha de saída por **entidade**:
//! `índices-dos-tokens-separados-por-vírgula<TAB>tipo<TAB>formas`.
//!
//! Os índices são globais à sessão (1-based) e continuam através dos lotes —
//! o contador entra e sai explicitamente de cada chamada, nunca em estado
//! global. Por compatibilidade com o protocolo, o contador também avança uma
//! posição em cada fronteira de sentença (os ids "pulam" um entre sentenças).
//!
//! Tokens contíguos da mesma entidade acumulam numa única linha; a saída do
//! lote é ordenada por `(primeiro índice ↑, último índice ↓)` — entidades
//! externas antes das internas que começam no mesmo token.

use crate::label::Label;
use crate::reconstruct::TaggedSentence;

/// Uma entidade em construção durante a varredura.
struct OpenEntity {
    ids: Vec<u64>,
    label: String,
    forms: String,
}

impl OpenEntity {
    fn new(id: u64, label: &str, form: &str) -> Self {
        Self {
            ids: vec![id],
            label: label.to_string(),
            forms: form.to_string(),
        }
    }

    fn row(&self) -> (Vec<u64>, String, String) {
        (self.ids.clone(), self.label.clone(), self.forms.clone())
    }
}

/// Codifica um lote no formato vertical.
///
/// `next_token_id` é o valor do contador global de tokens vindo do lote
/// anterior (0 no primeiro); o valor atualizado é devolvido para o próximo.
pub fn to_vertical(sentences: &[TaggedSentence], next_token_id: u64) -> (String, u64) {
    let mut n = next_token_id;
    let mut rows: Vec<(Vec<u64>, String, String)> = Vec::new();
    let mut open: Vec<OpenEntity> = Vec::new();

    for sentence in sentences {
        for (token, stack) in sentence.tokens.iter().zip(&sentence.stacks) {
            n += 1;
            if stack.first().map(Label::is_outside).unwrap_or(true) {
                rows.extend(open.drain(..).map(|e| e.row()));
                continue;
            }
            for (d, label) in stack.iter().enumerate() {
                let t = match label.entity_type() {
                    Some(t) => t,
                    None => break,
                };
                if d < open.len() {
                    if label.is_begin() || open[d].label != t {
                        // a entidade aberta nesta profundidade termina aqui;
                        // sua linha sai e uma nova entidade toma o lugar
                        rows.push(open[d].row());
                        open[d] = OpenEntity::new(n, t, &token.form);
                    } else {
                        open[d].ids.push(n);
                        open[d].forms.push(' ');
                        open[d].forms.push_str(&token.form);
                    }
                } else {
                    open.push(OpenEntity::new(n, t, &token.form));
                }
            }
        }
        // fim da sentença: tudo fecha, e a fronteira consome um id
        rows.extend(open.drain(..).map(|e| e.row()));
        n += 1;
    }

    rows.sort_by(|a, b| {
        a.0[0]
            .cmp(&b.0[0])
            .then_with(|| b.0.last().cmp(&a.0.last()))
    });

    let mut out = String::new();
    for (ids, label, forms) in rows {
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        out.push_str(&ids.join(","));
        out.push('\t');
        out.push_str(&label);
        out.push('\t');
        out.push_str(&forms);
        out.push('\n');
    }
    (out, n)
}

/// Saída "vertical" da rota de tokenização pura: uma forma por linha, linha
/// em branco após cada sentença.
pub fn to_vertical_forms(sentences: &[TaggedSentence]) -> String {
    let mut out = String::new();
    for sentence in sentences {
        for token in &sentence.tokens {
            out.push_str(&token.form);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{parse_stack, LabelStack};
    use crate::token::Sentence;

    fn tagged(forms: &[&str], raw: &[&str]) -> TaggedSentence {
        let stacks: Vec<LabelStack> = raw.iter().map(|r| parse_stack(r, 5)).collect();
        TaggedSentence::reconstruct(Sentence::from_forms(forms), &stacks)
    }

    #[test]
    fn test_contiguous_tokens_single_row() {
        let s = tagged(&["f1", "f2", "f3", "f4"], &["O", "B-P", "I-P", "O"]);
        let (out, n) = to_vertical(&[s], 0);
        assert_eq!(out, "2,3\tP\tf2 f3\n");
        // 4 tokens + 1 fronteira de sentença
        assert_eq!(n, 5);
    }

    #[test]
    fn test_nested_rows_sorted_outer_first() {
        let s = tagged(
            &["f1", "f2", "f3", "f4", "f5"],
            &["O", "O", "B-P|B-pf", "I-P|B-ps", "O"],
        );
        let (out, _) = to_vertical(&[s], 0);
        assert_eq!(out, "3,4\tP\tf3 f4\n3\tpf\tf3\n4\tps\tf4\n");
    }

    #[test]
    fn test_counter_threads_across_batches() {
        let first = tagged(&["a", "b"], &["B-x", "O"]);
        let (out1, n1) = to_vertical(&[first], 0);
        assert_eq!(out1, "1\tx\ta\n");
        assert_eq!(n1, 3);

        let second = tagged(&["c"], &["B-y"]);
        let (out2, n2) = to_vertical(&[second], n1);
        // o id continua de onde o lote anterior parou
        assert_eq!(out2, "4\ty\tc\n");
        assert_eq!(n2, 5);
    }

    #[test]
    fn test_entity_open_at_sentence_end_flushes() {
        let s = tagged(&["a", "b"], &["B-P", "I-P"]);
        let (out, _) = to_vertical(&[s], 0);
        assert_eq!(out, "1,2\tP\ta b\n");
    }

    #[test]
    fn test_forms_only() {
        let a = TaggedSentence::untagged(Sentence::from_forms(&["Olá", "mundo"]));
        let b = TaggedSentence::untagged(Sentence::from_forms(&["."]));
        assert_eq!(to_vertical_forms(&[a, b]), "Olá\nmundo\n\n.\n\n");
    }
}
