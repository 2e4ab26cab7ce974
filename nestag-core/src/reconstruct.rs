//! # Reconstrutor de Entidades
//!
//! Converte as pilhas de rótulos cruas (possivelmente malformadas) do tagger
//! em um conjunto canônico de entidades **bem aninhadas**, e reconstrói as
//! pilhas normalizadas a partir desse conjunto.
//!
//! ## Contrato
//!
//! Para qualquer entrada, o conjunto de saída satisfaz o invariante de
//! aninhamento: dois spans quaisquer são disjuntos ou um contém o outro
//! estritamente. Nunca há `I-` sem um `B-` anterior do mesmo tipo nas pilhas
//! reconstruídas, nem sobreposição parcial. Aplicar o reconstrutor a uma
//! saída já normalizada devolve exatamente a mesma saída (idempotência).
//!
//! ## Algoritmo
//!
//! Varredura única da esquerda para a direita mantendo, por profundidade, o
//! início e o tipo da entidade aberta:
//!
//! 1. Pilha `O`: fecha todas as entidades abertas.
//! 2. Rótulo `B-` ou mudança de tipo na profundidade `d`: fecha a entidade em
//!    `d` **e todas as mais profundas** (fechamento em cascata — uma entidade
//!    externa que muda força o fim de tudo que está aninhado nela) e abre uma
//!    nova entidade em `d`.
//! 3. Pilha mais curta que o estado aberto: fecha as profundidades excedentes.
//! 4. Fim da sentença: fecha tudo.
//!
//! As entidades emitidas são deduplicadas por `(início, fim, tipo)` num mapa
//! ordenado (a profundidade no momento do fechamento fica como valor, apenas
//! para ordenação), e ordenadas por `(início ↑, fim ↓, profundidade ↑)` —
//! externas antes das internas, determinístico em empates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conllu::ConlluSentence;
use crate::label::{Label, LabelStack};
use crate::token::{Sentence, Token};

/// Uma entidade reconhecida: intervalo de tokens `[start, end)` com tipo e
/// profundidade de aninhamento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Índice do primeiro token (inclusivo).
    pub start: usize,
    /// Índice após o último token (exclusivo). Sempre `end > start`.
    pub end: usize,
    /// Tipo da entidade (ex: "P", "pf", "gu").
    pub label: String,
    /// Profundidade de aninhamento (0 = mais externa).
    pub depth: usize,
}

impl Entity {
    /// Verdadeiro se `self` contém `other` estritamente.
    pub fn contains(&self, other: &Entity) -> bool {
        self.start <= other.start
            && other.end <= self.end
            && (self.end - self.start) > (other.end - other.start)
    }

    /// Verdadeiro se os intervalos não se tocam.
    pub fn disjoint(&self, other: &Entity) -> bool {
        self.end <= other.start || other.end <= self.start
    }
}

/// Uma sentença com o resultado da reconstrução: pilhas normalizadas e
/// conjunto de entidades. É a entrada comum de todos os codificadores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedSentence {
    pub tokens: Vec<Token>,
    /// Uma pilha normalizada por token, externa → interna.
    pub stacks: Vec<LabelStack>,
    /// Entidades ordenadas por `(início ↑, fim ↓, profundidade ↑)`.
    pub entities: Vec<Entity>,
    /// Sentença CoNLL-U de origem, quando a entrada era CoNLL-U.
    pub conllu: Option<ConlluSentence>,
}

impl TaggedSentence {
    /// Reconstrói as entidades de uma sentença a partir das pilhas já
    /// parseadas ([`crate::label::normalize_stack`]).
    pub fn reconstruct(sentence: Sentence, stacks: &[LabelStack]) -> Self {
        debug_assert_eq!(sentence.tokens.len(), stacks.len());
        let (entities, stacks) = reconstruct(stacks);
        Self {
            tokens: sentence.tokens,
            stacks,
            entities,
            conllu: sentence.conllu,
        }
    }

    /// Sentença sem anotação alguma (todas as pilhas `O`) — usada pela rota
    /// de tokenização pura.
    pub fn untagged(sentence: Sentence) -> Self {
        let stacks = vec![vec![Label::Outside]; sentence.tokens.len()];
        Self {
            tokens: sentence.tokens,
            stacks,
            entities: Vec::new(),
            conllu: sentence.conllu,
        }
    }
}

/// Reconstrói o conjunto de entidades de uma sentença e as pilhas
/// normalizadas correspondentes.
pub fn reconstruct(stacks: &[LabelStack]) -> (Vec<Entity>, Vec<LabelStack>) {
    let n = stacks.len();

    // Dedup explícito por (início, fim, tipo); o valor é a profundidade no
    // momento do fechamento (fechamentos posteriores sobrescrevem).
    let mut entities: BTreeMap<(usize, usize, String), usize> = BTreeMap::new();
    let mut open_starts: Vec<usize> = Vec::new();
    let mut open_types: Vec<String> = Vec::new();

    fn close_from(
        depth: usize,
        at: usize,
        starts: &[usize],
        types: &[String],
        entities: &mut BTreeMap<(usize, usize, String), usize>,
    ) {
        for d in depth..types.len() {
            entities.insert((starts[d], at, types[d].clone()), d);
        }
    }

    for (i, stack) in stacks.iter().enumerate() {
        if stack.first().map(Label::is_outside).unwrap_or(true) {
            close_from(0, i, &open_starts, &open_types, &mut entities);
            open_starts.clear();
            open_types.clear();
            continue;
        }

        for (d, label) in stack.iter().enumerate() {
            // Pilhas normalizadas não contêm Outside fora da posição 0.
            let t = match label.entity_type() {
                Some(t) => t,
                None => break,
            };
            if d < open_types.len() {
                if label.is_begin() || open_types[d] != t {
                    // Fechamento em cascata: a profundidade d muda, então
                    // tudo aninhado nela termina aqui também.
                    close_from(d, i, &open_starts, &open_types, &mut entities);
                    open_starts.truncate(d);
                    open_types.truncate(d);
                    open_starts.push(i);
                }
            } else {
                open_starts.push(i);
            }
        }

        // A pilha encolheu: as profundidades excedentes fecham neste token.
        if stack.len() < open_types.len() {
            close_from(stack.len(), i, &open_starts, &open_types, &mut entities);
        }

        open_types = stack
            .iter()
            .filter_map(|l| l.entity_type().map(str::to_string))
            .collect();
        open_starts.truncate(open_types.len());
    }

    // Fim da sentença fecha tudo que restou aberto.
    close_from(0, n, &open_starts, &open_types, &mut entities);

    let mut sorted: Vec<Entity> = entities
        .into_iter()
        .map(|((start, end, label), depth)| Entity { start, end, label, depth })
        .collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.depth.cmp(&b.depth))
    });

    let stacks = rebuild_stacks(&sorted, n);
    (sorted, stacks)
}

/// Reconstrói as pilhas normalizadas repetindo o conjunto ordenado de
/// entidades: cada entidade contribui `B-tipo` no token inicial e `I-tipo`
/// nos seguintes, na posição de pilha dada pela sua ordem entre as entidades
/// abertas (externas ocupam posições mais baixas).
fn rebuild_stacks(entities: &[Entity], n_tokens: usize) -> Vec<LabelStack> {
    let mut stacks: Vec<LabelStack> = vec![LabelStack::new(); n_tokens];
    for e in entities {
        for i in e.start..e.end.min(n_tokens) {
            stacks[i].push(if i == e.start {
                Label::Begin(e.label.clone())
            } else {
                Label::Inside(e.label.clone())
            });
        }
    }
    for stack in &mut stacks {
        if stack.is_empty() {
            stack.push(Label::Outside);
        }
    }
    stacks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{format_stack, parse_stack};

    fn stacks_of(raw: &[&str]) -> Vec<LabelStack> {
        raw.iter().map(|r| parse_stack(r, 5)).collect()
    }

    fn formatted(stacks: &[LabelStack]) -> Vec<String> {
        stacks.iter().map(|s| format_stack(s)).collect()
    }

    fn assert_well_nested(entities: &[Entity]) {
        for (i, a) in entities.iter().enumerate() {
            assert!(a.end > a.start, "span vazio: {:?}", a);
            for b in &entities[i + 1..] {
                assert!(
                    a.disjoint(b) || a.contains(b) || b.contains(a) ||
                        (a.start == b.start && a.end == b.end),
                    "sobreposição parcial: {:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_nested_example() {
        // O, O, B-P|B-pf, I-P|B-ps, O  →  P cobre os tokens 2..4,
        // com pf (2..3) e ps (3..4) aninhados.
        let (entities, stacks) =
            reconstruct(&stacks_of(&["O", "O", "B-P|B-pf", "I-P|B-ps", "O"]));
        assert_eq!(
            entities,
            vec![
                Entity { start: 2, end: 4, label: "P".to_string(), depth: 0 },
                Entity { start: 2, end: 3, label: "pf".to_string(), depth: 1 },
                Entity { start: 3, end: 4, label: "ps".to_string(), depth: 1 },
            ]
        );
        assert_eq!(
            formatted(&stacks),
            vec!["O", "O", "B-P|B-pf", "I-P|B-ps", "O"]
        );
    }

    #[test]
    fn test_idempotence() {
        let inputs: Vec<Vec<&str>> = vec![
            vec!["O", "B-P|B-pf", "I-P|B-ps", "O"],
            vec!["B-io", "I-io", "I-io|B-gu", "I-io|I-gu"],
            vec!["B-a", "B-a", "I-a"],
        ];
        for input in inputs {
            let (_, once) = reconstruct(&stacks_of(&input));
            let (_, twice) = reconstruct(&once);
            assert_eq!(once, twice, "não idempotente para {:?}", input);
        }
    }

    #[test]
    fn test_inside_without_begin_becomes_entity() {
        // I- órfão vira uma entidade normal começando ali.
        let (entities, stacks) = reconstruct(&stacks_of(&["I-P", "I-P", "O"]));
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0], Entity { start: 0, end: 2, label: "P".to_string(), depth: 0 });
        assert_eq!(formatted(&stacks), vec!["B-P", "I-P", "O"]);
    }

    #[test]
    fn test_cascading_close_on_outer_change() {
        // A entidade externa muda de tipo no token 2: a interna é forçada a
        // fechar junto, mesmo que seu rótulo "continuasse".
        let (entities, _) =
            reconstruct(&stacks_of(&["B-a|B-x", "I-a|I-x", "B-b|I-x"]));
        assert_well_nested(&entities);
        assert!(entities.contains(&Entity { start: 0, end: 2, label: "a".to_string(), depth: 0 }));
        assert!(entities.contains(&Entity { start: 0, end: 2, label: "x".to_string(), depth: 1 }));
        // o I-x do token 2 reabre como nova entidade aninhada em b
        assert!(entities.contains(&Entity { start: 2, end: 3, label: "b".to_string(), depth: 0 }));
        assert!(entities.contains(&Entity { start: 2, end: 3, label: "x".to_string(), depth: 1 }));
    }

    #[test]
    fn test_shrinking_stack_closes_inner() {
        let (entities, stacks) =
            reconstruct(&stacks_of(&["B-io", "I-io|B-gu", "I-io", "O"]));
        assert_eq!(
            entities,
            vec![
                Entity { start: 0, end: 3, label: "io".to_string(), depth: 0 },
                Entity { start: 1, end: 2, label: "gu".to_string(), depth: 1 },
            ]
        );
        assert_eq!(formatted(&stacks), vec!["B-io", "I-io|B-gu", "I-io", "O"]);
    }

    #[test]
    fn test_adversarial_inputs_stay_well_nested() {
        let adversarial: Vec<Vec<&str>> = vec![
            vec!["I-a|I-b|I-c", "B-c|I-a", "I-c|B-a|B-a", "O", "I-b"],
            vec!["B-a|B-b", "I-b|I-a", "B-b|B-a", "I-a|I-a|I-a"],
            vec!["B-x", "B-x|B-x|B-x", "I-x", "B-y|I-x", "I-y"],
        ];
        for input in adversarial {
            let (entities, stacks) = reconstruct(&stacks_of(&input));
            assert_well_nested(&entities);
            // e o resultado normalizado é um ponto fixo
            let (_, twice) = reconstruct(&stacks);
            assert_eq!(stacks, twice);
        }
    }

    #[test]
    fn test_duplicate_spans_are_merged() {
        // B-a seguido de B-a|… nunca deve produzir a mesma tupla duas vezes.
        let (entities, _) = reconstruct(&stacks_of(&["B-a|B-a", "I-a|I-a"]));
        let mut keys: Vec<(usize, usize, &str)> = entities
            .iter()
            .map(|e| (e.start, e.end, e.label.as_str()))
            .collect();
        keys.dedup();
        assert_eq!(keys.len(), entities.len());
    }

    #[test]
    fn test_unterminated_entities_close_at_sentence_end() {
        let (entities, _) = reconstruct(&stacks_of(&["B-P", "I-P"]));
        assert_eq!(entities, vec![Entity { start: 0, end: 2, label: "P".to_string(), depth: 0 }]);
    }

    #[test]
    fn test_empty_sentence() {
        let (entities, stacks) = reconstruct(&[]);
        assert!(entities.is_empty());
        assert!(stacks.is_empty());
    }
}
