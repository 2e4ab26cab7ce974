//! # Rótulos BIO empilhados
//!
//! Esquema de anotação **BIO** (Begin-Inside-Outside) com suporte a
//! aninhamento: cada token recebe uma *pilha* de rótulos, do mais externo ao
//! mais interno. Ex: em "Jan Novák", o token "Jan" recebe `B-P|B-pf`
//! (começa uma pessoa `P` e, aninhado nela, um primeiro nome `pf`).
//!
//! ## Esquema
//!
//! - `B-tipo`: primeiro token de uma entidade daquele tipo e profundidade.
//! - `I-tipo`: continuação da entidade.
//! - `O`: fora de qualquer entidade — sempre sozinho numa pilha válida.
//!
//! Os tipos são strings abertas (dependem do modelo servido), diferente de um
//! enum fechado: o mesmo servidor pode servir modelos CNEC (`P`, `pf`, `gu`…)
//! e modelos CoNLL (`PER`, `LOC`…).
//!
//! O parse de strings cruas acontece **uma única vez**, aqui; todo o resto do
//! pipeline opera sobre [`Label`], nunca sobre prefixos de string.

use serde::{Deserialize, Serialize};

/// Um rótulo BIO com tipo aberto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// O token não faz parte de nenhuma entidade (nesta profundidade).
    Outside,
    /// Início de uma entidade do tipo dado.
    Begin(String),
    /// Continuação de uma entidade do tipo dado.
    Inside(String),
}

impl Label {
    /// Parseia um rótulo cru do tagger.
    ///
    /// Qualquer string que não seja `B-…` nem `I-…` é tratada como `Outside`
    /// — isso inclui o `O` legítimo e lixo de decodificação, que o
    /// reconstrutor recupera por truncamento (ver [`parse_stack`]).
    pub fn parse(raw: &str) -> Label {
        if let Some(t) = raw.strip_prefix("B-") {
            Label::Begin(t.to_string())
        } else if let Some(t) = raw.strip_prefix("I-") {
            Label::Inside(t.to_string())
        } else {
            Label::Outside
        }
    }

    /// Representação textual ("B-P", "I-gu", "O").
    pub fn label(&self) -> String {
        match self {
            Label::Begin(t) => format!("B-{}", t),
            Label::Inside(t) => format!("I-{}", t),
            Label::Outside => "O".to_string(),
        }
    }

    /// Tipo da entidade, se o rótulo for `B-` ou `I-`.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Label::Begin(t) | Label::Inside(t) => Some(t),
            Label::Outside => None,
        }
    }

    pub fn is_begin(&self) -> bool {
        matches!(self, Label::Begin(_))
    }

    pub fn is_outside(&self) -> bool {
        matches!(self, Label::Outside)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Pilha de rótulos de um token, do mais externo (posição 0) ao mais interno.
pub type LabelStack = Vec<Label>;

/// Normaliza uma pilha crua de rótulos do tagger.
///
/// Políticas de recuperação para saída malformada do decodificador:
/// - pilha vazia → `[Outside]`;
/// - um `O` (ou rótulo imparseável) no meio da pilha **trunca** a pilha ali
///   — `O` só é válido sozinho;
/// - a pilha é limitada a `max_depth` rótulos.
///
/// Nenhum desses casos é um erro: a recuperação é local e silenciosa.
pub fn normalize_stack<S: AsRef<str>>(raw: &[S], max_depth: usize) -> LabelStack {
    let mut stack = LabelStack::new();
    for part in raw.iter().take(max_depth) {
        let label = Label::parse(part.as_ref());
        if label.is_outside() {
            break;
        }
        stack.push(label);
    }
    if stack.is_empty() {
        stack.push(Label::Outside);
    }
    stack
}

/// Parseia a representação textual de uma pilha (`"B-P|B-pf"` ou `"O"`).
pub fn parse_stack(raw: &str, max_depth: usize) -> LabelStack {
    let parts: Vec<&str> = raw.split('|').collect();
    normalize_stack(&parts, max_depth)
}

/// Formata uma pilha como texto (`"B-P|B-pf"`, ou `"O"` para pilha fora de
/// entidade).
pub fn format_stack(stack: &[Label]) -> String {
    if stack.first().map(Label::is_outside).unwrap_or(true) {
        "O".to_string()
    } else {
        stack
            .iter()
            .map(Label::label)
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(Label::parse("O"), Label::Outside);
        assert_eq!(Label::parse("B-P"), Label::Begin("P".to_string()));
        assert_eq!(Label::parse("I-gu"), Label::Inside("gu".to_string()));
        // lixo vira Outside
        assert_eq!(Label::parse("XYZ"), Label::Outside);
    }

    #[test]
    fn test_label_roundtrip() {
        for raw in ["O", "B-P", "I-ps"] {
            assert_eq!(Label::parse(raw).label(), raw);
        }
    }

    #[test]
    fn test_normalize_empty_stack() {
        let raw: [&str; 0] = [];
        assert_eq!(normalize_stack(&raw, 5), vec![Label::Outside]);
    }

    #[test]
    fn test_normalize_truncates_at_stray_outside() {
        // "O" no meio da pilha é saída malformada do decodificador:
        // tudo a partir dele é descartado.
        let stack = normalize_stack(&["B-P", "O", "B-pf"], 5);
        assert_eq!(stack, vec![Label::Begin("P".to_string())]);
    }

    #[test]
    fn test_normalize_clamps_depth() {
        let stack = normalize_stack(&["B-a", "B-b", "B-c"], 2);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_format_stack() {
        assert_eq!(format_stack(&[Label::Outside]), "O");
        assert_eq!(
            format_stack(&[
                Label::Begin("P".to_string()),
                Label::Begin("pf".to_string())
            ]),
            "B-P|B-pf"
        );
    }

    #[test]
    fn test_parse_stack_text() {
        let stack = parse_stack("I-P|B-ps", 5);
        assert_eq!(
            stack,
            vec![
                Label::Inside("P".to_string()),
                Label::Begin("ps".to_string())
            ]
        );
    }
}
