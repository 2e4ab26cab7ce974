//! # Modelo de Token e Sentença
//!
//! Unidades imutáveis produzidas pela tokenização. Diferente de tokenizadores
//! que guardam apenas offsets, cada token aqui carrega o **espaçamento exato**
//! que o cerca no texto original. Essa informação é o que permite ao
//! codificador XML devolver o texto byte a byte, apenas inserindo tags.
//!
//! ## Invariante de reconstrução
//!
//! Para entrada no modo `untokenized`, a concatenação de
//! `spaces_before + form + spaces_after` de todos os tokens, na ordem,
//! reproduz o texto de entrada exatamente.

use serde::{Deserialize, Serialize};

use crate::conllu::ConlluSentence;

/// Um token de superfície com seu espaçamento original.
///
/// O `Token` é a unidade atômica do pipeline. Uma vez criado pela
/// tokenização, nunca é alterado: os estágios seguintes (tagger,
/// reconstrutor, codificadores) apenas o leem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// A forma do token (ex: "Jan", ",", "Novák").
    pub form: String,
    /// Espaços em branco imediatamente antes do token (normalmente vazio,
    /// exceto no início do texto ou da sentença).
    pub spaces_before: String,
    /// Espaços em branco imediatamente depois do token, até o token seguinte.
    pub spaces_after: String,
    /// Posição sequencial do token dentro da sentença (0, 1, 2...).
    pub index: usize,
}

impl Token {
    /// Cria um token sem espaçamento (útil em testes e nos leitores de
    /// formatos verticais, que não preservam espaços do texto original).
    pub fn new(form: impl Into<String>, index: usize) -> Self {
        Self {
            form: form.into(),
            spaces_before: String::new(),
            spaces_after: String::new(),
            index,
        }
    }
}

/// Uma sentença tokenizada.
///
/// Quando a entrada é CoNLL-U, a sentença de origem é retida em `conllu`
/// para que o codificador de anotações (`NE=` em MISC) possa reescrevê-la
/// com as entidades reconhecidas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub tokens: Vec<Token>,
    /// Sentença CoNLL-U original (apenas no modo de entrada `conllu`).
    pub conllu: Option<ConlluSentence>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, conllu: None }
    }

    /// Constrói uma sentença a partir de formas puras, para testes e para o
    /// leitor vertical.
    pub fn from_forms<S: AsRef<str>>(forms: &[S]) -> Self {
        Self::new(
            forms
                .iter()
                .enumerate()
                .map(|(i, f)| Token::new(f.as_ref(), i))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_forms_indexes_tokens() {
        let s = Sentence::from_forms(&["Jan", "Novák", "."]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.tokens[1].form, "Novák");
        assert_eq!(s.tokens[2].index, 2);
    }
}
