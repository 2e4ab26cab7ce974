//! # Interface de Tagger e backend de léxico
//!
//! O tagger é, para o resto do sistema, uma caixa-preta: recebe os tokens de
//! uma sentença e devolve uma pilha de rótulos **crus** por token. A saída
//! pode ser malformada (o reconstrutor a saneia); o que o contrato exige é
//! uma pilha por token, limitada ao máximo de rótulos configurado.
//!
//! O backend embutido, [`LexiconTagger`], reconhece entidades por listas:
//! nomes de pessoa com os subtipos aninhados (pessoa `P` contendo primeiro
//! nome `pf` e sobrenome `ps`), cidades `gu`, instituições `io` — inclusive
//! instituições que contêm uma cidade aninhada ("Universidade de São Paulo"
//! contém "São Paulo"). Serve de modelo padrão e de fixture de testes; um
//! backend neural implementaria o mesmo trait.

use crate::error::Error;
use crate::token::Token;

/// Uma pilha crua de rótulos por token, como o tagger a emite.
pub type RawStack = Vec<String>;

/// Interface de um modelo de reconhecimento.
///
/// Implementações devem ser seguras para invocação concorrente somente-leitura
/// a partir de vários workers (`Send + Sync`).
pub trait Tagger: Send + Sync {
    /// Prediz uma pilha de rótulos crus para cada token da sentença.
    fn predict(&self, tokens: &[Token]) -> Result<Vec<RawStack>, Error>;

    /// Operações que o modelo suporta, para a listagem de `/models`.
    fn capabilities(&self) -> Vec<&'static str> {
        vec!["tokenize", "recognize"]
    }
}

/// Uma entrada do léxico: sequência de formas e a pilha de rótulos crus que
/// cada forma recebe.
struct LexiconEntry {
    forms: Vec<String>,
    stacks: Vec<RawStack>,
}

/// Tagger por léxico, com correspondência gulosa (a entrada mais longa que
/// casar a partir do token corrente vence).
pub struct LexiconTagger {
    entries: Vec<LexiconEntry>,
}

impl LexiconTagger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Léxico embutido em PT-BR, com entidades aninhadas.
    pub fn builtin() -> Self {
        let mut tagger = Self::new();

        // pessoas: P contendo pf (primeiro nome) e ps (sobrenome)
        for (first, last) in [
            ("Machado", "Assis"),
            ("Santos", "Dumont"),
            ("Carlos", "Chagas"),
            ("Paulo", "Freire"),
        ] {
            tagger.add_person(first, last);
        }

        // cidades
        for city in ["São Paulo", "Rio de Janeiro", "Belo Horizonte", "Praga"] {
            tagger.add_phrase(city, "gu");
        }

        // instituições, algumas com cidade aninhada
        tagger.add_phrase("Universidade Federal de Minas Gerais", "io");
        tagger.add_institution_with_city("Universidade de", "São Paulo");
        tagger.add_institution_with_city("Universidade Federal do", "Rio de Janeiro");

        tagger
    }

    /// Nome completo: `B-P|B-pf  I-P|B-ps` (com `I-ps` para sobrenomes
    /// compostos).
    pub fn add_person(&mut self, first: &str, last: &str) {
        let mut forms = vec![first.to_string()];
        let mut stacks: Vec<RawStack> =
            vec![vec!["B-P".to_string(), "B-pf".to_string()]];
        for (i, part) in last.split_whitespace().enumerate() {
            forms.push(part.to_string());
            let sub = if i == 0 { "B-ps" } else { "I-ps" };
            stacks.push(vec!["I-P".to_string(), sub.to_string()]);
        }
        self.entries.push(LexiconEntry { forms, stacks });
    }

    /// Entidade plana de múltiplas palavras: `B-t I-t I-t…`.
    pub fn add_phrase(&mut self, phrase: &str, label: &str) {
        let forms: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();
        let stacks = forms
            .iter()
            .enumerate()
            .map(|(i, _)| {
                vec![format!("{}-{}", if i == 0 { "B" } else { "I" }, label)]
            })
            .collect();
        self.entries.push(LexiconEntry { forms, stacks });
    }

    /// Instituição cujo final é uma cidade aninhada:
    /// `B-io … I-io|B-gu I-io|I-gu`.
    pub fn add_institution_with_city(&mut self, head: &str, city: &str) {
        let mut forms: Vec<String> = head.split_whitespace().map(str::to_string).collect();
        let mut stacks: Vec<RawStack> = forms
            .iter()
            .enumerate()
            .map(|(i, _)| vec![format!("{}-io", if i == 0 { "B" } else { "I" })])
            .collect();
        for (i, part) in city.split_whitespace().enumerate() {
            forms.push(part.to_string());
            stacks.push(vec![
                "I-io".to_string(),
                format!("{}-gu", if i == 0 { "B" } else { "I" }),
            ]);
        }
        self.entries.push(LexiconEntry { forms, stacks });
    }

    /// Maior entrada do léxico que casa a partir de `start`.
    fn best_match(&self, tokens: &[Token], start: usize) -> Option<&LexiconEntry> {
        self.entries
            .iter()
            .filter(|e| {
                tokens[start..].len() >= e.forms.len()
                    && e.forms
                        .iter()
                        .zip(&tokens[start..])
                        .all(|(form, token)| *form == token.form)
            })
            .max_by_key(|e| e.forms.len())
    }
}

impl Default for LexiconTagger {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Tagger for LexiconTagger {
    fn predict(&self, tokens: &[Token]) -> Result<Vec<RawStack>, Error> {
        let mut stacks: Vec<RawStack> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            match self.best_match(tokens, i) {
                Some(entry) => {
                    stacks.extend(entry.stacks.iter().cloned());
                    i += entry.forms.len();
                }
                None => {
                    stacks.push(vec!["O".to_string()]);
                    i += 1;
                }
            }
        }
        Ok(stacks)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tagger de teste que falha na n-ésima sentença (contando de 1).
    pub struct FailingTagger {
        calls: AtomicUsize,
        pub fail_on: usize,
    }

    impl FailingTagger {
        pub fn new(fail_on: usize) -> Self {
            Self { calls: AtomicUsize::new(0), fail_on }
        }
    }

    impl Tagger for FailingTagger {
        fn predict(&self, tokens: &[Token]) -> Result<Vec<RawStack>, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(Error::Processing("simulated backend failure".to_string()));
            }
            Ok(tokens.iter().map(|_| vec!["O".to_string()]).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Sentence;

    #[test]
    fn test_person_gets_nested_stacks() {
        let tagger = LexiconTagger::builtin();
        let s = Sentence::from_forms(&["Li", "Machado", "Assis", "ontem", "."]);
        let stacks = tagger.predict(&s.tokens).unwrap();
        assert_eq!(stacks[0], vec!["O"]);
        assert_eq!(stacks[1], vec!["B-P", "B-pf"]);
        assert_eq!(stacks[2], vec!["I-P", "B-ps"]);
        assert_eq!(stacks[3], vec!["O"]);
    }

    #[test]
    fn test_longest_match_wins() {
        // "Universidade de São Paulo" deve vencer a cidade "São Paulo"
        let tagger = LexiconTagger::builtin();
        let s = Sentence::from_forms(&["Universidade", "de", "São", "Paulo"]);
        let stacks = tagger.predict(&s.tokens).unwrap();
        assert_eq!(stacks[0], vec!["B-io"]);
        assert_eq!(stacks[2], vec!["I-io", "B-gu"]);
        assert_eq!(stacks[3], vec!["I-io", "I-gu"]);
    }

    #[test]
    fn test_city_alone() {
        let tagger = LexiconTagger::builtin();
        let s = Sentence::from_forms(&["Moro", "em", "São", "Paulo"]);
        let stacks = tagger.predict(&s.tokens).unwrap();
        assert_eq!(stacks[2], vec!["B-gu"]);
        assert_eq!(stacks[3], vec!["I-gu"]);
    }

    #[test]
    fn test_one_stack_per_token() {
        let tagger = LexiconTagger::builtin();
        let s = Sentence::from_forms(&["a", "b", "Praga", "c"]);
        let stacks = tagger.predict(&s.tokens).unwrap();
        assert_eq!(stacks.len(), 4);
    }
}
