//! # CoNLL-U: leitura, escrita e fusão de anotações
//!
//! Modelo mínimo de CoNLL-U, suficiente para o ciclo completo do servidor:
//! parsear a entrada, extrair os tokens de superfície para o tagger e
//! devolver o documento original com as entidades reconhecidas **fundidas**
//! no campo MISC (`NE=Tipo_id` ou `NE=Tipo_id-Tipo_id` para aninhamento).
//!
//! Cada entidade recebe um id inteiro globalmente único e estritamente
//! crescente ao longo de toda a sessão de streaming — o contador entra e sai
//! de cada chamada explicitamente, para que entidades de lotes diferentes
//! permaneçam distinguíveis.
//!
//! Tudo que não é tocado (comentários, lemas, árvore de dependências, nós
//! vazios) é reescrito verbatim.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::label::{Label, LabelStack};
use crate::token::Token;

/// Uma palavra sintática (linha com id inteiro).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConlluWord {
    /// Id 1-based dentro da sentença.
    pub id: usize,
    pub form: String,
    /// Colunas LEMMA..DEPS, preservadas como vieram.
    pub lemma: String,
    pub upos: String,
    pub xpos: String,
    pub feats: String,
    pub head: String,
    pub deprel: String,
    pub deps: String,
    /// Coluna MISC com `_` traduzido para vazio (e de volta na escrita).
    pub misc: String,
}

/// Um token multipalavra (linha com id `primeiro-último`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConlluMultiword {
    pub id_first: usize,
    pub id_last: usize,
    pub form: String,
    /// Colunas LEMMA..DEPS (normalmente todas `_`).
    pub columns: [String; 7],
    pub misc: String,
}

/// Uma sentença CoNLL-U.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConlluSentence {
    /// Linhas `# …` que precedem a sentença.
    pub comments: Vec<String>,
    pub words: Vec<ConlluWord>,
    /// Tokens multipalavra, em ordem de `id_first`.
    pub multiwords: Vec<ConlluMultiword>,
    /// Nós vazios (ids `n.m`), reescritos verbatim: (id da palavra âncora,
    /// linha crua). Âncora 0 = antes da primeira palavra.
    pub empty_nodes: Vec<(usize, String)>,
}

const COLUMNS: usize = 10;

fn parse_error(message: impl Into<String>) -> Error {
    Error::InvalidInput {
        format: "conllu".to_string(),
        message: message.into(),
    }
}

/// Parseia um documento CoNLL-U completo.
pub fn parse_conllu(text: &str) -> Result<Vec<ConlluSentence>, Error> {
    let mut sentences = Vec::new();
    let mut current = ConlluSentence::default();

    for (lineno, line) in text.lines().enumerate() {
        let fail = |message: String| parse_error(format!("line {}: {}", lineno + 1, message));

        if line.is_empty() {
            if !current.words.is_empty() || !current.comments.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            current.comments.push(line.to_string());
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != COLUMNS {
            return Err(fail(format!("expected {} columns, found {}", COLUMNS, cols.len())));
        }

        let id = cols[0];
        if let Some((first, last)) = id.split_once('-') {
            let id_first: usize = first
                .parse()
                .map_err(|_| fail(format!("invalid multiword id '{}'", id)))?;
            let id_last: usize = last
                .parse()
                .map_err(|_| fail(format!("invalid multiword id '{}'", id)))?;
            if id_first > id_last || id_first != current.words.len() + 1 {
                return Err(fail(format!("multiword range '{}' out of order", id)));
            }
            current.multiwords.push(ConlluMultiword {
                id_first,
                id_last,
                form: cols[1].to_string(),
                columns: [
                    cols[2].to_string(),
                    cols[3].to_string(),
                    cols[4].to_string(),
                    cols[5].to_string(),
                    cols[6].to_string(),
                    cols[7].to_string(),
                    cols[8].to_string(),
                ],
                misc: read_misc(cols[9]),
            });
        } else if id.contains('.') {
            current
                .empty_nodes
                .push((current.words.len(), line.to_string()));
        } else {
            let id: usize = id
                .parse()
                .map_err(|_| fail(format!("invalid word id '{}'", id)))?;
            if id != current.words.len() + 1 {
                return Err(fail(format!("word id {} out of order", id)));
            }
            current.words.push(ConlluWord {
                id,
                form: cols[1].to_string(),
                lemma: cols[2].to_string(),
                upos: cols[3].to_string(),
                xpos: cols[4].to_string(),
                feats: cols[5].to_string(),
                head: cols[6].to_string(),
                deprel: cols[7].to_string(),
                deps: cols[8].to_string(),
                misc: read_misc(cols[9]),
            });
        }
    }
    if !current.words.is_empty() || !current.comments.is_empty() {
        sentences.push(current);
    }
    Ok(sentences)
}

/// Escreve uma sentença de volta como CoNLL-U, com a linha em branco final.
pub fn write_conllu(sentence: &ConlluSentence) -> String {
    let mut out = String::new();
    for comment in &sentence.comments {
        out.push_str(comment);
        out.push('\n');
    }

    let mut multiword = 0;
    let mut empty = 0;
    // nós vazios ancorados antes da primeira palavra
    while empty < sentence.empty_nodes.len() && sentence.empty_nodes[empty].0 == 0 {
        out.push_str(&sentence.empty_nodes[empty].1);
        out.push('\n');
        empty += 1;
    }
    for word in &sentence.words {
        if multiword < sentence.multiwords.len()
            && sentence.multiwords[multiword].id_first == word.id
        {
            let mw = &sentence.multiwords[multiword];
            out.push_str(&format!(
                "{}-{}\t{}\t{}\t{}\n",
                mw.id_first,
                mw.id_last,
                mw.form,
                mw.columns.join("\t"),
                write_misc(&mw.misc)
            ));
            multiword += 1;
        }
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            word.id,
            word.form,
            word.lemma,
            word.upos,
            word.xpos,
            word.feats,
            word.head,
            word.deprel,
            word.deps,
            write_misc(&word.misc)
        ));
        while empty < sentence.empty_nodes.len() && sentence.empty_nodes[empty].0 == word.id {
            out.push_str(&sentence.empty_nodes[empty].1);
            out.push('\n');
            empty += 1;
        }
    }
    out.push('\n');
    out
}

/// Extrai os tokens de superfície de uma sentença: um token multipalavra
/// conta como um único token, consumindo suas palavras.
pub fn surface_tokens(sentence: &ConlluSentence) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = 1usize;
    let mut multiword = 0usize;
    while word <= sentence.words.len() {
        let (form, misc) = if multiword < sentence.multiwords.len()
            && sentence.multiwords[multiword].id_first == word
        {
            let mw = &sentence.multiwords[multiword];
            word = mw.id_last + 1;
            multiword += 1;
            (mw.form.clone(), mw.misc.as_str())
        } else {
            let w = &sentence.words[word - 1];
            word += 1;
            (w.form.clone(), w.misc.as_str())
        };
        let last = word > sentence.words.len();
        tokens.push(Token {
            form,
            spaces_before: String::new(),
            spaces_after: if last {
                "\n".to_string()
            } else if misc_has_no_space(misc) {
                String::new()
            } else {
                " ".to_string()
            },
            index: tokens.len(),
        });
    }
    tokens
}

/// Funde as entidades reconhecidas no MISC das sentenças, consumindo e
/// devolvendo o contador global de ids de entidade.
///
/// Pré-condição: `stacks[i]` são as pilhas **normalizadas** dos tokens de
/// superfície da sentença `i` (o reconstrutor garante que toda entidade
/// começa com `B-`). Campos `NE=` pré-existentes são removidos antes da
/// escrita, inclusive em tokens sem entidade nova.
pub fn merge_entities(
    sentences: &mut [ConlluSentence],
    stacks: &[Vec<LabelStack>],
    next_ne_id: u64,
) -> u64 {
    let mut ne_id = next_ne_id;

    for (sentence, sentence_stacks) in sentences.iter_mut().zip(stacks) {
        let mut open_ids: Vec<u64> = Vec::new();
        let mut word = 1usize;
        let mut multiword = 0usize;

        for stack in sentence_stacks {
            let nes_encoded = if stack.first().map(Label::is_outside).unwrap_or(true) {
                open_ids.clear();
                String::new()
            } else {
                for (d, label) in stack.iter().enumerate() {
                    if d < open_ids.len() {
                        if label.is_begin() {
                            // a entidade anterior nesta profundidade acabou;
                            // fecha junto tudo que estava aninhado nela
                            open_ids.truncate(d);
                            open_ids.push(ne_id);
                            ne_id += 1;
                        }
                    } else {
                        open_ids.push(ne_id);
                        ne_id += 1;
                    }
                }
                open_ids.truncate(stack.len());
                stack
                    .iter()
                    .zip(&open_ids)
                    .filter_map(|(label, id)| {
                        label.entity_type().map(|t| format!("{}_{}", t, id))
                    })
                    .collect::<Vec<_>>()
                    .join("-")
            };

            // palavras consumidas por este token de superfície
            let mut words_in_token = 1;
            if multiword < sentence.multiwords.len()
                && sentence.multiwords[multiword].id_first == word
            {
                let mw = &mut sentence.multiwords[multiword];
                words_in_token = mw.id_last - mw.id_first + 1;
                mw.misc = annotate_misc(&mw.misc, &nes_encoded);
                multiword += 1;
            }
            for _ in 0..words_in_token {
                if let Some(w) = sentence.words.get_mut(word - 1) {
                    w.misc = annotate_misc(&w.misc, &nes_encoded);
                }
                word += 1;
            }
        }
    }

    ne_id
}

fn read_misc(column: &str) -> String {
    if column == "_" {
        String::new()
    } else {
        column.to_string()
    }
}

fn write_misc(misc: &str) -> &str {
    if misc.is_empty() {
        "_"
    } else {
        misc
    }
}

fn misc_has_no_space(misc: &str) -> bool {
    misc.split('|').any(|field| field == "SpaceAfter=No")
}

/// Remove campos `NE=` pré-existentes e anexa a nova anotação, se houver.
fn annotate_misc(misc: &str, nes_encoded: &str) -> String {
    let mut cleaned: String = misc
        .split('|')
        .filter(|field| !field.is_empty() && !field.starts_with("NE="))
        .collect::<Vec<_>>()
        .join("|");
    if !nes_encoded.is_empty() {
        if !cleaned.is_empty() {
            cleaned.push('|');
        }
        cleaned.push_str("NE=");
        cleaned.push_str(nes_encoded);
    }
    cleaned
}
