//! # Codificador XML
//!
//! Serializa sentenças anotadas como XML inline: `<sentence>`, `<token>` e
//! `<ne type="...">` para cada entidade, com as tags `<ne>` espelhando as
//! profundidades de aninhamento.
//!
//! ## Contrato de fidelidade
//!
//! O espaçamento original é emitido **verbatim** entre as tags (apenas
//! escapado): removendo todas as tags `<sentence>`, `<token>` e `<ne …>` da
//! saída e desfazendo o escape, obtém-se exatamente os bytes do texto de
//! entrada. Nada de espaço é inserido, removido ou reordenado.
//!
//! A varredura é única, da esquerda para a direita, sobre as pilhas já
//! normalizadas pelo reconstrutor — entrada bem aninhada é pré-condição, e é
//! o reconstrutor quem a garante.

use crate::label::Label;
use crate::reconstruct::TaggedSentence;

/// Escapa os metacaracteres XML (`& < > "`).
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Codifica um lote de sentenças como XML inline.
///
/// Serve tanto a rota de reconhecimento quanto a de tokenização pura (pilhas
/// todas `O` produzem apenas `<sentence>`/`<token>`).
pub fn to_xml(sentences: &[TaggedSentence]) -> String {
    let mut out = String::new();

    for sentence in sentences {
        out.push_str("<sentence>");
        // tipos das entidades abertas, externa → interna
        let mut open: Vec<String> = Vec::new();
        let mut pending_spaces = String::new();

        for (token, stack) in sentence.tokens.iter().zip(&sentence.stacks) {
            let mut opening = String::new();

            if stack.first().map(Label::is_outside).unwrap_or(true) {
                for _ in 0..open.len() {
                    out.push_str("</ne>");
                }
                open.clear();
            } else {
                for (d, label) in stack.iter().enumerate() {
                    let t = match label.entity_type() {
                        Some(t) => t,
                        None => break,
                    };
                    if d < open.len() {
                        if label.is_begin() || open[d] != t {
                            // A entidade nesta profundidade termina aqui e
                            // leva consigo todas as aninhadas.
                            for _ in d..open.len() {
                                out.push_str("</ne>");
                            }
                            open.truncate(d);
                            opening.push_str(&format!("<ne type=\"{}\">", escape_xml(t)));
                            open.push(t.to_string());
                        }
                    } else {
                        opening.push_str(&format!("<ne type=\"{}\">", escape_xml(t)));
                        open.push(t.to_string());
                    }
                }
                // Pilha mais curta: as entidades internas terminaram no token
                // anterior, então as tags fecham antes do espaçamento atual.
                if stack.len() < open.len() {
                    for _ in stack.len()..open.len() {
                        out.push_str("</ne>");
                    }
                    open.truncate(stack.len());
                }
            }

            out.push_str(&pending_spaces);
            out.push_str(&escape_xml(&token.spaces_before));
            out.push_str(&opening);
            out.push_str("<token>");
            out.push_str(&escape_xml(&token.form));
            out.push_str("</token>");
            pending_spaces = escape_xml(&token.spaces_after);
        }

        for _ in 0..open.len() {
            out.push_str("</ne>");
        }
        out.push_str("</sentence>");
        out.push_str(&pending_spaces);
    }

    out
}
