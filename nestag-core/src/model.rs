//! # Registro de modelos
//!
//! Cada modelo é registrado a partir de uma *especificação* textual no formato
//! `nome:alias1:alias2:…`. Além dos aliases explícitos, o nome completo gera
//! aliases por truncamento em hífens: `ptbr-lexicon-250301` também responde
//! por `ptbr-lexicon` e `ptbr`. Quando dois modelos disputam um alias, o
//! **primeiro registrado vence** — a ordem de registro define as versões
//! padrão.
//!
//! O carregamento é preguiçoso: o registro guarda apenas a fábrica até a
//! primeira requisição que precise do modelo, e o `Mutex` garante que a
//! fábrica roda no máximo uma vez mesmo sob requisições concorrentes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::tagger::Tagger;

type TaggerFactory = Box<dyn Fn() -> Arc<dyn Tagger> + Send + Sync>;

/// Um modelo registrado: metadados imediatos, tagger sob demanda.
pub struct Model {
    name: String,
    acknowledgements: String,
    factory: TaggerFactory,
    loaded: Mutex<Option<Arc<dyn Tagger>>>,
}

impl Model {
    /// Nome canônico (completo) do modelo.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acknowledgements(&self) -> &str {
        &self.acknowledgements
    }

    /// Operações suportadas, para a listagem de `/models`.
    ///
    /// Fixas por construção: todo backend atual tokeniza e reconhece. Não
    /// carrega o modelo.
    pub fn capabilities(&self) -> Vec<&'static str> {
        vec!["tokenize", "recognize"]
    }

    /// Devolve o tagger, carregando-o na primeira chamada.
    pub fn tagger(&self) -> Arc<dyn Tagger> {
        let mut slot = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(|| (self.factory)()).clone()
    }
}

/// Registro de modelos e seus aliases.
pub struct ModelRegistry {
    models: Vec<Arc<Model>>,
    by_alias: HashMap<String, Arc<Model>>,
    default_model: String,
}

impl ModelRegistry {
    /// Constrói o registro a partir das especificações e do nome (ou alias)
    /// do modelo padrão.
    pub fn new<F>(specs: &[(&str, &str, F)], default_model: &str) -> Result<Self, Error>
    where
        F: Fn() -> Arc<dyn Tagger> + Send + Sync + Clone + 'static,
    {
        let mut registry = Self {
            models: Vec::new(),
            by_alias: HashMap::new(),
            default_model: String::new(),
        };
        for (spec, acknowledgements, factory) in specs {
            registry.register(spec, acknowledgements, Box::new(factory.clone()))?;
        }
        // o padrão precisa resolver, senão toda requisição sem `model` falharia
        let resolved = registry
            .resolve(default_model)
            .ok_or_else(|| Error::UnknownModel(default_model.to_string()))?;
        registry.default_model = resolved.name.clone();
        Ok(registry)
    }

    /// Registra um modelo a partir de `nome:alias:…`.
    fn register(
        &mut self,
        spec: &str,
        acknowledgements: &str,
        factory: TaggerFactory,
    ) -> Result<(), Error> {
        let mut parts = spec.split(':');
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Processing(format!("invalid model spec '{}'", spec)))?;

        let model = Arc::new(Model {
            name: name.to_string(),
            acknowledgements: acknowledgements.to_string(),
            factory,
            loaded: Mutex::new(None),
        });
        self.models.push(model.clone());

        let mut aliases: Vec<String> = vec![name.to_string()];
        aliases.extend(parts.map(str::to_string));
        // truncamentos em hífen: a-b-c gera a-b e a
        let mut prefix = name;
        while let Some(cut) = prefix.rfind('-') {
            prefix = &prefix[..cut];
            aliases.push(prefix.to_string());
        }

        for alias in aliases {
            self.by_alias.entry(alias).or_insert_with(|| model.clone());
        }
        Ok(())
    }

    /// Resolve um nome ou alias; string vazia resolve para o modelo padrão.
    pub fn resolve(&self, name: &str) -> Option<&Arc<Model>> {
        if name.is_empty() {
            return self.by_alias.get(&self.default_model);
        }
        self.by_alias.get(name)
    }

    /// Como [`resolve`](Self::resolve), mas com o erro do protocolo.
    pub fn get(&self, name: &str) -> Result<&Arc<Model>, Error> {
        self.resolve(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Modelos na ordem de registro, para a listagem de `/models`.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.iter()
    }
}
