//! Configuração do servidor via variáveis de ambiente `NESTAG_*`.

use std::env;

/// Parâmetros operacionais do serviço.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Endereço de escuta (`NESTAG_BIND`).
    pub bind: String,
    /// Sentenças por lote de processamento (`NESTAG_BATCH_SIZE`).
    pub batch_size: usize,
    /// Profundidade máxima das pilhas de rótulos (`NESTAG_MAX_LABELS`).
    pub max_labels_per_token: usize,
    /// Tamanho máximo do corpo da requisição, em bytes
    /// (`NESTAG_MAX_REQUEST_SIZE`).
    pub max_request_size: usize,
    /// Nome ou alias do modelo padrão (`NESTAG_DEFAULT_MODEL`).
    pub default_model: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
            batch_size: 32,
            max_labels_per_token: 5,
            max_request_size: 4096 * 1024,
            default_model: "ptbr".to_string(),
        }
    }
}

impl ServerConfig {
    /// Carrega a configuração do ambiente, mantendo os padrões para
    /// variáveis ausentes ou imparseáveis.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: env::var("NESTAG_BIND").unwrap_or(defaults.bind),
            batch_size: env_usize("NESTAG_BATCH_SIZE", defaults.batch_size),
            max_labels_per_token: env_usize("NESTAG_MAX_LABELS", defaults.max_labels_per_token),
            max_request_size: env_usize("NESTAG_MAX_REQUEST_SIZE", defaults.max_request_size),
            default_model: env::var("NESTAG_DEFAULT_MODEL").unwrap_or(defaults.default_model),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.max_labels_per_token, 5);
        assert_eq!(cfg.max_request_size, 4096 * 1024);
    }
}
