//! Configuração do baler carregada a partir de `baler.toml`.
//!
//! A struct [`BalerConfig`] contém os defaults globais do processo.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `BALER_QUEUE` tem precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Configuração de nível superior carregada de `baler.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalerConfig {
    /// Avança automaticamente para o próximo bale após um sucesso.
    #[serde(default = "default_process_automatically")]
    pub process_automatically: bool,

    /// Atraso padrão em segundos aplicado a bales sem atraso próprio.
    #[serde(default)]
    pub default_delay_seconds: u64,

    /// Fila padrão para bales sem fila própria.
    #[serde(default)]
    pub default_queue: Option<String>,

    /// Conexão padrão para bales sem conexão própria.
    #[serde(default)]
    pub default_connection: Option<String>,
}

// Valor padrão para avanço automático: true.
fn default_process_automatically() -> bool {
    true
}

impl Default for BalerConfig {
    fn default() -> Self {
        Self {
            process_automatically: default_process_automatically(),
            default_delay_seconds: 0,
            default_queue: None,
            default_connection: None,
        }
    }
}

impl BalerConfig {
    /// Carrega a configuração de `baler.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("baler.toml"))
    }

    /// Carrega a configuração de um caminho específico.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<BalerConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a fila.
        if let Ok(queue) = std::env::var("BALER_QUEUE")
            && !queue.is_empty()
        {
            config.default_queue = Some(queue);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = BalerConfig::default();
        assert!(config.process_automatically);
        assert_eq!(config.default_delay_seconds, 0);
        assert!(config.default_queue.is_none());
        assert!(config.default_connection.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            default_delay_seconds = 30
            default_queue = "chains"
        "#;
        let config: BalerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_delay_seconds, 30);
        assert_eq!(config.default_queue.as_deref(), Some("chains"));
        assert!(config.process_automatically);
        assert!(config.default_connection.is_none());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baler.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "process_automatically = false").unwrap();
        writeln!(file, "default_connection = \"database\"").unwrap();

        let config = BalerConfig::load_from(&path).unwrap();
        assert!(!config.process_automatically);
        assert_eq!(config.default_connection.as_deref(), Some("database"));
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // Arquivo inexistente: usa defaults.
        let config = BalerConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert!(config.process_automatically);
        assert_eq!(config.default_delay_seconds, 0);
    }
}
