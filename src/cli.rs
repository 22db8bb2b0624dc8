//! Interface de linha de comando do baler baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, demo) e
//! flags globais (--manual, --queue, --verbose).

use clap::{Parser, Subcommand};

/// baler — Orquestrador durável de cadeias de jobs.
#[derive(Debug, Parser)]
#[command(name = "baler", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Avança manualmente: o próximo bale só é despachado via trigger explícito.
    #[arg(long, global = true, default_value_t = false)]
    pub manual: bool,

    /// Fila padrão para bales sem fila própria.
    #[arg(long, global = true)]
    pub queue: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa uma cadeia definida em um arquivo JSON.
    Run {
        /// Caminho para o arquivo JSON com a definição da cadeia.
        file: String,
    },

    /// Executa a demonstração embutida com jobs sintéticos.
    Demo {
        /// Número de jobs na cadeia de demonstração.
        #[arg(long, default_value_t = 3)]
        jobs: usize,

        /// Índice do bale que falha permanentemente (se presente).
        #[arg(long)]
        fail_at: Option<usize>,

        /// Atraso global em segundos aplicado a todos os bales.
        #[arg(long, default_value_t = 0)]
        delay: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["baler", "run", "chain.json"]);
        match cli.command {
            Command::Run { file } => assert_eq!(file, "chain.json"),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_demo_with_flags() {
        let cli = Cli::parse_from(["baler", "demo", "--jobs", "5", "--fail-at", "2"]);
        match cli.command {
            Command::Demo { jobs, fail_at, delay } => {
                assert_eq!(jobs, 5);
                assert_eq!(fail_at, Some(2));
                assert_eq!(delay, 0);
            }
            _ => panic!("expected Demo command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["baler", "--manual", "--queue", "mail", "--verbose", "demo"]);
        assert!(cli.manual);
        assert!(cli.verbose);
        assert_eq!(cli.queue.as_deref(), Some("mail"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
