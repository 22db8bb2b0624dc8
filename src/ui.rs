//! Interface de terminal do baler — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`ChainProgress`] acompanha visualmente
//! a execução de uma cadeia no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::chain::{Chain, ChainStatus};
use crate::runner::RunnerOutcome;

/// Indicador visual de progresso para a execução de uma cadeia no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct ChainProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para mensagens de retentativa.
    yellow: Style,
}

impl ChainProgress {
    /// Inicia o spinner para a cadeia e retorna a instância de progresso.
    pub fn start(chain_id: &str, bale_count: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("chain {chain_id}: {bale_count} bale(s) pending"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para o bale em execução.
    pub fn dispatching(&self, index: usize, job_name: &str, delay_seconds: u64) {
        if delay_seconds > 0 {
            self.pb
                .set_message(format!("bale {index} ({job_name}): waiting {delay_seconds}s"));
        } else {
            self.pb.set_message(format!("bale {index} ({job_name}): running"));
        }
    }

    /// Exibe o resultado de um bale individual.
    pub fn bale_done(&self, index: usize, job_name: &str, outcome: RunnerOutcome) {
        let line = match outcome {
            RunnerOutcome::Succeeded => {
                format!("  {} bale {index} ({job_name}) succeeded", self.green.apply_to("✓"))
            }
            RunnerOutcome::FailedRetryable => format!(
                "  {} bale {index} ({job_name}) failed, retrying",
                self.yellow.apply_to("↻")
            ),
            RunnerOutcome::FailedPermanent => {
                format!("  {} bale {index} ({job_name}) failed", self.red.apply_to("✗"))
            }
        };
        self.pb.println(line);
    }

    /// Finaliza o spinner e exibe o resultado final da cadeia.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete(&self, chain: &Chain) {
        self.pb.finish_and_clear();
        match chain.status {
            ChainStatus::Finished => {
                println!("  {} Chain finished", self.green.apply_to("✓"));
            }
            ChainStatus::Failed => {
                println!("  {} Chain failed", self.red.apply_to("✗"));
            }
            _ => {
                println!("  {} Chain stopped while {}", self.yellow.apply_to("·"), chain.status);
            }
        }
    }

    /// Imprime o registro da cadeia formatado em JSON com estilo colorido.
    pub fn print_record(&self, chain: &Chain) {
        let status_style = match chain.status {
            ChainStatus::Finished => &self.green,
            ChainStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Chain Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(chain).unwrap_or_default()
        );
    }
}
