//! Markdown run report (`RELATORIO_PROCESSAMENTO.md`).
//!
//! The report is written for the operators who load the SQL, so its
//! headings are in Portuguese like the rest of the generated artefacts.

use crate::output::{DocumentStatus, RunOutput};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::Path;

/// Render the report for a finished run.
pub fn render_report(output: &RunOutput, generated_at: NaiveDateTime) -> String {
    let stats = &output.stats;
    let mut md = String::new();

    let accepted: Vec<_> = output
        .accepted()
        .filter_map(|d| d.record.as_ref())
        .collect();

    // `write!` into a String cannot fail.
    let _ = writeln!(md, "# RELATÓRIO DE PROCESSAMENTO DE DARMs\n");
    let _ = writeln!(md, "## Data/Hora: {}\n", generated_at.format("%d/%m/%Y %H:%M:%S"));
    let _ = writeln!(md, "## Guias Processadas: {}\n", accepted.len());

    md.push_str("### Lista de Guias:\n");
    if accepted.is_empty() {
        md.push_str("_Nenhuma guia processada._\n");
    }
    for (i, record) in accepted.iter().enumerate() {
        let _ = writeln!(
            md,
            "{}. Guia {} (inscrição {}, total {})",
            i + 1,
            record.file_key(),
            record.inscription,
            record
                .total_value
                .as_deref()
                .unwrap_or(&record.principal_value)
        );
    }

    md.push_str("\n### Estatísticas:\n");
    let _ = writeln!(md, "- Documentos encontrados: {}", stats.total_documents);
    let _ = writeln!(md, "- Documentos processados: {}", stats.accepted);
    let _ = writeln!(md, "- Documentos sem dados obrigatórios: {}", stats.skipped);
    let _ = writeln!(md, "- Documentos com falha: {}", stats.failed);
    let _ = writeln!(md, "- Guias únicas: {}", stats.unique_guides);
    let _ = writeln!(md, "- Linhas no lote consolidado: {}", stats.batch_rows);
    let _ = writeln!(md, "- Linhas descartadas do lote: {}", stats.dropped_rows);
    let _ = writeln!(md, "- Duração: {} ms", stats.duration_ms);

    if let Some(batch) = &output.batch {
        md.push_str("\n### SQ_DOC atribuídos:\n");
        for a in &batch.assignments {
            let _ = writeln!(
                md,
                "- Guia {} = {}",
                a.guide_number.as_deref().unwrap_or("SEM_GUIA"),
                a.sq_doc
            );
        }
    }

    let failures: Vec<_> = output
        .documents
        .iter()
        .filter(|d| d.status() != DocumentStatus::Accepted)
        .collect();
    if !failures.is_empty() {
        md.push_str("\n### Documentos não processados:\n");
        for d in failures {
            let reason = d
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "inscrição ou valor não encontrado".to_string());
            let _ = writeln!(md, "- `{}`: {}", d.file_name(), reason);
        }
    }

    md.push_str("\n### Arquivos Gerados:\n");
    let mut files = BTreeSet::new();
    for d in &output.documents {
        files.extend(d.sql_file.iter().chain(d.check_file.iter()).map(|p| file_name(p)));
    }
    if let Some(p) = &output.batch_file {
        let _ = writeln!(md, "- **{}** - lote consolidado", file_name(p));
    }
    for f in files {
        let _ = writeln!(md, "- {f}");
    }
    if output.batch_file.is_none() && output.documents.iter().all(|d| d.sql_file.is_none()) {
        md.push_str("_Nenhum arquivo SQL gerado._\n");
    }

    let doc_warnings: Vec<&String> = output.documents.iter().flat_map(|d| &d.warnings).collect();
    if !output.output_errors.is_empty() || !doc_warnings.is_empty() {
        md.push_str("\n### Erros de gravação:\n");
        for e in output.output_errors.iter().chain(doc_warnings) {
            let _ = writeln!(md, "- {e}");
        }
    }

    md
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::output::{DarmRecord, DocumentResult, InscriptionKind, RunStats};
    use crate::pipeline::batch::{ConsolidatedBatch, SqDocAssignment};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    fn accepted(index: usize, guide: &str) -> DocumentResult {
        let mut d = DocumentResult::new(index, PathBuf::from(format!("darms/{guide}.pdf")));
        d.record = Some(DarmRecord {
            inscription: "123456".into(),
            inscription_kind: InscriptionKind::Municipal,
            barcode: None,
            revenue_code: None,
            principal_value: "10.00".into(),
            total_value: Some("12.50".into()),
            due_date: None,
            fiscal_year: None,
            guide_number: Some(guide.into()),
            reference_period: None,
        });
        d.sql_file = Some(PathBuf::from(format!("inserts/INSERT_DARM_PAGO_{guide}.sql")));
        d
    }

    #[test]
    fn full_report() {
        let mut failed = DocumentResult::new(2, PathBuf::from("darms/bad.pdf"));
        failed.error = Some(DocumentError::NotAPdf {
            path: PathBuf::from("darms/bad.pdf"),
            magic: *b"GIF8",
        });
        let output = RunOutput {
            documents: vec![accepted(0, "11"), accepted(1, "22"), failed],
            batch: Some(ConsolidatedBatch {
                sql: String::new(),
                timestamp_ms: 0,
                assignments: vec![
                    SqDocAssignment { position: 0, guide_number: Some("11".into()), sq_doc: 11_000 },
                    SqDocAssignment { position: 1, guide_number: Some("22".into()), sq_doc: 22_001 },
                ],
                dropped: vec![],
            }),
            batch_file: Some(PathBuf::from("inserts/INSERT_TODOS_DARMs.sql")),
            report_file: None,
            output_errors: vec![],
            stats: RunStats {
                total_documents: 3,
                accepted: 2,
                failed: 1,
                unique_guides: 2,
                batch_rows: 2,
                ..RunStats::default()
            },
        };

        let md = render_report(&output, at());
        assert!(md.starts_with("# RELATÓRIO DE PROCESSAMENTO DE DARMs\n"));
        assert!(md.contains("## Data/Hora: 07/03/2025 14:05:09"));
        assert!(md.contains("## Guias Processadas: 2"));
        assert!(md.contains("1. Guia 11 (inscrição 123456, total 12.50)"));
        assert!(md.contains("2. Guia 22"));
        assert!(md.contains("- Guia 22 = 22001"));
        assert!(md.contains("- `bad.pdf`: "));
        assert!(md.contains("- **INSERT_TODOS_DARMs.sql** - lote consolidado"));
        assert!(md.contains("- INSERT_DARM_PAGO_11.sql"));
    }

    #[test]
    fn empty_run() {
        let output = RunOutput {
            documents: vec![],
            batch: None,
            batch_file: None,
            report_file: None,
            output_errors: vec![],
            stats: RunStats::default(),
        };
        let md = render_report(&output, at());
        assert!(md.contains("_Nenhuma guia processada._"));
        assert!(md.contains("_Nenhum arquivo SQL gerado._"));
        assert!(!md.contains("SQ_DOC"));
    }
}
