use anyhow::Context;

use sheetcrm_infra::CrmServices;

/// Rewrites stale company names on opportunities against the live workbook.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sheetcrm_observability::init();

    let services = CrmServices::from_env()?
        .context("SHEETCRM_SPREADSHEET_ID and SHEETCRM_ACCESS_TOKEN must be set")?;
    let modifier = std::env::var("SHEETCRM_MODIFIER")
        .unwrap_or_else(|_| services.config.pipeline.default_modifier.clone());

    let rewritten = services.companies.backfill_company_names(&modifier).await?;
    tracing::info!(rewritten, %modifier, "company name backfill finished");
    Ok(())
}
