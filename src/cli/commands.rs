//! Command implementations

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use enerdesk_backend::{
    BackendError, CrmBackend, EntityId, HttpBackend, Module, SessionContext, within_renewal_window,
};
use enerdesk_config::Config;
use enerdesk_onboarding::{OnboardingSettings, Orchestrator, StatusEvent, Wizard, planned_calls};
use enerdesk_utils::atomic_write::write_file_atomic;
use enerdesk_utils::error::EnerdeskError;

use crate::draft_file::load_draft;

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn backend(config: &Config) -> Result<Arc<dyn CrmBackend>> {
    Ok(enerdesk_backend::from_config(config).map_err(EnerdeskError::from)?)
}

fn session(config: &Config) -> Result<SessionContext> {
    Ok(SessionContext::from_config(config).map_err(EnerdeskError::from)?)
}

/// Refuse a listing the session's role may not see.
fn require_module(session: &SessionContext, module: Module) -> Result<()> {
    if session.can_access(module) {
        return Ok(());
    }
    Err(EnerdeskError::from(BackendError::Unauthorized(format!(
        "role '{}' may not use the {module} module",
        session.role()
    )))
    .into())
}

/// Load the draft and push it through the gate as far as it goes.
fn prepare_wizard(draft: &Path, settings: &OnboardingSettings) -> Result<Wizard> {
    let mut wizard = load_draft(draft, settings)?;
    wizard.advance_to_final();
    Ok(wizard)
}

fn blocking_issues(wizard: &Wizard) -> Vec<String> {
    wizard
        .errors()
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect()
}

fn validation_failed(wizard: &Wizard) -> EnerdeskError {
    let issues = blocking_issues(wizard);
    EnerdeskError::ValidationFailed {
        step: wizard.step().to_string(),
        issue_count: issues.len(),
        issues,
    }
}

pub async fn execute_login_command(
    email: &str,
    password: &str,
    json: bool,
    config: &Config,
) -> Result<()> {
    let backend = HttpBackend::new_from_config(config).map_err(EnerdeskError::from)?;
    let session = backend
        .login(email, password)
        .await
        .map_err(EnerdeskError::from)?;

    let token = session.token().unwrap_or_default();
    if json {
        return print_json(&json!({
            "access_token": token,
            "role": session.role().to_string(),
            "email": session.email(),
        }));
    }

    println!("✓ Logged in as {email} ({})", session.role());
    println!("  export {}={token}", config.backend.token_env);
    Ok(())
}

pub fn execute_validate_command(draft: &Path, json: bool, config: &Config) -> Result<()> {
    let settings = OnboardingSettings::from_config(config);
    let wizard = prepare_wizard(draft, &settings)?;
    let valid = wizard.is_final_step();

    if json {
        print_json(&json!({
            "valid": valid,
            "step": wizard.step(),
            "errors": wizard.errors(),
        }))?;
    } else if valid {
        println!("✓ Draft passes every wizard step");
    } else {
        println!("✗ Draft blocked at step {}", wizard.step());
        for issue in blocking_issues(&wizard) {
            println!("  - {issue}");
        }
    }

    if valid {
        Ok(())
    } else {
        Err(validation_failed(&wizard).into())
    }
}

pub async fn execute_onboard_command(
    draft: &Path,
    dry_run: bool,
    json: bool,
    config: &Config,
) -> Result<()> {
    let settings = OnboardingSettings::from_config(config);
    let mut wizard = prepare_wizard(draft, &settings)?;
    if !wizard.is_final_step() {
        return Err(validation_failed(&wizard).into());
    }

    if dry_run {
        let planned = planned_calls(wizard.draft(), &settings);
        if json {
            return print_json(&json!({ "dry_run": true, "calls": planned }));
        }
        println!("Planned calls ({}):", planned.len());
        for (index, call) in planned.iter().enumerate() {
            println!("  {}. [{}] {}", index + 1, call.stage, call.operation);
        }
        return Ok(());
    }

    let backend = backend(config)?;
    let orchestrator = Orchestrator::new(Arc::clone(&backend), session(config)?, settings);
    if !json {
        orchestrator.reporter().subscribe(|event| {
            if let StatusEvent::StageEntered { stage } = event {
                eprintln!("  {}", stage.label());
            }
        });
    }

    let receipt = orchestrator
        .submit(&wizard)
        .await
        .map_err(EnerdeskError::from)?;

    // Callers close the wizard on success; this one-shot command drops it right after.
    wizard.reset();
    match backend.list_clients().await {
        Ok(clients) => info!(clients = clients.len(), "Client listing refreshed"),
        Err(error) => warn!(error = %error, "Could not refresh client listing"),
    }

    if json {
        return print_json(&receipt);
    }

    println!("✓ Client onboarded, switching request {}", receipt.request_code);
    println!("  client:            {}", receipt.client_id);
    for document in &receipt.documents {
        println!("  document ({}):  {}", document.slot, document.document_id);
    }
    println!("  supply point:      {}", receipt.supply_point_id);
    println!("  contract:          {}", receipt.contract_id);
    println!("  switching request: {}", receipt.switching_request_id);
    Ok(())
}

pub async fn execute_clients_command(json: bool, config: &Config) -> Result<()> {
    require_module(&session(config)?, Module::Crm)?;
    let clients = backend(config)?
        .list_clients()
        .await
        .map_err(EnerdeskError::from)?;

    if json {
        return print_json(&clients);
    }
    println!(
        "{:<8} {:<32} {:<12} {:<28} ACTIVE",
        "ID", "NAME", "TAX ID", "EMAIL"
    );
    for client in &clients {
        println!(
            "{:<8} {:<32} {:<12} {:<28} {}",
            client.id.to_string(),
            client.name,
            client.tax_id,
            client.email.as_deref().unwrap_or("-"),
            if client.is_active { "yes" } else { "no" }
        );
    }
    Ok(())
}

pub async fn execute_switching_command(json: bool, config: &Config) -> Result<()> {
    require_module(&session(config)?, Module::Energy)?;
    let requests = backend(config)?
        .list_switching_requests()
        .await
        .map_err(EnerdeskError::from)?;

    if json {
        let rows: Vec<_> = requests
            .iter()
            .map(|request| json!({ "request": request, "status_class": request.status_class() }))
            .collect();
        return print_json(&rows);
    }
    println!(
        "{:<20} {:<5} {:<28} {:<24} {:<16} CLASS",
        "CODE", "TYPE", "CLIENT", "CUPS", "STATUS"
    );
    for request in &requests {
        println!(
            "{:<20} {:<5} {:<28} {:<24} {:<16} {}",
            request.code,
            request.kind,
            request.client.as_deref().unwrap_or("-"),
            request.cups.as_deref().unwrap_or("-"),
            request.status,
            request.status_class()
        );
    }
    Ok(())
}

pub async fn execute_renewals_command(
    window_days: Option<i64>,
    json: bool,
    config: &Config,
) -> Result<()> {
    require_module(&session(config)?, Module::Energy)?;
    let alerts = backend(config)?
        .list_pending_renewals()
        .await
        .map_err(EnerdeskError::from)?;

    let window = window_days.unwrap_or(config.renewals.window_days);
    let critical = config.renewals.critical_days;
    let alerts = within_renewal_window(alerts, window);

    if json {
        let rows: Vec<_> = alerts
            .iter()
            .map(|alert| json!({ "alert": alert, "urgency": alert.urgency(critical) }))
            .collect();
        return print_json(&rows);
    }
    if alerts.is_empty() {
        println!("No contracts end within {window} days");
        return Ok(());
    }
    for alert in &alerts {
        println!(
            "[{}] {} ({}) {} with {}, {} day(s) left",
            alert.urgency(critical),
            alert.client,
            alert.phone.as_deref().unwrap_or("no phone"),
            alert.cups,
            alert.retailer,
            alert.days_remaining
        );
    }
    Ok(())
}

/// `Remesa_SEPA_<YYYY-MM-DD>.xml` in the working directory.
fn default_remittance_path(today: NaiveDate) -> PathBuf {
    PathBuf::from(format!("Remesa_SEPA_{}.xml", today.format("%Y-%m-%d")))
}

pub async fn execute_invoices_command(
    remit: &[i64],
    remit_pending: bool,
    output: Option<&Path>,
    json: bool,
    config: &Config,
) -> Result<()> {
    require_module(&session(config)?, Module::Billing)?;
    let backend = backend(config)?;

    if remit.is_empty() && !remit_pending {
        let invoices = backend.list_invoices().await.map_err(EnerdeskError::from)?;
        if json {
            return print_json(&invoices);
        }
        println!(
            "{:<8} {:<8} {:<36} {:>12} STATUS",
            "ID", "CLIENT", "CONCEPT", "AMOUNT"
        );
        for invoice in &invoices {
            println!(
                "{:<8} {:<8} {:<36} {:>12.2} {}",
                invoice.id.to_string(),
                invoice.client_id.to_string(),
                invoice.concept,
                invoice.amount,
                invoice.status
            );
        }
        let pending: f64 = invoices
            .iter()
            .filter(|invoice| invoice.is_pending())
            .map(|invoice| invoice.amount)
            .sum();
        println!("Pending total: {pending:.2}");
        return Ok(());
    }

    let ids: Vec<EntityId> = if remit_pending {
        backend
            .list_invoices()
            .await
            .map_err(EnerdeskError::from)?
            .into_iter()
            .filter(|invoice| invoice.is_pending())
            .map(|invoice| invoice.id)
            .collect()
    } else {
        remit.iter().copied().map(EntityId::from).collect()
    };
    if ids.is_empty() {
        if json {
            return print_json(&json!({ "file": null, "invoices": 0 }));
        }
        println!("No pending invoices to remit");
        return Ok(());
    }

    let xml = backend
        .generate_sepa_remittance(&ids)
        .await
        .map_err(EnerdeskError::from)?;
    let path = output.map_or_else(
        || default_remittance_path(Local::now().date_naive()),
        Path::to_path_buf,
    );
    write_file_atomic(&path, xml.as_bytes())
        .map_err(|e| EnerdeskError::Io(std::io::Error::other(format!("{e:#}"))))?;
    info!(invoices = ids.len(), file = %path.display(), "SEPA remittance written");

    if json {
        return print_json(&json!({ "file": path, "invoices": ids.len() }));
    }
    println!(
        "✓ SEPA remittance for {} invoice(s) written to {}",
        ids.len(),
        path.display()
    );
    println!("  Upload it to the bank to collect the direct debits.");
    Ok(())
}

pub async fn execute_stats_command(json: bool, config: &Config) -> Result<()> {
    require_module(&session(config)?, Module::Dashboard)?;
    let stats = backend(config)?
        .dashboard_stats()
        .await
        .map_err(EnerdeskError::from)?;

    if json {
        return print_json(&stats);
    }
    println!("Clients:        {}", stats.total_clients);
    println!("  active:       {}", stats.active_clients);
    println!("  inactive:     {}", stats.inactive_clients);
    println!("  new today:    {}", stats.new_today);
    println!("Invoices:       {}", stats.total_invoices);
    println!("Total invoiced: {:.2}", stats.total_invoiced);
    Ok(())
}

pub async fn execute_ask_command(prompt: &str, json: bool, config: &Config) -> Result<()> {
    require_module(&session(config)?, Module::Assistant)?;
    let reply = backend(config)?
        .ask_assistant(prompt)
        .await
        .map_err(EnerdeskError::from)?;

    if json {
        return print_json(&reply);
    }
    println!("{}", reply.reply);
    Ok(())
}

pub fn execute_config_command(json: bool, config: &Config) -> Result<()> {
    let effective = config.effective_config();
    if json {
        let map: serde_json::Map<String, serde_json::Value> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, json!({ "value": value, "source": source })))
            .collect();
        return print_json(&map);
    }
    for (key, (value, source)) in effective {
        println!("{key:<34} {value:<32} ({source})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remittance_path_is_dated() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            default_remittance_path(today),
            PathBuf::from("Remesa_SEPA_2025-03-07.xml")
        );
    }
}
