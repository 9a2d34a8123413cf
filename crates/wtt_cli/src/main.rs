//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `wtt_core` linkage.
//! - Exercise one company/project round trip against an in-memory database.
//!
//! Usage: `wtt_cli [absolute-log-dir]`

use std::process::ExitCode;
use wtt_core::db::migrations::latest_version;
use wtt_core::db::open_db_in_memory;
use wtt_core::{
    default_log_level, init_logging, Company, GatewayConfig, HierarchyService, ListQuery, Project,
    SqliteCrmGateway,
};

fn main() -> ExitCode {
    println!("wtt_core ping={}", wtt_core::ping());
    println!("wtt_core version={}", wtt_core::core_version());
    println!("wtt_core schema_version={}", latest_version());

    let config = GatewayConfig::default();
    if let Some(log_dir) = std::env::args().nth(1) {
        if let Err(err) = init_logging(default_log_level(), &log_dir, &config) {
            eprintln!("logging disabled: {err}");
        }
    }

    match smoke(config) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn smoke(config: GatewayConfig) -> Result<String, Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let gateway = SqliteCrmGateway::try_new(&conn, config)?;
    let service = HierarchyService::new(gateway);

    let company = service.create_company(&Company::new("Smoke Corp"))?;
    let company_id = company.id.clone().unwrap_or_default();
    service.create_project(&company_id, &Project::new("Smoke Project"))?;
    let projects = service.list_projects(&company_id, &ListQuery::unbounded())?;

    Ok(format!(
        "wtt_core smoke company_id={} projects={}",
        company_id,
        projects.len()
    ))
}
