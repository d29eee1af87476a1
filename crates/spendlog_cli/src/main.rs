//! CLI smoke entry point.
//!
//! Loads `SPENDLOG_*` configuration, opens the configured database (or an
//! in-memory one) and prints its schema version and module counts, so core
//! wiring can be checked without an embedding application.

use log::info;
use spendlog_core::db::migrations::{current_version, latest_version};
use spendlog_core::{
    open_db, open_db_in_memory, CategoryService, CoreConfig, ExpenseService,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("spendlog: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    let logging = config.init_logging().map_err(|err| err.to_string())?;

    println!("logging={}", if logging { "file" } else { "off" });

    let conn = match &config.db_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    let schema_version = current_version(&conn).map_err(|err| err.to_string())?;
    if schema_version != latest_version() {
        return Err(format!(
            "schema version {schema_version} after open, expected {}",
            latest_version()
        ));
    }
    println!("schema_version={schema_version}");

    let categories = CategoryService::try_new(&conn)
        .map_err(|err| err.to_string())?
        .with_limits(config.page_limits);
    let expenses = ExpenseService::try_new(&conn)
        .map_err(|err| err.to_string())?
        .with_limits(config.page_limits);

    let count_params: [(&str, &str); 1] = [("limit", "1")];
    let category_count = categories
        .list(count_params)
        .map_err(|err| err.to_string())?
        .total_count;
    let expense_count = expenses
        .list(count_params)
        .map_err(|err| err.to_string())?
        .total_count;

    info!(
        "event=cli_smoke module=cli status=ok categories={category_count} expenses={expense_count}"
    );
    println!("categories={category_count}");
    println!("expenses={expense_count}");
    Ok(())
}
