// Small dev utility: create the work-log schema and seed default configuration.
//
// Usage:
//   cargo run --bin init_worklog_db -- [db_path]
//
// Without db_path the default location (WORKLOG_DB_PATH or the user data dir) is used.

use anyhow::{anyhow, Context, Result};
use mes_worklog::app::get_default_db_path;
use mes_worklog::config::ConfigManager;
use mes_worklog::db::{init_schema, open_sqlite_connection, read_schema_version};
use mes_worklog::logging;
use std::sync::{Arc, Mutex};

fn main() -> Result<()> {
    logging::init();

    let db_path = std::env::args()
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);

    let conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    init_schema(&conn).context("建表失败")?;
    let version = read_schema_version(&conn).context("读取 schema_version 失败")?;

    let config = ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
        .map_err(|e| anyhow!(e))?;
    let seeded = config.seed_defaults().map_err(|e| anyhow!("写入默认配置失败: {}", e))?;

    tracing::info!(db_path = %db_path, schema_version = ?version, seeded, "数据库初始化完成");
    println!("db_path={} schema_version={:?} seeded_keys={}", db_path, version, seeded);
    Ok(())
}
