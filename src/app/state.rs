// ==========================================
// 生产执行日志 - 应用状态
// ==========================================
// 职责: 组装共享连接、仓储、引擎与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::WorkLogApi;
use crate::config::config_manager::ConfigManager;
use crate::engine::WorkLogStateMachine;
use crate::repository::{PackagingAllocationStore, SqliteCatalogRepository, WorkLogRepository};

/// 应用状态
///
/// 所有仓储共享同一个 `Arc<Mutex<Connection>>`
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 工序日志API
    pub work_log_api: Arc<WorkLogApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 工序日志仓储
    pub work_log_repo: Arc<WorkLogRepository>,

    /// 包装分配仓储
    pub packaging_store: Arc<PackagingAllocationStore>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开数据库并应用统一 PRAGMA
    /// 2. 初始化 schema (幂等)
    /// 3. 组装仓储、状态机与 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let work_log_repo = Arc::new(WorkLogRepository::new(conn.clone()));
        let packaging_store = Arc::new(PackagingAllocationStore::new(conn.clone()));
        let catalog_repo = Arc::new(SqliteCatalogRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let state_machine = Arc::new(WorkLogStateMachine::new(
            work_log_repo.clone(),
            config_manager.clone(),
            catalog_repo.clone(),
            catalog_repo.clone(),
            catalog_repo.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let work_log_api = Arc::new(WorkLogApi::new(
            work_log_repo.clone(),
            packaging_store.clone(),
            catalog_repo,
            state_machine,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            work_log_api,
            config_manager,
            work_log_repo,
            packaging_store,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 WORKLOG_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("WORKLOG_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./mes_worklog.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("mes-worklog");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("mes_worklog.db");
        }
    }

    path.to_string_lossy().to_string()
}
