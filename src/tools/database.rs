//! 数据库后端
//!
//! 子工作流智能体的目标系统：执行查询、建视图、撤销视图、汇总 schema。
//! SqliteDatabase 基于 rusqlite；视图创建是外部副作用调用，没有事务语义，
//! 失败后的补偿靠显式 drop_view（由子工作流引擎触发）。

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

/// 查询返回的最大行数上限，评估时再截取更小的前缀
const MAX_ROWS: usize = 200;

/// 数据库后端接口
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// 执行查询，每行一个 JSON 对象（列名 -> 值）
    async fn run_query(&self, sql: &str) -> Result<Vec<Value>, String>;

    /// 创建视图（副作用调用）
    async fn create_view(&self, name: &str, query: &str) -> Result<(), String>;

    /// 删除视图（create_view 的补偿操作）
    async fn drop_view(&self, name: &str) -> Result<(), String>;

    /// 表与视图的结构摘要，进入生成 Prompt
    async fn schema_summary(&self) -> Result<String, String>;
}

/// SQLite 后端：Connection 加锁串行访问（单任务在途，争用可忽略）
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 建表/灌数据等准备工作（测试与样例用）
    pub fn execute_batch(&self, sql: &str) -> Result<(), String> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(sql)
            .map_err(|e| e.to_string())
    }
}

/// 视图名只允许标识符字符，拒绝把 SQL 拼进对象名
fn check_identifier(name: &str) -> Result<(), String> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(format!("invalid view name: {name}"))
    }
}

fn column_value(row: &rusqlite::Row<'_>, idx: usize) -> Value {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Integer(i)) => Value::from(i),
        Ok(ValueRef::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Ok(ValueRef::Text(t)) => Value::from(String::from_utf8_lossy(t).to_string()),
        Ok(ValueRef::Blob(b)) => Value::from(format!("<{} bytes>", b.len())),
        Err(_) => Value::Null,
    }
}

#[async_trait]
impl DatabaseBackend for SqliteDatabase {
    async fn run_query(&self, sql: &str) -> Result<Vec<Value>, String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query([]).map_err(|e| e.to_string())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| e.to_string())? {
            let mut obj = serde_json::Map::new();
            for (idx, col) in columns.iter().enumerate() {
                obj.insert(col.clone(), column_value(row, idx));
            }
            out.push(Value::Object(obj));
            if out.len() >= MAX_ROWS {
                break;
            }
        }
        Ok(out)
    }

    async fn create_view(&self, name: &str, query: &str) -> Result<(), String> {
        check_identifier(name)?;
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("CREATE VIEW {name} AS {query}"))
            .map_err(|e| e.to_string())
    }

    async fn drop_view(&self, name: &str) -> Result<(), String> {
        check_identifier(name)?;
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("DROP VIEW IF EXISTS {name}"))
            .map_err(|e| e.to_string())
    }

    async fn schema_summary(&self) -> Result<String, String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT type, name, sql FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| e.to_string())?;
        let mut rows = stmt.query([]).map_err(|e| e.to_string())?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next().map_err(|e| e.to_string())? {
            let kind: String = row.get(0).map_err(|e| e.to_string())?;
            let name: String = row.get(1).map_err(|e| e.to_string())?;
            let sql: Option<String> = row.get(2).map_err(|e| e.to_string())?;
            lines.push(format!(
                "{} {}: {}",
                kind,
                name,
                sql.unwrap_or_default().replace('\n', " ")
            ));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL, customer TEXT);
             INSERT INTO orders VALUES (1, 10.5, 'ada'), (2, 20.0, 'bob'), (3, 5.0, 'ada');",
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_run_query_rows_as_json() {
        let db = seeded();
        let rows = db
            .run_query("SELECT customer, amount FROM orders ORDER BY id")
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["customer"], "ada");
        assert_eq!(rows[1]["amount"], 20.0);
    }

    #[tokio::test]
    async fn test_view_lifecycle() {
        let db = seeded();
        db.create_view("ada_orders", "SELECT * FROM orders WHERE customer = 'ada'")
            .await
            .unwrap();
        let rows = db.run_query("SELECT * FROM ada_orders").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(db.schema_summary().await.unwrap().contains("view ada_orders"));

        db.drop_view("ada_orders").await.unwrap();
        assert!(db.run_query("SELECT * FROM ada_orders").await.is_err());
    }

    #[tokio::test]
    async fn test_view_name_validation() {
        let db = seeded();
        assert!(db
            .create_view("bad name; DROP TABLE orders", "SELECT 1")
            .await
            .is_err());
    }
}
