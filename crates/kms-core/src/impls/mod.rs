//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteTaskStore**: 本番用の TaskStore（sqlx / SQLite ファイル）
//! - **InMemoryTaskStore**: 開発・テスト用の TaskStore
//!
//! チャットプラットフォーム（Discord）の実装は bot クレート側に置きます。

pub mod inmem_store;
pub mod sqlite_store;

pub use self::inmem_store::InMemoryTaskStore;
pub use self::sqlite_store::SqliteTaskStore;
