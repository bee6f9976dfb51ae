//! App - アプリケーション層
//!
//! ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: PurgeScheduler の構築とワイヤリング
//! - **PurgeScheduler**: チャンネルごとの繰り返し purge ジョブ
//! - **Ticker**: キャンセル可能な繰り返しタスク（ジョブ 1 つ分）
//! - **Reconciler**: 起動時の保存済みスケジュール復元
//! - **ModerationService**: 一括キックとセルフタイムアウト

pub mod builder;
pub mod moderation;
pub mod reconciler;
pub mod scheduler;
pub mod ticker;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::moderation::{MAX_TIMEOUT, MemberPurgeReport, ModerationService};
pub use self::reconciler::{ReconcileReport, Reconciler};
pub use self::scheduler::PurgeScheduler;
pub use self::ticker::{TickFlow, Ticker};
