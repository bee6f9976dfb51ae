//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（SQLite, チャットプラットフォーム, 時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - メモリ上のレジストリが稼働中プロセスの正本
//! - TaskStore は再起動時の復元用（ベストエフォート）
//! - チャットプラットフォームは ChannelGateway / MemberGateway の2つに分ける

pub mod chat;
pub mod clock;
pub mod task_store;

pub use self::chat::{ChannelGateway, ChannelInfo, ChannelKind, MemberGateway};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::task_store::TaskStore;
