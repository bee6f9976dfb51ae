//! kms-core
//!
//! Core building blocks for the kms moderation bot.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, duration policy, purge records, member plans, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, ChannelGateway, MemberGateway, Clock）
//! - **app**: アプリケーションロジック（builder, scheduler, ticker, reconciler, moderation）
//! - **impls**: 実装（SqliteTaskStore, InMemoryTaskStore）
//!
//! Discord への接続・コマンド定義は `kms-bot` クレートにあります。

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
mod testing;
