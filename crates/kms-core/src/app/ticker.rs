//! Ticker - キャンセル可能な繰り返しジョブ
//!
//! # フロー
//! 1. （あれば）前任ジョブの終了を待つ
//! 2. 即座に 1 回目の tick、その後 `period` ごとに tick
//! 3. tick ごとにコールバックを実行し、完了してから次の tick を待つ
//! 4. `cancel()` または Ticker の drop で次の tick の前に止まる
//!
//! 実行中のコールバックは強制中断しない（その pass は最後まで走る）。

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What the callback wants after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Handle to one running repeating job.
///
/// - `cancel()` は同期的で、次の tick が始まらないことを保証する
/// - `shutdown_tx` を drop しても止まる
#[derive(Debug)]
pub struct Ticker {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Ticker {
    /// Spawns the job on the current tokio runtime.
    ///
    /// `after` が渡された場合、そのタスクが終わるまで 1 回目の tick を遅らせる。
    /// 同じチャンネルの新旧ジョブが重ならないようにするため。
    pub fn start<F, Fut>(period: Duration, after: Option<JoinHandle<()>>, on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(run(period, after, on_tick, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Requests the job to stop before its next tick.
    pub fn cancel(&self) {
        // ignore send error: the loop may already have exited
        let _ = self.shutdown_tx.send(true);
    }

    /// Cancels and hands back the join handle so a successor can wait on it.
    pub fn cancel_into_handle(self) -> JoinHandle<()> {
        self.cancel();
        self.join
    }

    /// Cancel and wait for an in-flight tick to finish.
    pub async fn cancel_and_join(self) {
        let join = self.cancel_into_handle();
        let _ = join.await;
    }
}

async fn run<F, Fut>(
    period: Duration,
    after: Option<JoinHandle<()>>,
    mut on_tick: F,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickFlow> + Send + 'static,
{
    if let Some(predecessor) = after {
        tokio::select! {
            _ = predecessor => {}
            _ = wait_cancelled(&mut shutdown_rx) => return,
        }
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                // sender が drop されたら止める。値の変化なら次のループで判定
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        // tick と cancel が同時に来た場合は cancel を優先
        if *shutdown_rx.borrow() {
            break;
        }

        if on_tick().await == TickFlow::Stop {
            break;
        }
    }
}

/// Resolves once cancel was requested or the handle was dropped.
async fn wait_cancelled(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown_rx.borrow_and_update();
        if stop || shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
