//! 受监督的并发执行原语
//!
//! 工作池绑定在一个可取消的作用域上，任务体是第三方业务逻辑，
//! 其panic必须被限制在任务边界内：转换成结构化的失败值交给
//! 可配置的恢复回调，绝不终止池本身或其他兄弟任务。

use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::error;

/// 任务panic转换成的结构化失败值
#[derive(Debug, Clone)]
pub struct TaskPanic {
    pub message: String,
    pub backtrace: String,
}

impl TaskPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self {
            message,
            backtrace: Backtrace::force_capture().to_string(),
        }
    }
}

impl fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nStack: {}", self.message, self.backtrace)
    }
}

type RecoverFn = Arc<dyn Fn(&TaskPanic) + Send + Sync>;

fn default_recover(panic: &TaskPanic) {
    error!("工作池任务panic: {}\nStack: {}", panic.message, panic.backtrace);
}

/// 工作池
///
/// `spawn` 立即返回；`wait` 先排空在途任务再取消作用域，`stop`
/// 先取消作用域再排空。订阅循环和消息处理分别使用独立的池实例，
/// 两个作用域可以单独取消。
#[derive(Clone)]
pub struct WorkerPool {
    ctx: CancellationToken,
    tracker: TaskTracker,
    recover: RecoverFn,
}

impl WorkerPool {
    /// 创建绑定到父取消作用域的工作池
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            ctx: parent.child_token(),
            tracker: TaskTracker::new(),
            recover: Arc::new(default_recover),
        }
    }

    /// 替换panic恢复回调
    pub fn with_recover<F>(mut self, recover: F) -> Self
    where
        F: Fn(&TaskPanic) + Send + Sync + 'static,
    {
        self.recover = Arc::new(recover);
        self
    }

    /// 池作用域的取消令牌
    pub fn token(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// 调度一个任务到池作用域，立即返回
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let recover = self.recover.clone();
        self.tracker.spawn(async move {
            // panic在任务边界被拦截，在途计数由tracker的作用域保证递减
            let outcome = AssertUnwindSafe(async move { task(ctx).await })
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                let panic = TaskPanic::from_payload(payload);
                recover(&panic);
            }
        });
    }

    /// 阻塞到所有已调度任务完成，然后取消池作用域
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.ctx.cancel();
    }

    /// 立即取消池作用域，然后等待在途任务结束
    pub async fn stop(&self) {
        self.ctx.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_drains_all_tasks() {
        let pool = WorkerPool::new(&CancellationToken::new());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let counter = counter.clone();
            pool.spawn(move |_ctx| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        // wait结束后作用域必须已被取消
        assert!(pool.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let recovered = Arc::new(Mutex::new(Vec::new()));
        let sink = recovered.clone();
        let pool = WorkerPool::new(&CancellationToken::new()).with_recover(move |panic| {
            if let Ok(mut messages) = sink.lock() {
                messages.push(panic.message.clone());
            }
        });
        let completed = Arc::new(AtomicUsize::new(0));

        pool.spawn(|_ctx| async move {
            panic!("executor exploded");
        });
        // panic之后调度的任务必须照常运行
        let counter = completed.clone();
        pool.spawn(move |_ctx| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        pool.wait().await;

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        let messages = recovered.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], "executor exploded");
    }

    #[tokio::test]
    async fn test_stop_cancels_before_drain() {
        let pool = WorkerPool::new(&CancellationToken::new());
        let observed_cancel = Arc::new(AtomicUsize::new(0));

        let flag = observed_cancel.clone();
        pool.spawn(move |ctx| async move {
            ctx.cancelled().await;
            flag.fetch_add(1, Ordering::SeqCst);
        });

        pool.stop().await;
        assert_eq!(observed_cancel.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let pool = WorkerPool::new(&parent);

        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();
        pool.spawn(move |ctx| async move {
            ctx.cancelled().await;
            flag.fetch_add(1, Ordering::SeqCst);
        });

        parent.cancel();
        pool.wait().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
