//! 扇出/汇合原语
//!
//! 在一个派生的可取消作用域下并发运行多个分支，只保留第一个
//! 错误：任何分支一返回非Ok结果，整组的派生令牌立刻被取消
//! （单次触发），其余分支协作式地观察取消后尽早退出。错误不做
//! 聚合，后续分支的错误被丢弃。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use dispatch_core::{DispatchError, DispatchResult};

use crate::pool::TaskPanic;

/// 扇出组，组合任务每次调用时临时创建，`wait` 返回后销毁
pub struct TaskGroup {
    ctx: CancellationToken,
    tracker: TaskTracker,
    first_err: Arc<Mutex<Option<DispatchError>>>,
}

impl TaskGroup {
    /// 从调用方上下文派生一个新的组作用域
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            ctx: parent.child_token(),
            tracker: TaskTracker::new(),
            first_err: Arc::new(Mutex::new(None)),
        }
    }

    /// 组作用域的取消令牌
    pub fn token(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// 调度一个分支到组作用域
    ///
    /// 分支panic会被转换成错误值，与普通错误走同一条首错路径。
    pub fn spawn<F, Fut>(&self, branch: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = DispatchResult<()>> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let scope = self.ctx.clone();
        let first_err = self.first_err.clone();
        self.tracker.spawn(async move {
            let outcome = match AssertUnwindSafe(async move { branch(ctx).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => Err(DispatchError::TaskPanicked(
                    TaskPanic::from_payload(payload).to_string(),
                )),
            };
            if let Err(err) = outcome {
                // 只记录第一个错误，并随之取消整组
                if let Ok(mut slot) = first_err.lock() {
                    if slot.is_none() {
                        *slot = Some(err);
                        scope.cancel();
                    }
                }
            }
        });
    }

    /// 等待所有分支结束，返回捕获到的第一个错误
    pub async fn wait(self) -> DispatchResult<()> {
        self.tracker.close();
        self.tracker.wait().await;
        self.ctx.cancel();
        match self.first_err.lock() {
            Ok(mut slot) => match slot.take() {
                Some(err) => Err(err),
                None => Ok(()),
            },
            Err(_) => Err(DispatchError::Internal(
                "首错记录锁已失效".to_string(),
            )),
        }
    }
}
