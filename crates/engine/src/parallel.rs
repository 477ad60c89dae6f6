//! 组合执行器：并发运行一组子执行器
//!
//! 克隆组合执行器会对每个子执行器递归调用 `safe_copy`，得到一棵
//! 显式的构造树。执行时把同一份负载扇出给所有子执行器，结果遵循
//! 扇出组的首错语义。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dispatch_core::{DispatchResult, Executor};

use crate::group::TaskGroup;

/// 持有固定有序子执行器集合的组合执行器
pub struct ParallelExecutor {
    id: String,
    children: Vec<Box<dyn Executor>>,
}

impl ParallelExecutor {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Box<dyn Executor>) -> Self {
        self.children.push(child);
        self
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[async_trait]
impl Executor for ParallelExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn safe_copy(&self) -> Box<dyn Executor> {
        Box::new(ParallelExecutor {
            id: self.id.clone(),
            children: self.children.iter().map(|child| child.safe_copy()).collect(),
        })
    }

    async fn run(&mut self, ctx: CancellationToken, data: &[u8]) -> DispatchResult<()> {
        let group = TaskGroup::new(&ctx);
        for child in self.children.drain(..) {
            let mut child = child;
            let data = data.to_vec();
            group.spawn(move |branch_ctx| async move { child.run(branch_ctx, &data).await });
        }
        group.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::DispatchError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingExecutor {
        id: String,
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        fn id(&self) -> &str {
            &self.id
        }

        fn safe_copy(&self) -> Box<dyn Executor> {
            Box::new(RecordingExecutor {
                id: self.id.clone(),
                payloads: self.payloads.clone(),
            })
        }

        async fn run(&mut self, _ctx: CancellationToken, data: &[u8]) -> DispatchResult<()> {
            if let Ok(mut payloads) = self.payloads.lock() {
                payloads.push(data.to_vec());
            }
            Ok(())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl Executor for FailingExecutor {
        fn id(&self) -> &str {
            "demo.failing"
        }

        fn safe_copy(&self) -> Box<dyn Executor> {
            Box::new(FailingExecutor)
        }

        async fn run(&mut self, _ctx: CancellationToken, _data: &[u8]) -> DispatchResult<()> {
            Err(DispatchError::TaskExecution("child failed".to_string()))
        }
    }

    struct CancelAwareExecutor {
        saw_cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Executor for CancelAwareExecutor {
        fn id(&self) -> &str {
            "demo.cancel_aware"
        }

        fn safe_copy(&self) -> Box<dyn Executor> {
            Box::new(CancelAwareExecutor {
                saw_cancel: self.saw_cancel.clone(),
            })
        }

        async fn run(&mut self, ctx: CancellationToken, _data: &[u8]) -> DispatchResult<()> {
            tokio::select! {
                _ = ctx.cancelled() => {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Ok(())
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_fans_payload_out_to_all_children() {
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let composite = ParallelExecutor::new("demo.composite")
            .with_child(Box::new(RecordingExecutor {
                id: "demo.first".to_string(),
                payloads: payloads.clone(),
            }))
            .with_child(Box::new(RecordingExecutor {
                id: "demo.second".to_string(),
                payloads: payloads.clone(),
            }));

        // 通过克隆执行，原型保持完整
        let mut clone = composite.safe_copy();
        clone
            .run(CancellationToken::new(), b"payload")
            .await
            .unwrap();

        assert_eq!(composite.child_count(), 2);
        let payloads = payloads.lock().unwrap();
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p == b"payload"));
    }

    #[tokio::test]
    async fn test_first_child_error_cancels_siblings() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let composite = ParallelExecutor::new("demo.composite")
            .with_child(Box::new(FailingExecutor))
            .with_child(Box::new(CancelAwareExecutor {
                saw_cancel: saw_cancel.clone(),
            }));

        let mut clone = composite.safe_copy();
        let err = clone
            .run(CancellationToken::new(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TaskExecution(ref msg) if msg == "child failed"));
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_composite_succeeds() {
        let composite = ParallelExecutor::new("demo.composite");
        let mut clone = composite.safe_copy();
        assert!(clone.run(CancellationToken::new(), &[]).await.is_ok());
    }
}
