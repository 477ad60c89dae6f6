//! 执行器接口定义
//!
//! 执行器是系统中真正承载业务逻辑的组件。注册表持有每种任务类型的
//! 长生命周期**原型**；每次分发都先通过 [`Executor::safe_copy`] 派生
//! 一个独立的**克隆**，再在克隆上调用 [`Executor::run`]。并发分发之间
//! 因此互不共享可变状态，执行器作者无需自己加锁。
//!
//! ## 实现自定义执行器
//!
//! ```rust
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use dispatch_core::{DispatchResult, Executor};
//!
//! struct EchoExecutor {
//!     seen: usize,
//! }
//!
//! #[async_trait]
//! impl Executor for EchoExecutor {
//!     fn id(&self) -> &str {
//!         "demo.echo"
//!     }
//!
//!     fn safe_copy(&self) -> Box<dyn Executor> {
//!         Box::new(EchoExecutor { seen: self.seen })
//!     }
//!
//!     async fn run(&mut self, _ctx: CancellationToken, data: &[u8]) -> DispatchResult<()> {
//!         self.seen += 1;
//!         println!("echo: {:?}", data);
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::DispatchResult;

/// 任务执行器核心接口
///
/// 实现者需要保证：
/// - `id` 返回稳定且全局唯一的任务类型标识（注册表的键）
/// - `safe_copy` 派生出携带全新调用状态的独立克隆
/// - `run` 配合取消信号尽快退出，长任务应定期检查 `ctx.is_cancelled()`
#[async_trait]
pub trait Executor: Send + Sync {
    /// 任务类型标识
    fn id(&self) -> &str;

    /// 派生一个独立的可运行克隆
    ///
    /// 组合执行器应对每个子执行器递归调用本方法。
    fn safe_copy(&self) -> Box<dyn Executor>;

    /// 执行业务逻辑
    ///
    /// `data` 是任务描述符携带的不透明负载，语义完全由实现者定义。
    async fn run(&mut self, ctx: CancellationToken, data: &[u8]) -> DispatchResult<()>;
}
