//! 执行器注册表
//!
//! 启动阶段通过显式注册调用构建，之后冻结：注册需要可变引用，
//! 分发只读。读路径因此不加任何锁，代价是注册必须在服务流量
//! 之前完成（编译器强制了这一点）。

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use dispatch_core::{DispatchError, DispatchResult, Executor, TaskParam};

/// 任务类型标识到执行器原型的映射
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Box<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// 注册一个执行器原型
    ///
    /// 标识为空或重复都是配置错误，在注册时立即失败，而不是
    /// 拖到分发时。
    pub fn register(&mut self, executor: Box<dyn Executor>) -> DispatchResult<()> {
        let id = executor.id().to_string();
        if id.is_empty() {
            return Err(DispatchError::config_error("执行器标识不能为空"));
        }
        if self.executors.contains_key(&id) {
            return Err(DispatchError::DuplicateExecutor { name: id });
        }
        self.executors.insert(id, executor);
        Ok(())
    }

    /// 批量注册
    pub fn register_all(&mut self, executors: Vec<Box<dyn Executor>>) -> DispatchResult<()> {
        for executor in executors {
            self.register(executor)?;
        }
        Ok(())
    }

    /// 按任务描述符分发一次执行
    ///
    /// 永远在 `safe_copy` 派生的克隆上执行，原型只作为蓝本，
    /// 并发调用之间互不共享状态。
    pub async fn run(&self, ctx: CancellationToken, param: &TaskParam) -> DispatchResult<()> {
        let prototype = self.executors.get(&param.name).ok_or_else(|| {
            DispatchError::ExecutorNotRegistered {
                name: param.name.clone(),
            }
        })?;
        let mut clone = prototype.safe_copy();
        clone.run(ctx, &param.data).await
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.executors.len()
    }

    pub fn executor_ids(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }
}
