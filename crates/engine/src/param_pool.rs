//! 任务描述符对象池
//!
//! 池化实例在检出期间被当前持有者独占；归还前统一执行显式的
//! `reset`。守卫绝不能保留到检出它的那次处理调用之外。

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dispatch_core::TaskParam;

/// 对象池统计信息
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub pool_size: usize,
    pub max_size: usize,
    pub created_count: usize,
    pub reused_count: usize,
}

/// 有界的任务描述符对象池
pub struct ParamPool {
    pool: Mutex<VecDeque<TaskParam>>,
    max_size: usize,
    created_count: AtomicUsize,
    reused_count: AtomicUsize,
}

impl ParamPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            pool: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
            created_count: AtomicUsize::new(0),
            reused_count: AtomicUsize::new(0),
        }
    }

    /// 从池中取出一个描述符，池空时新建
    pub fn get(&self) -> TaskParam {
        if let Ok(mut pool) = self.pool.lock() {
            if let Some(param) = pool.pop_front() {
                self.reused_count.fetch_add(1, Ordering::Relaxed);
                return param;
            }
        }
        self.created_count.fetch_add(1, Ordering::Relaxed);
        TaskParam::default()
    }

    /// 归还描述符：先重置再入池，池满时直接丢弃
    pub fn put(&self, mut param: TaskParam) {
        param.reset();
        if let Ok(mut pool) = self.pool.lock() {
            if pool.len() < self.max_size {
                pool.push_back(param);
            }
        }
    }

    /// 取出一个带自动归还守卫的描述符
    pub fn get_pooled(self: &Arc<Self>) -> PooledParam {
        PooledParam {
            param: Some(self.get()),
            pool: Arc::clone(self),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let pool_size = self.pool.lock().map(|p| p.len()).unwrap_or(0);
        PoolStats {
            pool_size,
            max_size: self.max_size,
            created_count: self.created_count.load(Ordering::Relaxed),
            reused_count: self.reused_count.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.clear();
        }
    }
}

/// RAII守卫，drop时自动把描述符归还对象池
pub struct PooledParam {
    param: Option<TaskParam>,
    pool: Arc<ParamPool>,
}

impl PooledParam {
    /// 提取内部描述符，绕过自动归还
    pub fn into_inner(mut self) -> TaskParam {
        self.param.take().expect("param should be available")
    }
}

impl Deref for PooledParam {
    type Target = TaskParam;

    fn deref(&self) -> &TaskParam {
        self.param.as_ref().expect("param should be available")
    }
}

impl DerefMut for PooledParam {
    fn deref_mut(&mut self) -> &mut TaskParam {
        self.param.as_mut().expect("param should be available")
    }
}

impl Drop for PooledParam {
    fn drop(&mut self) {
        if let Some(param) = self.param.take() {
            self.pool.put(param);
        }
    }
}
