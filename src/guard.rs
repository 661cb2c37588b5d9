use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

/// 索引构建与并发搜索之间的读写锁
///
/// 搜索持有读锁，可以并发执行；构建持有写锁，与所有搜索互斥。返回的守卫在离开作用域时
/// 释放，包括出错提前返回的情况。标准库的读写锁在有写者等待时会阻塞新的读者，构建不会
/// 被持续的搜索饿死。
#[derive(Debug, Default)]
pub struct ConcurrencyGuard<T> {
    inner: RwLock<T>,
}

impl<T> ConcurrencyGuard<T> {
    pub fn new(value: T) -> Self {
        Self { inner: RwLock::new(value) }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>> {
        self.inner.read().map_err(|_| Error::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>> {
        self.inner.write().map_err(|_| Error::LockPoisoned)
    }
}
