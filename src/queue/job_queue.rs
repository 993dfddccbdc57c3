// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::models::job::Job;

/// 队列错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// 队列已关闭，不再接受新任务
    #[error("Queue closed")]
    Closed,
}

#[derive(Debug)]
struct QueueEntry {
    priority: i32,
    sequence: u64,
    job: Job,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap 是最大堆，这里反转比较使优先级数值最小、序号最小的条目先出队
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
    closed: bool,
}

impl QueueInner {
    fn push(&mut self, job: Job) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueEntry {
            priority: job.priority,
            sequence,
            job,
        });
    }
}

/// 优先级任务队列
///
/// 优先级数值越小越先出队，相同优先级按入队顺序先进先出。
/// 支持多个生产者并发入队和单个消费者（调度器）出队
#[derive(Debug, Default)]
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队任务
    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueError::Closed);
            }
            inner.push(job);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// 批量入队，等价于按顺序逐个入队，返回入队数量
    pub fn enqueue_bulk(&self, jobs: impl IntoIterator<Item = Job>) -> Result<usize, QueueError> {
        let count = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueError::Closed);
            }
            let before = inner.heap.len();
            for job in jobs {
                inner.push(job);
            }
            inner.heap.len() - before
        };
        if count > 0 {
            self.notify.notify_one();
        }
        Ok(count)
    }

    /// 非阻塞出队
    pub fn try_dequeue(&self) -> Option<Job> {
        self.inner.lock().heap.pop().map(|entry| entry.job)
    }

    /// 出队，最多等待 `timeout`，超时返回 `None`
    pub async fn dequeue(&self, timeout: Duration) -> Option<Job> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // 先注册等待再检查队列，避免错过检查与等待之间的通知
            notified.as_mut().enable();

            if let Some(job) = self.try_dequeue() {
                return Some(job);
            }
            if self.is_closed() {
                return None;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// 关闭队列，之后的入队都会失败
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// 取出所有剩余任务，按出队顺序返回
    pub fn drain(&self) -> Vec<Job> {
        let mut inner = self.inner.lock();
        let mut jobs = Vec::with_capacity(inner.heap.len());
        while let Some(entry) = inner.heap.pop() {
            jobs.push(entry.job);
        }
        jobs
    }
}
